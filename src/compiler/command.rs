//! Compiler backed by external command-line tools.

use super::ChartCompiler;
use crate::config::DEFAULT_RENDER_TIMEOUT;
use crate::error::{RenderError, Result};
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::fmt;
use std::io::{self, Read, Write};
use std::process::{Child, ExitStatus, Output, Stdio};
use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Default derived → primary compiler.
pub const DEFAULT_COMPILE_PROGRAM: &str = "vl2vg";

/// Default primary → SVG renderer.
pub const DEFAULT_RENDER_PROGRAM: &str = "vg2svg";

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Returned when parsing a blank command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("command line is empty")]
pub struct EmptyCommandLine;

/// A program plus its arguments. No shell is involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    /// Creates a command line without arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// The program name.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The arguments.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn process_error(&self, err: io::Error) -> RenderError {
        RenderError::Process {
            program: self.program.clone(),
            reason: err.to_string(),
        }
    }

    /// Runs the tool on the calling thread, killing it once `limit` elapses.
    fn run_blocking(&self, input: &[u8], limit: Duration) -> Result<Output> {
        let mut child = std::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| self.process_error(err))?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(input),
                None => Ok(()),
            });
            let stdout = scope.spawn(move || drain(stdout));
            let stderr = scope.spawn(move || drain(stderr));

            let status = match wait_with_limit(&mut child, limit) {
                Ok(Some(status)) => status,
                Ok(None) => {
                    tracing::debug!(
                        program = %self.program,
                        limit_ms = limit.as_millis() as u64,
                        "killing tool past its deadline"
                    );
                    reap(&mut child);
                    return Err(RenderError::Timeout(limit));
                }
                Err(err) => {
                    reap(&mut child);
                    return Err(self.process_error(err));
                }
            };

            if let Ok(Err(err)) = writer.join() {
                // Tools that exit early close the pipe; the exit status decides.
                tracing::trace!(program = %self.program, error = %err, "stdin write failed");
            }

            let collect = |reader: thread::ScopedJoinHandle<'_, io::Result<Vec<u8>>>| {
                reader
                    .join()
                    .unwrap_or_else(|_| Err(io::Error::other("pipe reader panicked")))
                    .map_err(|err| self.process_error(err))
            };
            Ok(Output {
                status,
                stdout: collect(stdout)?,
                stderr: collect(stderr)?,
            })
        })
    }

    async fn run(&self, input: &[u8]) -> Result<Output> {
        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| self.process_error(err))?;

        let stdin = child.stdin.take();
        let write = async move {
            match stdin {
                Some(mut stdin) => stdin.write_all(input).await,
                None => Ok(()),
            }
        };
        let (written, output) = tokio::join!(write, child.wait_with_output());

        if let Err(err) = written {
            tracing::trace!(program = %self.program, error = %err, "stdin write failed");
        }
        output.map_err(|err| self.process_error(err))
    }

    /// Stdout of a successful run, or `stage` applied to the failure reason.
    fn check(&self, output: Output, stage: fn(String) -> RenderError) -> Result<Vec<u8>> {
        if output.status.success() {
            return Ok(output.stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let reason = if stderr.is_empty() {
            format!("`{}` exited with {}", self.program, output.status)
        } else {
            stderr.to_string()
        };
        Err(stage(reason))
    }
}

fn drain<R: Read>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf)?;
    }
    Ok(buf)
}

fn wait_with_limit(child: &mut Child, limit: Duration) -> io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= limit {
            return Ok(None);
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
}

fn reap(child: &mut Child) {
    if let Err(err) = child.kill().and_then(|()| child.wait().map(drop)) {
        tracing::trace!(error = %err, "failed to reap child process");
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

impl FromStr for CommandLine {
    type Err = EmptyCommandLine;

    /// Splits on whitespace. Quoting is not supported.
    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let program = words.next().ok_or(EmptyCommandLine)?;
        Ok(words.fold(CommandLine::new(program), |line, word| line.arg(word)))
    }
}

/// [`ChartCompiler`] that pipes JSON through external tools.
///
/// Both tools read a specification on stdin. The compile tool writes the
/// primary specification as JSON to stdout; the render tool writes markup.
/// A non-zero exit becomes [`RenderError::Compile`] or
/// [`RenderError::Render`] carrying the tool's stderr. A tool that cannot be
/// started becomes [`RenderError::Process`].
///
/// Compilation blocks the calling thread and kills the tool after
/// [`compile_timeout`](Self::compile_timeout). Rendering runs through
/// `tokio::process` and kills the tool when the render future is dropped.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    compile: CommandLine,
    render: Arc<CommandLine>,
    compile_timeout: Duration,
}

impl CommandCompiler {
    /// Creates a compiler from the two command lines.
    pub fn new(compile: CommandLine, render: CommandLine) -> Self {
        Self {
            compile,
            render: Arc::new(render),
            compile_timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }

    /// Sets how long the compile tool may run before it is killed.
    pub fn with_compile_timeout(mut self, timeout: Duration) -> Self {
        self.compile_timeout = timeout;
        self
    }

    /// How long the compile tool may run before it is killed.
    #[inline]
    pub fn compile_timeout(&self) -> Duration {
        self.compile_timeout
    }

    /// The derived → primary command.
    pub fn compile_command(&self) -> &CommandLine {
        &self.compile
    }

    /// The primary → markup command.
    pub fn render_command(&self) -> &CommandLine {
        &self.render
    }
}

impl Default for CommandCompiler {
    fn default() -> Self {
        Self::new(
            CommandLine::new(DEFAULT_COMPILE_PROGRAM),
            CommandLine::new(DEFAULT_RENDER_PROGRAM),
        )
    }
}

impl ChartCompiler for CommandCompiler {
    fn compile(&self, derived: &Value) -> Result<Value> {
        let input = serde_json::to_vec(derived)?;
        let output = self.compile.run_blocking(&input, self.compile_timeout)?;
        let stdout = self.compile.check(output, RenderError::Compile)?;

        serde_json::from_slice(&stdout).map_err(|err| {
            RenderError::Compile(format!(
                "`{}` produced invalid JSON: {err}",
                self.compile.program
            ))
        })
    }

    fn render(&self, primary: Arc<Value>) -> BoxFuture<'static, Result<String>> {
        let command = Arc::clone(&self.render);
        async move {
            let input = serde_json::to_vec(&*primary)?;
            let output = command.run(&input).await?;
            let stdout = command.check(output, RenderError::Render)?;

            String::from_utf8(stdout).map_err(|_| {
                RenderError::Render(format!("`{}` produced non-UTF-8 output", command.program))
            })
        }
        .boxed()
    }
}
