//! CLI command implementations

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::CacheStats;
use crate::compiler::{CommandCompiler, CommandLine};
use crate::config::CacheConfig;
use crate::fingerprint::{fingerprint, RequestKind};
use crate::markup::MarkupFragment;
use crate::notify::RefreshHost;
use crate::ChartRenderer;

use super::args::{CacheArgs, Commands, KindArg};
use super::detect::{detect_kind, DetectionMethod, KindDetection};

/// Everything `render` needs
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Chart file
    pub file: PathBuf,
    /// Kind override
    pub kind: Option<RequestKind>,
    /// Compiler and renderer commands
    pub compiler: CommandCompiler,
    /// Print HTML instead of raw markup
    pub html: bool,
    /// Passes to run after the chart settles
    pub passes: usize,
    /// Print statistics
    pub stats: bool,
    /// Cache sizing
    pub config: CacheConfig,
}

/// Execute a CLI command
pub fn execute(command: Commands) -> Result<()> {
    match command {
        Commands::Render {
            file,
            kind,
            compile_cmd,
            render_cmd,
            html,
            passes,
            stats,
            cache,
        } => cmd_render(render_options(
            file,
            kind,
            compile_cmd,
            render_cmd,
            html,
            passes,
            stats,
            &cache,
        )),
        Commands::Fingerprint { file, kind } => cmd_fingerprint(&file, kind.map(RequestKind::from)),
    }
}

#[allow(clippy::too_many_arguments)]
fn render_options(
    file: PathBuf,
    kind: Option<KindArg>,
    compile_cmd: CommandLine,
    render_cmd: CommandLine,
    html: bool,
    passes: usize,
    stats: bool,
    cache: &CacheArgs,
) -> RenderOptions {
    let config = cache.to_config();
    RenderOptions {
        file,
        kind: kind.map(RequestKind::from),
        compiler: CommandCompiler::new(compile_cmd, render_cmd)
            .with_compile_timeout(config.render_timeout),
        html,
        passes,
        stats,
        config,
    }
}

fn read_chart(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read chart file: {}", path.display()))
}

fn detect(path: &Path, text: &str, kind: Option<RequestKind>) -> KindDetection {
    let detection = detect_kind(path, text, kind);
    tracing::debug!(kind = %detection.kind, method = %detection.method, "chart kind");
    if detection.method == DetectionMethod::Fallback {
        eprintln!(
            "{}: could not detect chart kind of {}, assuming {}",
            "Warning".yellow().bold(),
            path.display(),
            detection.kind
        );
    }
    detection
}

/// Print the fingerprint of a chart file
pub fn cmd_fingerprint(path: &Path, kind: Option<RequestKind>) -> Result<()> {
    let text = read_chart(path)?;
    let detection = detect(path, &text, kind);

    println!("{}  {}", fingerprint(detection.kind, &text), detection.kind);
    Ok(())
}

/// Render a chart file, simulating the preview host
///
/// Each refresh request from the cache triggers another pass, until the
/// chart is no longer pending.
pub fn cmd_render(options: RenderOptions) -> Result<()> {
    let text = read_chart(&options.file)?;
    let kind = detect(&options.file, &text, options.kind).kind;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let refresh = Arc::new(tokio::sync::Notify::new());
    let host: Arc<dyn RefreshHost> = {
        let refresh = Arc::clone(&refresh);
        Arc::new(move || refresh.notify_one())
    };

    let renderer = ChartRenderer::create(
        options.compiler,
        host,
        options.config,
        runtime.handle().clone(),
    );

    let fragment = runtime.block_on(async {
        let mut pass = 0usize;
        loop {
            pass += 1;
            let fragment = renderer.request(kind, &text);
            tracing::debug!(pass, pending = fragment.is_pending(), "preview pass");
            if !fragment.is_pending() {
                break fragment;
            }
            refresh.notified().await;
        }
    });

    for _ in 1..options.passes {
        renderer.request(kind, &text);
    }

    let stats = renderer.stats();
    renderer.dispose();

    if options.html {
        println!("{}", fragment.to_html());
    } else if let MarkupFragment::Image(markup) = &fragment {
        println!("{markup}");
    }

    print_stats(options.stats, &stats)?;

    if let MarkupFragment::Error(message) = fragment {
        bail!("{message}");
    }
    Ok(())
}

fn print_stats(enabled: bool, stats: &CacheStats) -> Result<()> {
    if !enabled {
        return Ok(());
    }
    let json = serde_json::to_string_pretty(stats).context("Failed to serialize statistics")?;
    eprintln!("{}", "Cache statistics:".bold());
    eprintln!("{json}");
    Ok(())
}
