//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::compiler::{CommandLine, DEFAULT_COMPILE_PROGRAM, DEFAULT_RENDER_PROGRAM};
use crate::config::CacheConfig;
use crate::fingerprint::RequestKind;

#[derive(Parser)]
#[command(name = "chartcache")]
#[command(about = "Render chart specifications through a content-addressed render cache")]
#[command(version)]
pub struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, value_enum, default_value = "warn")]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a chart file the way a live preview would
    Render {
        /// Chart specification (JSON)
        file: PathBuf,

        /// Specification kind (detected if not specified)
        #[arg(short, long, value_enum)]
        kind: Option<KindArg>,

        /// Derived → primary compiler command
        #[arg(long, default_value = DEFAULT_COMPILE_PROGRAM)]
        compile_cmd: CommandLine,

        /// Primary → SVG renderer command
        #[arg(long, default_value = DEFAULT_RENDER_PROGRAM)]
        render_cmd: CommandLine,

        /// Print the HTML fragment instead of raw markup
        #[arg(long)]
        html: bool,

        /// Preview passes to run once the chart has settled
        #[arg(short, long, default_value = "1")]
        passes: usize,

        /// Print cache statistics as JSON
        #[arg(long)]
        stats: bool,

        #[command(flatten)]
        cache: CacheArgs,
    },

    /// Print the fingerprint of a chart file
    Fingerprint {
        /// Chart specification (JSON)
        file: PathBuf,

        /// Specification kind (detected if not specified)
        #[arg(short, long, value_enum)]
        kind: Option<KindArg>,
    },
}

/// Cache overrides; unset values keep the defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct CacheArgs {
    /// Render cache capacity
    #[arg(long)]
    pub capacity: Option<usize>,

    /// Entry time-to-live in seconds
    #[arg(long)]
    pub ttl_secs: Option<u64>,

    /// Render deadline in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Compiled-form cache capacity
    #[arg(long)]
    pub compiled_capacity: Option<usize>,
}

impl CacheArgs {
    /// Applies the overrides on top of [`CacheConfig::default`].
    pub fn to_config(&self) -> CacheConfig {
        let mut config = CacheConfig::default();
        if let Some(capacity) = self.capacity {
            config = config.with_capacity(capacity);
        }
        if let Some(secs) = self.ttl_secs {
            config = config.with_ttl(Duration::from_secs(secs));
        }
        if let Some(ms) = self.timeout_ms {
            config = config.with_render_timeout(Duration::from_millis(ms));
        }
        if let Some(capacity) = self.compiled_capacity {
            config = config.with_compiled_capacity(capacity);
        }
        config
    }
}

/// Specification kind as spelled on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Vega (primary)
    Vega,
    /// Vega-Lite (derived)
    VegaLite,
}

impl From<KindArg> for RequestKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Vega => RequestKind::Primary,
            KindArg::VegaLite => RequestKind::Derived,
        }
    }
}

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages
    Info,
    /// Debug output
    Debug,
    /// Everything
    Trace,
}

impl LogLevel {
    /// `EnvFilter` directive for this level.
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
