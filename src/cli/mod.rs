//! CLI interface for chartcache
//!
//! Renders chart files through the cache the same way a preview host would.

pub mod args;
pub mod commands;
pub mod detect;
pub mod logging;

pub use args::{Cli, Commands};
pub use detect::{detect_kind, DetectionMethod, KindDetection};
pub use logging::init_logging;
