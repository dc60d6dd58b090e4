//! Error types for chart rendering requests.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while turning a chart specification into markup.
///
/// None of these ever reach the synchronous caller of
/// [`ChartRenderer::request`](crate::ChartRenderer::request): malformed input
/// is reported as an error fragment straight away, and every other variant is
/// stored in the registry as a terminal error artifact.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The raw text is not valid JSON.
    ///
    /// Malformed input is never fingerprinted, since the fingerprint could
    /// never be reused for a successful render.
    #[error("Invalid chart specification: {0}")]
    Malformed(String),

    /// Compiling a derived specification into its primary form failed.
    #[error("Compilation failed: {0}")]
    Compile(String),

    /// Rendering a primary specification into image markup failed.
    #[error("Rendering failed: {0}")]
    Render(String),

    /// The computation did not settle before its deadline.
    #[error("Rendering timed out after {} ms", .0.as_millis())]
    Timeout(Duration),

    /// The computation panicked before producing a result.
    #[error("Rendering aborted unexpectedly")]
    Panicked,

    /// An external compiler process could not be run.
    #[error("Failed to run `{program}`: {reason}")]
    Process {
        /// Program that was invoked.
        program: String,
        /// What went wrong.
        reason: String,
    },
}

impl RenderError {
    /// Returns `true` for errors produced by the deadline watchdog.
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, RenderError::Timeout(_))
    }
}

impl From<serde_json::Error> for RenderError {
    fn from(err: serde_json::Error) -> Self {
        RenderError::Malformed(err.to_string())
    }
}

/// A specialized `Result` type for rendering operations.
pub type Result<T> = std::result::Result<T, RenderError>;
