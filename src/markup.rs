//! Render artifacts and the markup fragments handed back to the host.

use crate::error::RenderError;
use std::sync::Arc;

/// Longest error description shown to the user, in characters.
pub const MAX_ERROR_CHARS: usize = 400;

/// Final result of a computation: image markup or a terminal error.
///
/// Cloning is cheap; both variants share their text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// Rendered image markup (e.g. SVG).
    Image(Arc<str>),
    /// Sanitized, human-readable failure description.
    Error(Arc<str>),
}

impl Artifact {
    /// Wraps rendered markup.
    pub fn image(markup: impl Into<Arc<str>>) -> Self {
        Artifact::Image(markup.into())
    }

    /// Builds a terminal error artifact from a render error.
    pub fn error(err: &RenderError) -> Self {
        Artifact::Error(sanitize_error(&err.to_string()).into())
    }

    /// Returns `true` for error artifacts.
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, Artifact::Error(_))
    }
}

impl From<Result<String, RenderError>> for Artifact {
    fn from(result: Result<String, RenderError>) -> Self {
        match result {
            Ok(markup) => Artifact::image(markup),
            Err(err) => Artifact::error(&err),
        }
    }
}

/// What a registry lookup can answer without waiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImmediateResponse {
    /// The computation has settled.
    Ready(Artifact),
    /// A computation is in flight.
    Pending,
}

impl ImmediateResponse {
    /// Returns `true` while the computation is in flight.
    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self, ImmediateResponse::Pending)
    }
}

/// Markup returned to the host for one code block.
///
/// The three variants carry distinct wrapper classes so the host can style
/// them separately.
///
/// # Examples
///
/// ```rust
/// use chartcache::MarkupFragment;
///
/// let pending = MarkupFragment::Pending;
/// assert!(pending.to_html().contains("chart-pending"));
///
/// let error = MarkupFragment::Error("bad <spec>".into());
/// assert_eq!(
///     error.to_html(),
///     r#"<div class="chart-error">bad &lt;spec&gt;</div>"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupFragment {
    /// Rendered chart.
    Image(Arc<str>),
    /// Placeholder while the chart renders.
    Pending,
    /// Sanitized failure description.
    Error(Arc<str>),
}

impl MarkupFragment {
    /// Error fragment for a failure that never entered the registry.
    pub fn from_error(err: &RenderError) -> Self {
        MarkupFragment::Error(sanitize_error(&err.to_string()).into())
    }

    /// Returns `true` for the pending placeholder.
    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self, MarkupFragment::Pending)
    }

    /// Returns `true` for error fragments.
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, MarkupFragment::Error(_))
    }

    /// HTML for the preview surface.
    ///
    /// Image markup is trusted renderer output and embedded as is; error
    /// text is escaped.
    pub fn to_html(&self) -> String {
        match self {
            MarkupFragment::Image(markup) => format!(r#"<div class="chart-image">{markup}</div>"#),
            MarkupFragment::Pending => {
                r#"<div class="chart-pending">Rendering chart...</div>"#.to_string()
            }
            MarkupFragment::Error(message) => {
                format!(r#"<div class="chart-error">{}</div>"#, escape_html(message))
            }
        }
    }
}

impl From<ImmediateResponse> for MarkupFragment {
    fn from(response: ImmediateResponse) -> Self {
        match response {
            ImmediateResponse::Pending => MarkupFragment::Pending,
            ImmediateResponse::Ready(Artifact::Image(markup)) => MarkupFragment::Image(markup),
            ImmediateResponse::Ready(Artifact::Error(message)) => MarkupFragment::Error(message),
        }
    }
}

/// Reduces a failure description to something safe to show.
///
/// Keeps the first non-blank line (stack frames follow it), trims it and
/// caps its length at [`MAX_ERROR_CHARS`].
pub fn sanitize_error(raw: &str) -> String {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("Unknown error");

    if line.chars().count() <= MAX_ERROR_CHARS {
        return line.to_string();
    }

    let mut truncated: String = line.chars().take(MAX_ERROR_CHARS).collect();
    truncated.push_str("...");
    truncated
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
