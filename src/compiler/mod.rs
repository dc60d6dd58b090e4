//! The graphics compiler the render cache sits in front of.
//!
//! Chart specifications come in two kinds (see
//! [`RequestKind`](crate::fingerprint::RequestKind)). A derived specification
//! is first compiled into its primary form, then the primary form is rendered
//! into image markup:
//!
//! ```text
//! Derived (Vega-Lite) ──compile──▶ Primary (Vega) ──render──▶ SVG markup
//!                       sync                         async
//! ```
//!
//! Compilation is synchronous and runs on the blocking thread pool; its
//! results are memoized per text in the
//! [`CompiledFormCache`](crate::cache::CompiledFormCache). Rendering is the
//! expensive step and returns a future that the registry runs in the
//! background.

mod command;

pub use command::{
    CommandCompiler, CommandLine, EmptyCommandLine, DEFAULT_COMPILE_PROGRAM, DEFAULT_RENDER_PROGRAM,
};

use crate::error::Result;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

/// Compiles and renders chart specifications.
///
/// Implementations report failures as [`RenderError::Compile`] or
/// [`RenderError::Render`](crate::error::RenderError::Render); the cache
/// stores them as terminal error artifacts.
///
/// [`RenderError::Compile`]: crate::error::RenderError::Compile
///
/// # Examples
///
/// ```rust
/// use chartcache::compiler::ChartCompiler;
/// use chartcache::error::{RenderError, Result};
/// use futures::future::{BoxFuture, FutureExt};
/// use serde_json::{json, Value};
/// use std::sync::Arc;
///
/// struct MarkCounter;
///
/// impl ChartCompiler for MarkCounter {
///     fn compile(&self, derived: &Value) -> Result<Value> {
///         let mark = derived["mark"].as_str().ok_or_else(|| {
///             RenderError::Compile("missing mark".into())
///         })?;
///         Ok(json!({ "marks": [{ "type": mark }] }))
///     }
///
///     fn render(&self, primary: Arc<Value>) -> BoxFuture<'static, Result<String>> {
///         async move {
///             let marks = primary["marks"].as_array().map_or(0, Vec::len);
///             Ok(format!("<svg data-marks=\"{marks}\"/>"))
///         }
///         .boxed()
///     }
/// }
///
/// let compiled = MarkCounter.compile(&json!({ "mark": "bar" })).unwrap();
/// assert_eq!(compiled, json!({ "marks": [{ "type": "bar" }] }));
/// ```
pub trait ChartCompiler: Send + Sync + 'static {
    /// Compiles a derived specification into its primary form.
    ///
    /// May block. The renderer calls it from the blocking thread pool, and
    /// the render deadline keeps running meanwhile.
    fn compile(&self, derived: &Value) -> Result<Value>;

    /// Renders a primary specification into image markup.
    fn render(&self, primary: Arc<Value>) -> BoxFuture<'static, Result<String>>;
}

impl<C: ChartCompiler + ?Sized> ChartCompiler for Arc<C> {
    fn compile(&self, derived: &Value) -> Result<Value> {
        (**self).compile(derived)
    }

    fn render(&self, primary: Arc<Value>) -> BoxFuture<'static, Result<String>> {
        (**self).render(primary)
    }
}
