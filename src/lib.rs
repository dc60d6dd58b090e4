//! # chartcache
//!
//! Content-addressed, asynchronous render cache for chart specifications in a
//! live document preview.
//!
//! A preview surface re-renders the whole document on every edit, and every
//! pass asks for the markup of every chart block. Rendering a chart is slow,
//! so this crate answers each request immediately from a cache keyed by a
//! fingerprint of the chart text, starts at most one background render per
//! fingerprint, and asks the host for a fresh pass once that render settles.
//!
//! ```text
//!  host pass ──request(kind, text)──▶ ChartRenderer
//!      ▲                                  │ fingerprint(kind, text)
//!      │                                  ▼
//!      │                           RenderRegistry ──miss──▶ compile + render
//!      │                                  │                  (background)
//!      └────────request_refresh()─────────┴◀──── settle ─────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use chartcache::prelude::*;
//! use futures::future::{BoxFuture, FutureExt};
//! use serde_json::Value;
//! use std::sync::Arc;
//!
//! struct Svg;
//!
//! impl ChartCompiler for Svg {
//!     fn compile(&self, derived: &Value) -> chartcache::Result<Value> {
//!         Ok(derived.clone())
//!     }
//!
//!     fn render(&self, _primary: Arc<Value>) -> BoxFuture<'static, chartcache::Result<String>> {
//!         async { Ok("<svg/>".to_string()) }.boxed()
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let host = Arc::new(RecordingHost::new());
//! let renderer = ChartRenderer::create(
//!     Svg,
//!     host.clone(),
//!     CacheConfig::default(),
//!     tokio::runtime::Handle::current(),
//! );
//!
//! let text = r#"{"marks": []}"#;
//! assert_eq!(renderer.request(RequestKind::Primary, text), MarkupFragment::Pending);
//!
//! tokio::time::sleep(std::time::Duration::from_millis(10)).await;
//! assert_eq!(host.refresh_count(), 1);
//! assert_eq!(
//!     renderer.request(RequestKind::Primary, text),
//!     MarkupFragment::Image("<svg/>".into())
//! );
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod compiler;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod markup;
pub mod notify;
mod renderer;

/// Command-line front end
#[cfg(feature = "cli")]
pub mod cli;

pub use config::CacheConfig;
pub use error::{RenderError, Result};
pub use fingerprint::{fingerprint, Fingerprint, RequestKind};
pub use markup::MarkupFragment;
pub use renderer::ChartRenderer;

/// Common imports for convenient usage
pub mod prelude {
    pub use crate::cache::{CacheStats, EvictionReport, RenderRegistry};
    pub use crate::compiler::{ChartCompiler, CommandCompiler, CommandLine};
    pub use crate::config::CacheConfig;
    pub use crate::error::RenderError;
    pub use crate::fingerprint::{fingerprint, Fingerprint, RequestKind};
    pub use crate::markup::{Artifact, ImmediateResponse, MarkupFragment};
    pub use crate::notify::{CoalescingRefresh, NotificationBridge, RecordingHost, RefreshHost};
    pub use crate::ChartRenderer;
}
