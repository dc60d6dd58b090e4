//! Render cache for chartcache.
//!
//! Two caches live here, each keyed on what makes its result reusable:
//!
//! - [`RenderRegistry`]: fingerprint → rendered artifact, or the computation
//!   currently producing it. Bounded by [`HybridEviction`].
//! - [`CompiledFormCache`]: derived text → compiled primary form. Bounded by
//!   insertion order.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        RenderRegistry                           │
//! │  ┌──────────────────────────────────────────────────────────┐  │
//! │  │ Mutex<FxHashMap<Fingerprint, CacheEntry>>                 │  │
//! │  │   Pending{generation, watchdog} | Ready(Artifact)         │  │
//! │  │   last_touched, use_count                                 │  │
//! │  └──────────────────────────────────────────────────────────┘  │
//! │        │ spawn                 │ settle              ▲ sweep   │
//! │        ▼                       ▼                     │         │
//! │  ┌────────────┐  ┌──────────────────────┐  ┌──────────────┐    │
//! │  │ compute +  │  │ NotificationBridge   │  │ Sweeper      │    │
//! │  │ watchdog   │  │ (host refresh)       │  │ (interval)   │    │
//! │  └────────────┘  └──────────────────────┘  └──────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Examples
//!
//! ```rust
//! use chartcache::cache::{RenderRegistry, Sweeper};
//! use chartcache::config::CacheConfig;
//! use chartcache::notify::{NotificationBridge, RecordingHost};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let config = CacheConfig::default();
//! let registry = RenderRegistry::new(
//!     &config,
//!     NotificationBridge::new(Arc::new(RecordingHost::new())),
//!     tokio::runtime::Handle::current(),
//! );
//! let _sweeper = Sweeper::spawn(&registry, config.sweep_interval);
//!
//! assert!(registry.is_empty());
//! # }
//! ```

mod compiled;
mod entry;
pub mod eviction;
mod registry;
mod stats;
mod sweeper;

pub use compiled::CompiledFormCache;
pub use entry::Generation;
pub use eviction::{EvictionReport, HybridEviction};
pub use registry::{RenderRegistry, SettleOutcome};
pub use stats::CacheStats;
pub use sweeper::Sweeper;
