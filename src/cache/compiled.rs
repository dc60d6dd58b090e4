//! Compiled-form cache for derived specifications.
//!
//! Compiling a derived specification (e.g. Vega-Lite) into its primary form
//! is deterministic per exact text, so the cache is keyed on the raw text
//! rather than on a fingerprint. It guards a cheaper operation than
//! rendering and uses a cruder policy: when an insertion pushes it over
//! capacity, the oldest-inserted entry is dropped (FIFO).

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Default)]
struct CompiledForms {
    forms: FxHashMap<Arc<str>, Arc<Value>>,
    insertion_order: VecDeque<Arc<str>>,
    hits: u64,
    misses: u64,
}

impl CompiledForms {
    fn insert(&mut self, text: &str, form: Arc<Value>, capacity: usize) {
        if let Some(existing) = self.forms.get_mut(text) {
            *existing = form;
            return;
        }

        let key: Arc<str> = Arc::from(text);
        self.forms.insert(Arc::clone(&key), form);
        self.insertion_order.push_back(key);

        if self.forms.len() > capacity {
            if let Some(oldest) = self.insertion_order.pop_front() {
                self.forms.remove(&oldest);
            }
        }
    }
}

/// Memoizes derived-to-primary compilation.
///
/// # Thread Safety
///
/// State is behind a `parking_lot::Mutex`. The lock is not held while the
/// compile closure runs.
///
/// # Examples
///
/// ```rust
/// use chartcache::cache::CompiledFormCache;
/// use serde_json::json;
///
/// let cache = CompiledFormCache::new(8);
/// let text = r#"{"mark":"bar"}"#;
///
/// let form = cache
///     .get_or_compile(text, || Ok::<_, String>(json!({"marks": [{"type": "rect"}]})))
///     .unwrap();
///
/// // Second lookup is served from the cache; the closure is not called.
/// let again = cache
///     .get_or_compile(text, || Err("not called".to_string()))
///     .unwrap();
/// assert_eq!(form, again);
/// ```
#[derive(Debug)]
pub struct CompiledFormCache {
    capacity: usize,
    inner: Mutex<CompiledForms>,
}

impl CompiledFormCache {
    /// Creates an empty cache holding at most `capacity` forms.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CompiledForms::default()),
        }
    }

    /// Returns the compiled form of `derived_text`, compiling it on a miss.
    ///
    /// Failed compilations are not cached.
    pub fn get_or_compile<F, E>(&self, derived_text: &str, compile: F) -> Result<Arc<Value>, E>
    where
        F: FnOnce() -> Result<Value, E>,
    {
        {
            let mut inner = self.inner.lock();
            if let Some(form) = inner.forms.get(derived_text).cloned() {
                inner.hits += 1;
                return Ok(form);
            }
            inner.misses += 1;
        }

        let form = Arc::new(compile()?);
        self.inner
            .lock()
            .insert(derived_text, Arc::clone(&form), self.capacity);
        Ok(form)
    }

    /// Checks whether `derived_text` has a cached form.
    pub fn contains(&self, derived_text: &str) -> bool {
        self.inner.lock().forms.contains_key(derived_text)
    }

    /// Number of cached forms.
    pub fn len(&self) -> usize {
        self.inner.lock().forms.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of cached forms.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// `(hits, misses)` since creation.
    pub fn hit_counts(&self) -> (u64, u64) {
        let inner = self.inner.lock();
        (inner.hits, inner.misses)
    }

    /// Drops every cached form.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.forms.clear();
        inner.insertion_order.clear();
    }
}
