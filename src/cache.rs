//! Time-boxed query result cache for the entity stores.
//!
//! Entries are keyed by the query signature (`all` for a full fetch) and
//! expire a fixed time after insertion. Every mutation of a store drops the
//! whole cache.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;

/// Default lifetime of a cached query result.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

const MAX_ENTRIES: u64 = 256;

/// Cache settings a store can be reconfigured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    pub enabled: bool,
    pub ttl: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self { enabled: true, ttl: DEFAULT_TTL }
    }
}

#[derive(Clone)]
pub struct QueryCache<E> {
    options: CacheOptions,
    inner: Cache<String, Arc<Vec<E>>>,
}

impl<E: Clone + Send + Sync + 'static> QueryCache<E> {
    pub fn new(options: CacheOptions) -> Self {
        Self { options, inner: build(options.ttl) }
    }

    pub fn options(&self) -> CacheOptions {
        self.options
    }

    pub fn is_enabled(&self) -> bool {
        self.options.enabled
    }

    /// Apply new options. Changing the TTL starts from an empty cache.
    pub fn set_options(&mut self, options: CacheOptions) {
        if options.ttl != self.options.ttl {
            self.inner = build(options.ttl);
        }
        if !options.enabled {
            self.inner.invalidate_all();
        }
        self.options = options;
    }

    /// Unexpired entry for `key`, if caching is enabled.
    pub fn get(&self, key: &str) -> Option<Vec<E>> {
        if !self.options.enabled {
            return None;
        }
        self.inner.get(key).map(|items| items.as_ref().clone())
    }

    /// No-op when caching is disabled.
    pub fn insert(&self, key: &str, items: Vec<E>) {
        if self.options.enabled {
            self.inner.insert(key.to_string(), Arc::new(items));
        }
    }

    pub fn clear(&self) {
        self.inner.invalidate_all();
    }
}

fn build<E: Clone + Send + Sync + 'static>(ttl: Duration) -> Cache<String, Arc<Vec<E>>> {
    Cache::builder().max_capacity(MAX_ENTRIES).time_to_live(ttl).build()
}
