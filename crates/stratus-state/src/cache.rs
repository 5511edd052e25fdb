//! Watched resource cache for a single kind.

use crate::object::KubeObject;

/// Anything a cache can hold: needs a stable identity for watch events.
pub trait CacheItem: Clone {
    fn cache_key(&self) -> String;
}

impl CacheItem for KubeObject {
    fn cache_key(&self) -> String {
        self.key()
    }
}

/// ClickHouse database and user listings are plain names.
impl CacheItem for String {
    fn cache_key(&self) -> String {
        self.clone()
    }
}

/// Local mirror of one resource kind.
///
/// `loaded` flips to `true` on the first full listing and never reverts.
/// Errors are recorded next to the last good `resources`, which stay
/// readable (stale but available).
#[derive(Debug, Clone, PartialEq)]
pub struct WatchedResourceState<T> {
    resources: Vec<T>,
    loaded: bool,
    error: Option<String>,
}

impl<T> Default for WatchedResourceState<T> {
    fn default() -> Self {
        Self {
            resources: Vec::new(),
            loaded: false,
            error: None,
        }
    }
}

impl<T: CacheItem> WatchedResourceState<T> {
    /// Replace the full listing and mark the cache hydrated.
    pub fn ingest_list(&mut self, items: Vec<T>) {
        self.resources = items;
        self.loaded = true;
        self.error = None;
    }

    /// Record a failure without touching the cached resources.
    pub fn ingest_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    /// Add or replace a single item (watch add/update).
    pub fn apply(&mut self, item: T) {
        let key = item.cache_key();
        match self.resources.iter_mut().find(|r| r.cache_key() == key) {
            Some(existing) => *existing = item,
            None => self.resources.push(item),
        }
    }

    /// Remove a single item (watch delete). Unknown items are ignored.
    pub fn delete(&mut self, item: &T) {
        let key = item.cache_key();
        self.resources.retain(|r| r.cache_key() != key);
    }

    pub fn resources(&self) -> &[T] {
        &self.resources
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.resources.iter().any(|r| r.cache_key() == key)
    }
}
