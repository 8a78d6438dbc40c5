//! Process-wide URL cache (component C).
//!
//! A read-heavy map from normalised queue name to queue URL, shared via
//! `Arc` clones across the resolver, pipeline, and worker loop. Mirrors the
//! `Arc<RwLock<HashMap<...>>>` shape the sibling MTA uses for its delivery
//! queue, substituting `parking_lot` for the blocking critical sections
//! involved (lookups and inserts, never an `.await` while held).

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

#[derive(Debug, Clone, Default)]
pub struct UrlCache(Arc<RwLock<HashMap<String, String>>>);

impl UrlCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        self.0.read().get(name).cloned()
    }

    pub fn set(&self, name: impl Into<String>, url: impl Into<String>) {
        self.0.write().insert(name.into(), url.into());
    }

    pub fn invalidate(&self, name: &str) {
        self.0.write().remove(name);
    }

    pub fn clear(&self) {
        self.0.write().clear();
    }

    /// Ingests a bulk listing, e.g. from `ListQueues`. The cache key is the
    /// trailing path segment of each URL, which is the canonical queue name.
    pub fn ingest<I, S>(&self, urls: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut guard = self.0.write();
        for url in urls {
            let url = url.as_ref();
            if let Some(name) = url.rsplit('/').next() {
                guard.insert(name.to_string(), url.to_string());
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_is_a_pure_lookup() {
        let cache = UrlCache::new();
        assert_eq!(cache.get("missing"), None);
        cache.set("orders", "https://queue.example/orders");
        assert_eq!(cache.get("orders"), Some("https://queue.example/orders".to_string()));
    }

    #[test]
    fn ingest_extracts_the_trailing_path_segment_as_the_key() {
        let cache = UrlCache::new();
        cache.ingest([
            "https://queue.example/acct/qdone_orders",
            "https://queue.example/acct/qdone_orders_failed",
        ]);
        assert_eq!(cache.len(), 2);
        assert_eq!(
            cache.get("qdone_orders"),
            Some("https://queue.example/acct/qdone_orders".to_string())
        );
    }

    #[test]
    fn invalidate_and_clear() {
        let cache = UrlCache::new();
        cache.set("a", "url-a");
        cache.set("b", "url-b");
        cache.invalidate("a");
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
