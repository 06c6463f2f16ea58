//! Time-bounded cache of fetched source documents.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde_json::Value;

struct CachedDocument {
    document: Value,
    fetched_at: Instant,
}

/// Documents keyed by source location, expiring after a fixed TTL.
pub struct SourceCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedDocument>>,
}

impl SourceCache {
    /// Create a cache whose entries expire after `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Entry lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fetch an unexpired document.
    #[must_use]
    pub fn get(&self, location: &str) -> Option<Value> {
        let entries = self.entries.read();
        entries
            .get(location)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.document.clone())
    }

    /// Store a freshly fetched document.
    pub fn insert(&self, location: &str, document: Value) {
        let mut entries = self.entries.write();
        entries.retain(|_, entry| entry.fetched_at.elapsed() < self.ttl);
        entries.insert(
            location.to_owned(),
            CachedDocument {
                document,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Number of stored entries, including expired ones not yet evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl std::fmt::Debug for SourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.len())
            .finish()
    }
}
