use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rocket::tokio::sync::Mutex;

#[derive(Clone)]
struct CachedEntry<T> {
    value: T,
    stored_at: Instant,
}

/// Responses keyed by a plain string, expired after `ttl` or on manual invalidation.
pub struct ResponseCache<T> {
    entries: Arc<Mutex<HashMap<String, CachedEntry<T>>>>,
    ttl: Duration,
}

impl<T: Clone> ResponseCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    pub async fn get(&self, key: &str) -> Option<T> {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.value.clone())
    }

    /// Stores `value` and drops every entry that has expired.
    pub async fn store(&self, key: impl Into<String>, value: T) {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
        entries.insert(
            key.into(),
            CachedEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub async fn invalidate(&self, key: &str) {
        let mut entries = self.entries.lock().await;
        entries.remove(key);
    }

    pub async fn invalidate_prefix(&self, prefix: &str) {
        let mut entries = self.entries.lock().await;
        entries.retain(|key, _| !key.starts_with(prefix));
    }
}
