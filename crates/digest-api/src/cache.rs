//! TTL response cache.
//!
//! Entries are keyed by path plus normalized query parameters and expire
//! only by TTL; there is no invalidation on write, so TTLs stay short
//! enough to bound staleness to the expected write cadence. Only
//! successful, found responses are cached.

use bytes::Bytes;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// TTL class chosen per response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheClass {
    /// Current-value lookup by key.
    Point,
    /// Page that came back under `limit` items; likely to grow soon.
    PartialPage,
    /// Page that came back exactly `limit` items; stable content.
    FullPage,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    body: Bytes,
    expires_at: Instant,
}

/// Concurrent TTL cache over serialized response bodies.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live entry for the key, dropping it if expired.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(entry.body.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    pub fn put(&self, key: &str, body: Bytes, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                body,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Drops expired entries; called from a periodic sweep task.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Background sweep for stale entries.
pub async fn sweep_task(cache: std::sync::Arc<ResponseCache>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        cache.purge_expired();
    }
}
