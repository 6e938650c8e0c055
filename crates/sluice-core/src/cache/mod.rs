//! In-memory, TTL-bounded cache of `user_id -> quota`.
//!
//! A read-through accelerator over the rate store: the store is ground
//! truth, the cache is only ever a hint. Safe for concurrent readers and
//! writers via a single [`parking_lot::RwLock`]-protected map — the
//! original service used an unlocked map here, which this implementation
//! fixes per the specification's mandate.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct Entry {
    quota: f64,
    inserted_at: Instant,
}

/// Read-through user-rate cache with a uniform TTL.
pub struct UserCache {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
}

impl UserCache {
    /// Creates an empty cache with the given freshness bound.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns the cached quota for `user_id` if present and fresh.
    ///
    /// A quota of exactly zero is treated identically to absence: zero
    /// quota never describes a valid authenticated user. Stale entries are
    /// evicted lazily on read.
    pub fn get(&self, user_id: &str) -> Option<f64> {
        {
            let entries = self.entries.read();
            match entries.get(user_id) {
                Some(entry) if entry.inserted_at.elapsed() <= self.ttl => {
                    if entry.quota > 0.0 {
                        return Some(entry.quota);
                    }
                    return None;
                }
                Some(_) => {
                    // stale; fall through to evict under the write lock
                }
                None => return None,
            }
        }
        self.entries.write().remove(user_id);
        None
    }

    /// Upserts `user_id -> quota`, resetting the entry's freshness clock.
    pub fn put(&self, user_id: &str, quota: f64) {
        self.entries.write().insert(
            user_id.to_string(),
            Entry {
                quota,
                inserted_at: Instant::now(),
            },
        );
    }
}
