//! In-memory token bucket strategy.
//!
//! State is process-local: a restart drops every bucket. A single mutex
//! protects all buckets owned by this strategy instance; it is held only
//! around the O(1) arithmetic below, never across I/O.

use super::LimitStrategy;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Instant;

struct UserBucket {
    tokens: u32,
    last_refill: Instant,
}

/// Token bucket admission strategy, keyed by `(path, user_id)`.
pub struct TokenBucketStrategy {
    capacity: u32,
    created_at: Instant,
    buckets: Mutex<HashMap<String, HashMap<String, UserBucket>>>,
}

impl TokenBucketStrategy {
    /// Creates a new strategy instance with the configured bucket capacity.
    /// `capacity` must be > 0 (enforced by [`crate::models::route::RouteLimit::validate`]).
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            created_at: Instant::now(),
            buckets: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl LimitStrategy for TokenBucketStrategy {
    async fn accept(&self, user_id: &str, rate_per_sec: f64, path: &str) -> bool {
        let mut buckets = self.buckets.lock();
        let path_buckets = buckets.entry(path.to_string()).or_insert_with(HashMap::new);
        let created_at = self.created_at;
        let bucket = path_buckets.entry(user_id.to_string()).or_insert_with(|| UserBucket {
            tokens: 0,
            last_refill: created_at,
        });

        let now = Instant::now();
        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        let refill = (elapsed * rate_per_sec).floor() as u32;

        bucket.tokens = self.capacity.min(bucket.tokens.saturating_add(refill));
        bucket.last_refill = now;

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn burst_bound_is_exact() {
        let strategy = TokenBucketStrategy::new(3);
        assert!(strategy.accept("1", 0.5, "/foo").await);
        assert!(strategy.accept("1", 0.5, "/foo").await);
        assert!(strategy.accept("1", 0.5, "/foo").await);
        assert!(!strategy.accept("1", 0.5, "/foo").await);
    }

    #[tokio::test]
    async fn isolation_across_paths_and_users() {
        let strategy = TokenBucketStrategy::new(1);
        assert!(strategy.accept("a", 1.0, "/pathA").await);
        assert!(!strategy.accept("a", 1.0, "/pathA").await);

        // Different path, same user: independent bucket.
        assert!(strategy.accept("a", 1.0, "/pathB").await);
        // Same path, different user: independent bucket.
        assert!(strategy.accept("b", 1.0, "/pathA").await);
    }

    #[tokio::test]
    async fn refill_is_rate_limited_over_time() {
        let strategy = TokenBucketStrategy::new(1);
        assert!(strategy.accept("1", 1000.0, "/foo").await);
        assert!(!strategy.accept("1", 1000.0, "/foo").await);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert!(strategy.accept("1", 1000.0, "/foo").await);
    }
}
