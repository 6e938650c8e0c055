//! Store-backed fixed window strategy.
//!
//! Unlike the token bucket, this strategy holds no in-process state: window
//! counters live in the rate store, and correctness under concurrent
//! admissions is delegated entirely to the store's serializable
//! transactions (see [`crate::store::RateStore::fixed_window_admit`]).

use super::LimitStrategy;
use crate::store::RateStore;
use async_trait::async_trait;
use log::error;
use std::sync::Arc;

/// Fixed window admission strategy for one configured route.
pub struct FixedWindowStrategy {
    store: Arc<RateStore>,
    length_seconds: u64,
    sql_table: String,
}

impl FixedWindowStrategy {
    pub fn new(store: Arc<RateStore>, length_seconds: u64, sql_table: String) -> Self {
        Self {
            store,
            length_seconds,
            sql_table,
        }
    }
}

#[async_trait]
impl LimitStrategy for FixedWindowStrategy {
    async fn accept(&self, user_id: &str, rate_per_sec: f64, path: &str) -> bool {
        let now_seconds = chrono::Utc::now().timestamp();
        let length = self.length_seconds as i64;
        let window_start = now_seconds - now_seconds.rem_euclid(length);
        let max_requests = (rate_per_sec * self.length_seconds as f64).floor() as i64;

        match self
            .store
            .fixed_window_admit(user_id, path, window_start, max_requests, &self.sql_table)
            .await
        {
            Ok(admitted) => admitted,
            Err(e) => {
                error!("fixed_window accept({}, {}) failed: {}", user_id, path, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn strategy_with_fresh_store(length_seconds: u64) -> FixedWindowStrategy {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("gateway.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.to_str().unwrap());

        let setup_pool = SqlitePoolOptions::new().max_connections(1).connect(&url).await.unwrap();
        sqlx::query(
            "CREATE TABLE request_count (user_id TEXT, path TEXT, window_start INTEGER, count INTEGER, \
             PRIMARY KEY (user_id, path, window_start))",
        )
        .execute(&setup_pool)
        .await
        .unwrap();
        setup_pool.close().await;

        // Leak the tempdir so the file outlives this function; the pool
        // connects independently right after.
        std::mem::forget(dir);
        let store = RateStore::connect(db_path.to_str().unwrap()).await.unwrap();
        FixedWindowStrategy::new(Arc::new(store), length_seconds, "request_count".to_string())
    }

    #[tokio::test]
    async fn caps_at_max_requests_within_a_window() {
        // length = 2s, rate = 1.0 => max_requests = floor(1.0 * 2) = 2.
        let strategy = strategy_with_fresh_store(2).await;
        assert!(strategy.accept("2", 1.0, "/foo").await);
        assert!(strategy.accept("2", 1.0, "/foo").await);
        assert!(!strategy.accept("2", 1.0, "/foo").await);
    }

    #[tokio::test]
    async fn isolates_distinct_users_and_paths() {
        let strategy = strategy_with_fresh_store(2).await;
        assert!(strategy.accept("a", 1.0, "/foo").await);
        assert!(strategy.accept("a", 1.0, "/foo").await);
        assert!(!strategy.accept("a", 1.0, "/foo").await);

        // Distinct user, same window: independent counter.
        assert!(strategy.accept("b", 1.0, "/foo").await);
        // Distinct path, same user: independent counter.
        assert!(strategy.accept("a", 1.0, "/bar").await);
    }

    #[tokio::test]
    async fn resets_after_the_window_elapses() {
        let strategy = strategy_with_fresh_store(1).await;
        assert!(strategy.accept("3", 1.0, "/foo").await);
        assert!(!strategy.accept("3", 1.0, "/foo").await);

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        assert!(strategy.accept("3", 1.0, "/foo").await);
    }
}
