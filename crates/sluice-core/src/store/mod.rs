//! The rate store: a transactional SQLite-backed persistence layer for the
//! `users` and `request_count` tables.
//!
//! The gateway never creates these tables itself — that is the job of the
//! separate schema-provisioning binary (`sluice-migrate`); a missing table
//! surfaces here as a [`GatewayError::Store`].

use crate::models::error::GatewayError;
use crate::models::user::User;
use log::{error, warn};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tokio::time::{timeout, Duration};

/// Upper bound on how long a fixed-window transaction may run before it is
/// treated as a failure (fail-closed).
const WINDOW_TX_DEADLINE: Duration = Duration::from_secs(2);

/// Handle onto the persistent rate store.
#[derive(Clone)]
pub struct RateStore {
    pool: SqlitePool,
}

/// `true` iff `ident` is safe to interpolate into a SQL statement as a
/// table name: ASCII alphanumeric or underscore, not starting with a digit.
///
/// `sql_table` is operator-configured, not client-controlled, but since
/// sqlx cannot bind identifiers as parameters this check is the only thing
/// standing between a typo'd config and a broken query, and between a
/// malicious config and injection — so it is enforced at both config
/// validation time and here.
pub fn is_valid_table_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    !ident.is_empty() && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl RateStore {
    /// Opens a pooled connection to the SQLite file at `db_file`.
    pub async fn connect(db_file: &str) -> Result<Self, GatewayError> {
        let url = format!("sqlite://{}", db_file);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&url)
            .await
            .map_err(|e| GatewayError::Store(format!("failed to open {}: {}", db_file, e)))?;
        Ok(Self { pool })
    }

    /// Closes the pool, releasing all connections. Called on shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// `SELECT id, quota, created_at FROM users WHERE id = ?`.
    ///
    /// Returns `Ok(None)` when the user does not exist or has a zero quota —
    /// [`User::has_valid_quota`] folds the "zero quota is not a valid
    /// authenticated user" rule in here, so callers never need to repeat it.
    /// A miss and an I/O error are treated the same way by callers
    /// (`401 Unauthorized`, fail-closed) but logged differently.
    pub async fn lookup_quota(&self, user_id: &str) -> Result<Option<f64>, GatewayError> {
        let user: Option<User> =
            sqlx::query_as("SELECT id, quota, created_at FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    error!("lookup_quota({}) failed: {}", user_id, e);
                    GatewayError::Store(e.to_string())
                })?;

        Ok(user.filter(User::has_valid_quota).map(|u| u.quota))
    }

    /// `UPDATE users SET quota = ? WHERE id = ?`.
    pub async fn update_quota(&self, user_id: &str, quota: f64) -> Result<(), GatewayError> {
        sqlx::query("UPDATE users SET quota = ? WHERE id = ?")
            .bind(quota)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("update_quota({}) failed: {}", user_id, e);
                GatewayError::Store(e.to_string())
            })?;
        Ok(())
    }

    /// Runs the fixed-window admission algorithm in a single serializable
    /// transaction bounded by [`WINDOW_TX_DEADLINE`].
    ///
    /// Returns `Ok(true)`/`Ok(false)` for a clean admit/reject decision, and
    /// `Err` only for deadline expiry or connection failure — both of which
    /// the caller treats identically (fail-closed, `Ok(false)`-equivalent).
    pub async fn fixed_window_admit(
        &self,
        user_id: &str,
        path: &str,
        window_start: i64,
        max_requests: i64,
        sql_table: &str,
    ) -> Result<bool, GatewayError> {
        if !is_valid_table_identifier(sql_table) {
            return Err(GatewayError::Store(format!(
                "invalid sql_table identifier: {}",
                sql_table
            )));
        }

        let fut = self.fixed_window_admit_inner(user_id, path, window_start, max_requests, sql_table);
        match timeout(WINDOW_TX_DEADLINE, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "fixed_window_admit({}, {}) exceeded {:?} deadline",
                    user_id, path, WINDOW_TX_DEADLINE
                );
                Err(GatewayError::Store("transaction deadline exceeded".into()))
            }
        }
    }

    async fn fixed_window_admit_inner(
        &self,
        user_id: &str,
        path: &str,
        window_start: i64,
        max_requests: i64,
        sql_table: &str,
    ) -> Result<bool, GatewayError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| GatewayError::Store(e.to_string()))?;

        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(|e| GatewayError::Store(format!("begin tx failed: {}", e)))?;

        let select_sql = format!(
            "SELECT count FROM {} WHERE user_id = ? AND path = ? AND window_start = ?",
            sql_table
        );
        let row: Option<SqliteRow> = sqlx::query(&select_sql)
            .bind(user_id)
            .bind(path)
            .bind(window_start)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| GatewayError::Store(format!("query_window failed: {}", e)))?;

        let admit = match row {
            Some(row) => {
                let count: i64 = row.get("count");
                if count >= max_requests {
                    false
                } else {
                    let update_sql = format!(
                        "UPDATE {} SET count = count + 1 WHERE user_id = ? AND path = ? AND window_start = ?",
                        sql_table
                    );
                    sqlx::query(&update_sql)
                        .bind(user_id)
                        .bind(path)
                        .bind(window_start)
                        .execute(&mut *conn)
                        .await
                        .map_err(|e| GatewayError::Store(format!("increment_window failed: {}", e)))?;
                    true
                }
            }
            None => {
                // Opportunistic sweep of stale windows, outside the row's
                // contention path; failures here are non-fatal.
                let sweep_sql = format!("DELETE FROM {} WHERE window_start < ?", sql_table);
                if let Err(e) = sqlx::query(&sweep_sql)
                    .bind(window_start)
                    .execute(&mut *conn)
                    .await
                {
                    warn!("sweep_older_than({}) failed: {}", window_start, e);
                }

                let insert_sql = format!(
                    "INSERT INTO {} (user_id, path, window_start, count) VALUES (?, ?, ?, 1)",
                    sql_table
                );
                match sqlx::query(&insert_sql)
                    .bind(user_id)
                    .bind(path)
                    .bind(window_start)
                    .execute(&mut *conn)
                    .await
                {
                    Ok(_) => true,
                    Err(e) => {
                        // Lost the race against a concurrent first insert
                        // for this key; fail closed rather than retry.
                        warn!("insert_window({}, {}) lost the race: {}", user_id, path, e);
                        false
                    }
                }
            }
        };

        if admit {
            sqlx::query("COMMIT")
                .execute(&mut *conn)
                .await
                .map_err(|e| GatewayError::Store(format!("commit failed: {}", e)))?;
        } else {
            let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
        }

        Ok(admit)
    }
}
