//! Route-level rate-limit configuration.
//!
//! A [`RouteLimit`] is the immutable, per-path configuration produced by the
//! config loader at startup. It never changes for the lifetime of the
//! process (non-goal: dynamic route reconfiguration without restart).
//!
//! The TOML shape is intentionally flat (one table per route, not an
//! internally-tagged enum) so every field in a `[[routes]]` entry stays a
//! plain key — mirroring the original configuration's flat route record.

use serde::Deserialize;

fn default_sql_table() -> String {
    "request_count".to_string()
}

/// One configured route: the path it guards and the strategy applied to it.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteLimit {
    pub path: String,
    pub strategy: String,

    /// `token_bucket` only; required, > 0.
    pub capacity: Option<u32>,

    /// `fixed_window` only; required, > 0.
    pub window_size: Option<u64>,

    /// `fixed_window` only; defaults to `request_count`.
    #[serde(default = "default_sql_table")]
    pub sql_table: String,
}

/// The strategy parameters resolved from a [`RouteLimit`], once validated.
#[derive(Debug, Clone)]
pub enum StrategyKind {
    TokenBucket { capacity: u32 },
    FixedWindow { window_size: u64, sql_table: String },
}

impl RouteLimit {
    /// Validates strategy-specific parameters, mirroring the checks the
    /// original config parser performed.
    pub fn validate(&self) -> Result<(), String> {
        if self.path.is_empty() {
            return Err("route path must not be empty".to_string());
        }
        self.strategy_kind()
    }

    /// Resolves this route's strategy name into a concrete, validated kind.
    pub fn strategy_kind(&self) -> Result<StrategyKind, String> {
        match self.strategy.as_str() {
            "token_bucket" => {
                let capacity = self
                    .capacity
                    .ok_or_else(|| format!("capacity is required for route {}", self.path))?;
                if capacity == 0 {
                    return Err(format!("capacity must be > 0 for route {}", self.path));
                }
                Ok(StrategyKind::TokenBucket { capacity })
            }
            "fixed_window" => {
                let window_size = self
                    .window_size
                    .ok_or_else(|| format!("window_size is required for route {}", self.path))?;
                if window_size == 0 {
                    return Err(format!("window_size must be > 0 for route {}", self.path));
                }
                if !crate::store::is_valid_table_identifier(&self.sql_table) {
                    return Err(format!(
                        "sql_table '{}' is not a valid identifier for route {}",
                        self.sql_table, self.path
                    ));
                }
                Ok(StrategyKind::FixedWindow {
                    window_size,
                    sql_table: self.sql_table.clone(),
                })
            }
            other => Err(format!(
                "invalid strategy '{}' for route {}",
                other, self.path
            )),
        }
    }
}
