//! Application configuration model.
//!
//! This mirrors the TOML shape described in the configuration reference:
//! a `[gateway]` table, an `[api]` table, and a `[[routes]]` array of tables.
//! Deserialization only; environment overrides are applied afterward by
//! [`crate::config::loader`].

use crate::models::route::RouteLimit;
use serde::Deserialize;

/// Top-level gateway settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    /// Listen address, e.g. `0.0.0.0:8080`.
    pub address: String,

    /// Append-mode audit log path.
    pub log_file: String,

    /// Path to the persistent SQLite rate store.
    pub db_file: String,

    /// Cache freshness bound in minutes. Defaults to 10.
    #[serde(default = "default_cache_ttl_minutes")]
    pub user_cache_ttl_minutes: u64,

    /// Grace period for in-flight requests on shutdown, in seconds.
    #[serde(default = "default_shutdown_grace_seconds")]
    pub shutdown_grace_seconds: u64,
}

fn default_cache_ttl_minutes() -> u64 {
    10
}

fn default_shutdown_grace_seconds() -> u64 {
    1
}

/// Upstream API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    /// Upstream base URL. Auto-prefixed with `http://` if no scheme is present.
    pub address: String,

    /// Shared secret appended to the forwarded credential.
    pub key: String,
}

/// Root configuration document.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub gateway: GatewaySettings,
    pub api: ApiSettings,

    #[serde(default)]
    pub routes: Vec<RouteLimit>,
}

impl Settings {
    /// Validates every route's strategy parameters. Called once at startup,
    /// before any listener binds.
    pub fn validate(&self) -> Result<(), String> {
        if self.api.key.is_empty() {
            return Err("api.key must not be empty".to_string());
        }
        for route in &self.routes {
            route.validate()?;
        }
        Ok(())
    }

    /// Normalizes `api.address` to carry an explicit scheme, matching the
    /// "auto-prefixed with http:// if missing" rule.
    pub fn normalized_api_address(&self) -> String {
        if self.api.address.contains("://") {
            self.api.address.clone()
        } else {
            format!("http://{}", self.api.address)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_toml() {
        let toml_src = r#"
            [gateway]
            address = "0.0.0.0:8080"
            log_file = "gateway.log"
            db_file = "gateway.db"

            [api]
            address = "backend.internal:9000"
            key = "shared-secret"

            [[routes]]
            path = "/foo"
            strategy = "token_bucket"
            capacity = 3

            [[routes]]
            path = "/bar"
            strategy = "fixed_window"
            window_size = 2
        "#;

        let settings: Settings = toml::from_str(toml_src).unwrap();
        assert_eq!(settings.gateway.user_cache_ttl_minutes, 10);
        assert_eq!(settings.routes.len(), 2);
        assert!(settings.validate().is_ok());
        assert_eq!(
            settings.normalized_api_address(),
            "http://backend.internal:9000"
        );
    }
}
