//! Configuration loading: read the TOML file, deserialize, apply
//! environment overrides, then validate.
//!
//! Mirrors the original service's `config.Load` / `Parse` split, but with
//! `serde` + `toml` doing the heavy lifting instead of hand-rolled decoding.

use crate::models::error::ConfigError;
use crate::models::settings::Settings;
use log::info;
use std::path::Path;

/// Default config path used when none is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "gateway.toml";

/// Loads and validates settings from `path`, applying the `PORT` and
/// `API_ADDRESS` environment overrides described in the configuration
/// reference.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let mut settings: Settings = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    apply_env_overrides(&mut settings);

    settings
        .validate()
        .map_err(ConfigError::Invalid)?;

    Ok(settings)
}

/// Applies the `PORT` and `API_ADDRESS` environment overrides in place.
///
/// `PORT` rewrites only the port of `gateway.address`, preserving whatever
/// host was configured. `API_ADDRESS` replaces `api.address` wholesale.
fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(port) = std::env::var("PORT") {
        let host = settings
            .gateway
            .address
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or("0.0.0.0");
        info!("PORT override: listening on port {}", port);
        settings.gateway.address = format!("{}:{}", host, port);
    }

    if let Ok(api_address) = std::env::var("API_ADDRESS") {
        info!("API_ADDRESS override: forwarding to {}", api_address);
        settings.api.address = api_address;
    }
}
