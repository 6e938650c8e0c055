//! Core library for the sluice API gateway: authentication, rate-limit
//! admission, persistence, and request forwarding. The `sluice-gateway`
//! binary wires these modules together behind an `actix-web` server.

pub mod cache;
pub mod config;
pub mod forwarder;
pub mod logs;
pub mod models;
pub mod pipeline;
pub mod store;
pub mod strategy;

pub use models::error::{ConfigError, GatewayError};
pub use pipeline::GatewayState;
