//! Gateway error taxonomy and its mapping onto the fixed HTTP response bodies.
//!
//! The admission pipeline never lets an error escape; every fallible step
//! returns a [`GatewayError`] and the top-level handler converts it into an
//! `HttpResponse` via [`actix_web::error::ResponseError`]. Bodies are the
//! literal (non strict-JSON) strings the original service emits.

use actix_web::{HttpResponse, http::StatusCode};

/// Errors produced anywhere in the admission pipeline.
///
/// Variants map 1:1 onto the taxonomy described for the gateway: each one
/// carries just enough context for the audit logger, not for the client —
/// the client only ever sees the fixed literal body for its status code.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Missing, malformed, or unknown credential.
    #[error("unauthorized")]
    Unauthorized,

    /// No strategy is configured for the requested path.
    #[error("not found")]
    NotFound,

    /// The strategy rejected the request.
    #[error("rate limit exceeded")]
    LimitExceeded,

    /// Malformed admin payload or URL.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Rate-store I/O failure or timeout.
    #[error("store error: {0}")]
    Store(String),

    /// Forwarding to the upstream failed.
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl GatewayError {
    /// The audit-log kind for this error, as named in the admission spec.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Unauthorized => "unauthorized",
            GatewayError::NotFound => "not_found",
            GatewayError::LimitExceeded => "rate_limit_exceeded",
            GatewayError::BadRequest(_) => "bad_request",
            GatewayError::Store(_) => "internal_server_error",
            GatewayError::Upstream(_) => "internal_server_error",
        }
    }
}

impl actix_web::error::ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::LimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Store(_) | GatewayError::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            GatewayError::Unauthorized => "{error: 'unauthorized'}",
            GatewayError::NotFound => "{error: 'not found'}",
            GatewayError::LimitExceeded => "{error: 'rate limit exceeded'}",
            GatewayError::BadRequest(_) => "{error: 'bad request'}",
            GatewayError::Store(_) | GatewayError::Upstream(_) => {
                "{error: 'internal server error'}"
            }
        };
        HttpResponse::build(self.status_code())
            .content_type("application/json")
            .body(body)
    }
}

/// Startup-only configuration failure. Never reaches the HTTP layer: `main`
/// prints it to stderr and exits non-zero before binding a listener.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
