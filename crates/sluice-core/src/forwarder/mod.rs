//! Forwards accepted requests to the single upstream service and proxies
//! its response back to the client.

use crate::models::error::GatewayError;
use actix_web::http::{Method as ActixMethod, StatusCode};
use actix_web::{web, HttpRequest, HttpResponse};
use log::{debug, info};
use reqwest::{Client, Method as ReqwestMethod};
use std::time::Duration;

const SKIP_REQUEST_HEADERS: &[&str] = &["host", "connection", "upgrade", "proxy-connection"];
const SKIP_RESPONSE_HEADERS: &[&str] = &["connection", "transfer-encoding"];

/// Relays accepted requests to a single, fixed upstream base address.
pub struct Forwarder {
    client: Client,
    upstream_base: String,
    shared_key: String,
}

impl Forwarder {
    /// Builds a forwarder targeting `upstream_base`, appending `shared_key`
    /// to every forwarded credential.
    pub fn new(upstream_base: String, shared_key: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(32)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build upstream HTTP client");

        Self {
            client,
            upstream_base,
            shared_key,
        }
    }

    /// Forwards `req`/`body` to the upstream, rewriting the `Authorization`
    /// header to `<original bearer, with its "Bearer " prefix>:<shared key>`,
    /// and proxies the response back verbatim (status, headers, body).
    pub async fn forward(
        &self,
        req: &HttpRequest,
        body: web::Bytes,
        bearer_with_prefix: &str,
    ) -> Result<HttpResponse, GatewayError> {
        let method = Self::to_reqwest_method(req.method());
        let mut headers = reqwest::header::HeaderMap::new();

        for (name, value) in req.headers() {
            let name_lower = name.as_str().to_ascii_lowercase();
            if SKIP_REQUEST_HEADERS.iter().any(|skip| name_lower.starts_with(skip)) {
                continue;
            }
            if let (Ok(name), Ok(value)) = (
                reqwest::header::HeaderName::from_bytes(name.as_ref()),
                reqwest::header::HeaderValue::from_bytes(value.as_bytes()),
            ) {
                headers.insert(name, value);
            }
        }

        let forwarded_token = format!("{}:{}", bearer_with_prefix, self.shared_key);
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&forwarded_token)
                .map_err(|e| GatewayError::Upstream(e.to_string()))?,
        );

        debug!("forwarding {} {} to {}", method, req.path(), self.upstream_base);

        let response = self
            .client
            .request(method, &self.upstream_base)
            .headers(headers)
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| GatewayError::Upstream(e.to_string()))?;

        info!(
            "upstream responded {} for {}",
            response.status(),
            self.upstream_base
        );

        let mut builder = HttpResponse::build(
            StatusCode::from_u16(response.status().as_u16())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        );

        for (name, value) in response.headers() {
            let name_lower = name.as_str().to_ascii_lowercase();
            if SKIP_RESPONSE_HEADERS.contains(&name_lower.as_str()) {
                continue;
            }
            if let Ok(value) = actix_web::http::header::HeaderValue::from_bytes(value.as_bytes()) {
                builder.insert_header((name.as_str(), value));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::Upstream(e.to_string()))?;

        Ok(builder.body(bytes))
    }

    fn to_reqwest_method(method: &ActixMethod) -> ReqwestMethod {
        match *method {
            ActixMethod::GET => ReqwestMethod::GET,
            ActixMethod::POST => ReqwestMethod::POST,
            ActixMethod::PUT => ReqwestMethod::PUT,
            ActixMethod::DELETE => ReqwestMethod::DELETE,
            ActixMethod::HEAD => ReqwestMethod::HEAD,
            ActixMethod::OPTIONS => ReqwestMethod::OPTIONS,
            ActixMethod::CONNECT => ReqwestMethod::CONNECT,
            ActixMethod::PATCH => ReqwestMethod::PATCH,
            ActixMethod::TRACE => ReqwestMethod::TRACE,
            _ => ReqwestMethod::GET,
        }
    }
}
