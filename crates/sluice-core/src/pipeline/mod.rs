//! The admission pipeline: the single entry point every inbound request
//! passes through, in the strict order described in the component design.

use crate::cache::UserCache;
use crate::forwarder::Forwarder;
use crate::logs::AuditLog;
use crate::models::error::GatewayError;
use crate::store::RateStore;
use crate::strategy::LimitStrategy;
use actix_web::http::Method;
use actix_web::{web, HttpRequest, HttpResponse};
use log::warn;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// The reserved administrator credential. Preserved from the original
/// service; flagged here rather than silently hardened, per the spec's
/// open question on admin identity.
const ADMIN_USER_ID: &str = "0";

#[derive(Deserialize)]
struct AdminQuotaUpdate {
    rate: f64,
}

/// Immutable, shared gateway state constructed once at startup and handed
/// to every request handler behind `web::Data`.
pub struct GatewayState {
    cache: UserCache,
    store: Arc<RateStore>,
    strategies: HashMap<String, Arc<dyn LimitStrategy>>,
    forwarder: Forwarder,
    audit_log: Arc<AuditLog>,
}

impl GatewayState {
    pub fn new(
        cache: UserCache,
        store: Arc<RateStore>,
        strategies: HashMap<String, Arc<dyn LimitStrategy>>,
        forwarder: Forwarder,
        audit_log: Arc<AuditLog>,
    ) -> Self {
        Self {
            cache,
            store,
            strategies,
            forwarder,
            audit_log,
        }
    }

    /// Entry point for every inbound HTTP request: runs the pipeline and
    /// recovers any error into its mapped HTTP response, auditing the
    /// rejection along the way.
    pub async fn handle(&self, req: HttpRequest, body: web::Bytes) -> HttpResponse {
        let raw_bearer = extract_raw_bearer(&req);

        match self.admit(&req, body, raw_bearer.as_deref()).await {
            Ok(response) => response,
            Err(err) => {
                self.audit_log
                    .write_rejection(err.kind(), req.path(), raw_bearer.as_deref());
                actix_web::ResponseError::error_response(&err)
            }
        }
    }

    async fn admit(
        &self,
        req: &HttpRequest,
        body: web::Bytes,
        raw_bearer: Option<&str>,
    ) -> Result<HttpResponse, GatewayError> {
        // Step 1: auth extraction.
        let user_id = raw_bearer
            .filter(|s| !s.is_empty())
            .ok_or(GatewayError::Unauthorized)?;

        // Step 2: user validation (cache, then store; fail-closed).
        let quota = self.resolve_quota(user_id).await?;

        // Step 3: admin fast path.
        if req.method() == Method::PUT && req.path().starts_with("/users/") {
            return self.handle_admin(req, body, user_id).await;
        }

        // Step 4: strategy dispatch.
        let strategy = self
            .strategies
            .get(req.path())
            .ok_or(GatewayError::NotFound)?;

        // Step 5: admission.
        if !strategy.accept(user_id, quota, req.path()).await {
            return Err(GatewayError::LimitExceeded);
        }

        // Step 6: forward. The upstream verifies the shared-secret suffix
        // against the full original bearer header, prefix included.
        let bearer_with_prefix = format!("Bearer {}", user_id);
        self.forwarder.forward(req, body, &bearer_with_prefix).await
    }

    /// Resolves `user_id`'s quota via the cache, falling through to the
    /// store on a miss. A quota of zero, a missing user, and a store I/O
    /// error are all surfaced identically as `Unauthorized` (fail-closed).
    async fn resolve_quota(&self, user_id: &str) -> Result<f64, GatewayError> {
        if let Some(quota) = self.cache.get(user_id) {
            return Ok(quota);
        }

        match self.store.lookup_quota(user_id).await {
            Ok(Some(quota)) => {
                self.cache.put(user_id, quota);
                Ok(quota)
            }
            Ok(None) => Err(GatewayError::Unauthorized),
            Err(e) => {
                warn!("quota lookup failed for {}: {}", user_id, e);
                Err(GatewayError::Unauthorized)
            }
        }
    }

    async fn handle_admin(
        &self,
        req: &HttpRequest,
        body: web::Bytes,
        user_id: &str,
    ) -> Result<HttpResponse, GatewayError> {
        if user_id != ADMIN_USER_ID {
            return Err(GatewayError::Unauthorized);
        }

        let victim_id = parse_victim_id(req.path())?;

        let update: AdminQuotaUpdate = serde_json::from_slice(&body)
            .map_err(|e| GatewayError::BadRequest(e.to_string()))?;

        self.store.update_quota(victim_id, update.rate).await?;
        self.cache.put(victim_id, update.rate);
        self.audit_log.write_admin_mutation(victim_id, update.rate);

        let literal_body = format!("{{userId: {}, rate: {:.3}}}", victim_id, update.rate);
        Ok(HttpResponse::Ok()
            .content_type("application/json")
            .body(literal_body))
    }
}

/// Extracts the raw value after `Bearer `, without validating it — used
/// both for the pipeline's own step 1 and for audit-logging context on
/// every code path, even ones that reject before full auth resolution.
fn extract_raw_bearer(req: &HttpRequest) -> Option<String> {
    let header = req.headers().get("Authorization")?;
    let value = header.to_str().ok()?;
    value.strip_prefix("Bearer ").map(|s| s.to_string())
}

/// Parses `/users/<victim_id>` into `victim_id`, splitting on `/` and
/// taking the third segment the way the original service's
/// `strings.Split(path, "/")[2]` does — trailing segments past the id
/// (`/users/5/extra`) are ignored rather than folded into the id.
fn parse_victim_id(path: &str) -> Result<&str, GatewayError> {
    let parts: Vec<&str> = path.split('/').collect();
    let victim_id = parts
        .get(2)
        .copied()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| GatewayError::BadRequest("missing victim id".to_string()))?;
    Ok(victim_id)
}
