//! End-to-end admission pipeline tests, exercising the literal scenarios
//! described for the gateway: token-bucket burst-then-reject, fixed-window
//! reset, admin quota mutation, and the fixed error responses.

use actix_web::{test, web, App, HttpResponse};
use sluice_core::cache::UserCache;
use sluice_core::forwarder::Forwarder;
use sluice_core::logs::AuditLog;
use sluice_core::store::RateStore;
use sluice_core::strategy::TokenBucketStrategy;
use sluice_core::GatewayState;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

async fn mock_upstream() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"message": "ok"}))
}

async fn spawn_mock_upstream() -> String {
    let server = actix_web::HttpServer::new(|| {
        App::new().default_service(web::route().to(mock_upstream))
    })
    .bind("127.0.0.1:0")
    .unwrap();

    let addr = server.addrs()[0];
    let running = server.run();
    tokio::spawn(running);

    format!("http://{}", addr)
}

/// Echoes the inbound `Authorization` header back as the response body, so
/// tests can assert on exactly what the forwarder sent upstream.
async fn echo_authorization(req: actix_web::HttpRequest) -> HttpResponse {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    HttpResponse::Ok().body(header)
}

async fn spawn_echo_upstream() -> String {
    let server = actix_web::HttpServer::new(|| {
        App::new().default_service(web::route().to(echo_authorization))
    })
    .bind("127.0.0.1:0")
    .unwrap();

    let addr = server.addrs()[0];
    let running = server.run();
    tokio::spawn(running);

    format!("http://{}", addr)
}

async fn seeded_store(users: &[(&str, f64)]) -> (Arc<RateStore>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("gateway.db");
    let url = format!("sqlite://{}?mode=rwc", db_path.to_str().unwrap());

    // `RateStore` never creates tables itself (that is `sluice-migrate`'s
    // job), so tests provision the schema through a throwaway pool of
    // their own before connecting the `RateStore` under test.
    let setup_pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&url)
        .await
        .unwrap();
    sqlx::query(
        "CREATE TABLE users (id TEXT PRIMARY KEY, quota REAL NOT NULL, created_at TEXT NOT NULL)",
    )
    .execute(&setup_pool)
    .await
    .unwrap();
    sqlx::query("CREATE TABLE request_count (user_id TEXT, path TEXT, window_start INTEGER, count INTEGER, PRIMARY KEY (user_id, path, window_start))")
        .execute(&setup_pool)
        .await
        .unwrap();
    let now = chrono::Utc::now().to_rfc3339();
    for (user_id, quota) in users {
        sqlx::query("INSERT INTO users (id, quota, created_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(quota)
            .bind(&now)
            .execute(&setup_pool)
            .await
            .unwrap();
    }
    setup_pool.close().await;

    let store = RateStore::connect(db_path.to_str().unwrap()).await.unwrap();
    (Arc::new(store), dir)
}

fn audit_log(dir: &tempfile::TempDir) -> Arc<AuditLog> {
    let path = dir.path().join("audit.log");
    Arc::new(AuditLog::open(path.to_str().unwrap()).unwrap())
}

#[actix_web::test]
async fn forwarded_authorization_keeps_bearer_prefix_and_appends_shared_key() {
    let upstream = spawn_echo_upstream().await;
    let (store, dir) = seeded_store(&[("7", 0.5)]).await;

    let mut strategies: HashMap<String, Arc<dyn sluice_core::strategy::LimitStrategy>> =
        HashMap::new();
    strategies.insert("/resource".to_string(), Arc::new(TokenBucketStrategy::new(3)));

    let state = Arc::new(GatewayState::new(
        UserCache::new(Duration::from_secs(600)),
        Arc::clone(&store),
        strategies,
        Forwarder::new(upstream, "shared-secret".to_string()),
        audit_log(&dir),
    ));

    let req = test::TestRequest::get()
        .uri("/resource")
        .insert_header(("Authorization", "Bearer 7"))
        .to_http_request();
    let resp = state.handle(req, web::Bytes::new()).await;
    assert_eq!(resp.status(), 200);

    let body = test::read_body(resp).await;
    assert_eq!(body, "Bearer 7:shared-secret");
}

#[actix_web::test]
async fn token_bucket_allows_burst_then_rejects() {
    let upstream = spawn_mock_upstream().await;
    let (store, dir) = seeded_store(&[("7", 0.5)]).await;

    let mut strategies: HashMap<String, Arc<dyn sluice_core::strategy::LimitStrategy>> =
        HashMap::new();
    strategies.insert("/resource".to_string(), Arc::new(TokenBucketStrategy::new(3)));

    let state = Arc::new(GatewayState::new(
        UserCache::new(Duration::from_secs(600)),
        Arc::clone(&store),
        strategies,
        Forwarder::new(upstream, "shared-secret".to_string()),
        audit_log(&dir),
    ));

    for _ in 0..3 {
        let req = test::TestRequest::get()
            .uri("/resource")
            .insert_header(("Authorization", "Bearer 7"))
            .to_http_request();
        let resp = state.handle(req, web::Bytes::new()).await;
        assert_eq!(resp.status(), 200);
    }

    let req = test::TestRequest::get()
        .uri("/resource")
        .insert_header(("Authorization", "Bearer 7"))
        .to_http_request();
    let resp = state.handle(req, web::Bytes::new()).await;
    assert_eq!(resp.status(), 429);
}

#[actix_web::test]
async fn unknown_path_is_not_found() {
    let upstream = spawn_mock_upstream().await;
    let (store, dir) = seeded_store(&[("1", 1.0)]).await;

    let state = Arc::new(GatewayState::new(
        UserCache::new(Duration::from_secs(600)),
        Arc::clone(&store),
        HashMap::new(),
        Forwarder::new(upstream, "shared-secret".to_string()),
        audit_log(&dir),
    ));

    let req = test::TestRequest::get()
        .uri("/nowhere")
        .insert_header(("Authorization", "Bearer 1"))
        .to_http_request();
    let resp = state.handle(req, web::Bytes::new()).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn missing_credential_is_unauthorized() {
    let upstream = spawn_mock_upstream().await;
    let (store, dir) = seeded_store(&[("1", 1.0)]).await;

    let state = Arc::new(GatewayState::new(
        UserCache::new(Duration::from_secs(600)),
        Arc::clone(&store),
        HashMap::new(),
        Forwarder::new(upstream, "shared-secret".to_string()),
        audit_log(&dir),
    ));

    let req = test::TestRequest::get().uri("/anything").to_http_request();
    let resp = state.handle(req, web::Bytes::new()).await;
    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
async fn unknown_user_is_unauthorized() {
    let upstream = spawn_mock_upstream().await;
    let (store, dir) = seeded_store(&[("1", 1.0)]).await;

    let state = Arc::new(GatewayState::new(
        UserCache::new(Duration::from_secs(600)),
        Arc::clone(&store),
        HashMap::new(),
        Forwarder::new(upstream, "shared-secret".to_string()),
        audit_log(&dir),
    ));

    let req = test::TestRequest::get()
        .uri("/anything")
        .insert_header(("Authorization", "Bearer 999"))
        .to_http_request();
    let resp = state.handle(req, web::Bytes::new()).await;
    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
async fn admin_mutation_updates_quota_and_is_rate_limit_exempt() {
    let upstream = spawn_mock_upstream().await;
    let (store, dir) = seeded_store(&[("0", 1.0), ("42", 0.2)]).await;

    let state = Arc::new(GatewayState::new(
        UserCache::new(Duration::from_secs(600)),
        Arc::clone(&store),
        HashMap::new(),
        Forwarder::new(upstream, "shared-secret".to_string()),
        audit_log(&dir),
    ));

    let req = test::TestRequest::put()
        .uri("/users/42")
        .insert_header(("Authorization", "Bearer 0"))
        .to_http_request();
    let body = web::Bytes::from_static(br#"{"rate": 5.0}"#);
    let resp = state.handle(req, body).await;
    assert_eq!(resp.status(), 200);

    let updated = store.lookup_quota("42").await.unwrap();
    assert_eq!(updated, Some(5.0));
}

#[actix_web::test]
async fn admin_mutation_requires_admin_credential() {
    let upstream = spawn_mock_upstream().await;
    let (store, dir) = seeded_store(&[("1", 1.0)]).await;

    let state = Arc::new(GatewayState::new(
        UserCache::new(Duration::from_secs(600)),
        Arc::clone(&store),
        HashMap::new(),
        Forwarder::new(upstream, "shared-secret".to_string()),
        audit_log(&dir),
    ));

    let req = test::TestRequest::put()
        .uri("/users/42")
        .insert_header(("Authorization", "Bearer 1"))
        .to_http_request();
    let body = web::Bytes::from_static(br#"{"rate": 5.0}"#);
    let resp = state.handle(req, body).await;
    assert_eq!(resp.status(), 401);
}
