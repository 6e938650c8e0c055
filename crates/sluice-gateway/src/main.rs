//! Sluice API gateway server entry point.
//!
//! Loads configuration, wires the rate store, user cache, per-route
//! strategies, forwarder and audit log into a [`GatewayState`], then serves
//! every request through the admission pipeline behind `actix-web`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use actix_web::middleware::Logger;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use clap::Parser;
use log::{error, info};
use sluice_core::cache::UserCache;
use sluice_core::config::{load_settings, DEFAULT_CONFIG_PATH};
use sluice_core::forwarder::Forwarder;
use sluice_core::logs::{configure_logger, AuditLog};
use sluice_core::models::route::StrategyKind;
use sluice_core::models::settings::Settings;
use sluice_core::store::RateStore;
use sluice_core::strategy::{FixedWindowStrategy, LimitStrategy, TokenBucketStrategy};
use sluice_core::GatewayState;

#[derive(Parser, Debug)]
#[command(name = "sluice-gateway", version, about = "Authenticating, rate-limiting API gateway")]
struct Cli {
    /// Path to the TOML configuration file. Falls back to
    /// [`DEFAULT_CONFIG_PATH`] when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

async fn handle(
    state: web::Data<Arc<GatewayState>>,
    req: HttpRequest,
    body: web::Bytes,
) -> HttpResponse {
    state.handle(req, body).await
}

fn build_strategies(
    settings: &Settings,
    store: &Arc<RateStore>,
) -> HashMap<String, Arc<dyn LimitStrategy>> {
    let mut strategies: HashMap<String, Arc<dyn LimitStrategy>> = HashMap::new();
    for route in &settings.routes {
        let strategy: Arc<dyn LimitStrategy> = match route.strategy_kind() {
            Ok(StrategyKind::TokenBucket { capacity }) => {
                Arc::new(TokenBucketStrategy::new(capacity))
            }
            Ok(StrategyKind::FixedWindow {
                window_size,
                sql_table,
            }) => Arc::new(FixedWindowStrategy::new(
                Arc::clone(store),
                window_size,
                sql_table,
            )),
            Err(e) => {
                // Settings::validate already rejected malformed routes at
                // load time; this branch should be unreachable in practice.
                panic!("route {} failed validation at startup: {}", route.path, e);
            }
        };
        strategies.insert(route.path.clone(), strategy);
    }
    strategies
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    configure_logger();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let settings = load_settings(&config_path).unwrap_or_else(|e| {
        error!("failed to load configuration from {:?}: {}", config_path, e);
        std::process::exit(1);
    });

    info!("starting sluice gateway, listening on {}", settings.gateway.address);

    let store = Arc::new(
        RateStore::connect(&settings.gateway.db_file)
            .await
            .unwrap_or_else(|e| {
                error!("failed to open rate store: {}", e);
                std::process::exit(1);
            }),
    );

    let audit_log = Arc::new(AuditLog::open(&settings.gateway.log_file).unwrap_or_else(|e| {
        error!("failed to open audit log {}: {}", settings.gateway.log_file, e);
        std::process::exit(1);
    }));

    let cache = UserCache::new(Duration::from_secs(settings.gateway.user_cache_ttl_minutes * 60));
    let strategies = build_strategies(&settings, &store);
    let forwarder = Forwarder::new(settings.normalized_api_address(), settings.api.key.clone());

    let state = Arc::new(GatewayState::new(
        cache,
        Arc::clone(&store),
        strategies,
        forwarder,
        Arc::clone(&audit_log),
    ));

    let bind_address = settings.gateway.address.clone();
    let shutdown_grace = settings.gateway.shutdown_grace_seconds;

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(Arc::clone(&state)))
            .wrap(Logger::new(r#"%a "%r" %s %b %T"#))
            .default_service(web::route().to(handle))
    })
    .bind(&bind_address)?
    .shutdown_timeout(shutdown_grace)
    .run();

    let server_handle = server.handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal, draining in-flight requests");
            server_handle.stop(true).await;
        }
    });

    let result = server.await;

    store.close().await;
    info!("sluice gateway stopped");
    result
}
