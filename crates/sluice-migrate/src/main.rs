//! Schema-provisioning CLI for the sluice rate store.
//!
//! The gateway never creates its own tables; this binary is run once
//! (manually, or by deployment tooling) against a fresh SQLite file before
//! the gateway starts.

use chrono::Utc;
use clap::Parser;
use log::{error, info};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::Executor;

#[derive(Parser, Debug)]
#[command(name = "sluice-migrate", version, about = "Provisions the sluice rate store schema")]
struct Cli {
    /// Path to the SQLite database file to provision.
    #[arg(long, default_value = "gateway.db")]
    db_file: String,

    /// Name of the fixed-window counter table to create.
    #[arg(long, default_value = "request_count")]
    table: String,

    /// Seed two demo users (ids "1" and "2") with non-zero quotas.
    #[arg(long)]
    seed: bool,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_env("RUST_LOG")
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli).await {
        error!("migration failed: {}", e);
        std::process::exit(1);
    }

    info!("migration completed successfully");
    Ok(())
}

async fn run(cli: &Cli) -> Result<(), sqlx::Error> {
    if !is_valid_table_identifier(&cli.table) {
        error!("invalid --table identifier: {}", cli.table);
        std::process::exit(1);
    }

    let url = format!("sqlite://{}?mode=rwc", cli.db_file);
    let pool = SqlitePoolOptions::new().max_connections(1).connect(&url).await?;

    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL DEFAULT '',
            quota REAL NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .await?;

    let window_table_sql = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            user_id TEXT NOT NULL,
            path TEXT NOT NULL,
            window_start INTEGER NOT NULL,
            count INTEGER NOT NULL,
            PRIMARY KEY (user_id, path, window_start)
        )
        "#,
        table = cli.table
    );
    pool.execute(window_table_sql.as_str()).await?;

    if cli.seed {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT OR REPLACE INTO users (id, name, quota, created_at) VALUES \
             ('1', 'Ionel', 0.5, ?), ('2', 'Ionela', 1.0, ?)",
        )
        .bind(&now)
        .bind(&now)
        .execute(&pool)
        .await?;
        info!("seeded demo users '1' (quota 0.5) and '2' (quota 1.0)");
    }

    pool.close().await;
    Ok(())
}

/// Duplicated, rather than depending on `sluice-core`, to keep this binary's
/// dependency footprint limited to schema provisioning concerns.
fn is_valid_table_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    !ident.is_empty() && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
