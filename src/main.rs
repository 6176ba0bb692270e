use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use hms_core::constants::DEFAULT_REST_ADDR;
use hms_core::{Database, core_config_from_env};

/// Main entry point for the HMS portal
///
/// Resolves configuration once, opens and migrates the database, then serves the REST API.
///
/// # Environment Variables
/// - `HMS_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `DATABASE_URL`: SQLite database URL (default: "sqlite://hms.db?mode=rwc")
/// - `HMS_DB_MAX_CONNECTIONS`: connection pool size (default: 5)
/// - `HMS_ARGON2_MEMORY_KIB`, `HMS_ARGON2_ITERATIONS`: password hashing cost
/// - `RUST_LOG`: extra tracing directives
///
/// # Errors
/// Returns an error if:
/// - configuration is invalid,
/// - the database cannot be opened or migrated,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hms_run=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("hms_core=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Arc::new(core_config_from_env()?);
    let db = Database::connect(&cfg).await?;
    db.migrate().await?;

    let rest_addr = std::env::var("HMS_REST_ADDR").unwrap_or_else(|_| DEFAULT_REST_ADDR.into());
    tracing::info!("++ Starting HMS REST on {}", rest_addr);

    let app = api_rest::router(AppState::new(cfg, db.clone()));
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutting down");
        })
        .await?;

    db.close().await;
    Ok(())
}
