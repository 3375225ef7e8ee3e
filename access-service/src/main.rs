use std::net::SocketAddr;
use std::sync::Arc;

use access_service::{
    AppState, build_router,
    config::AccessConfig,
    services::{AccessResolver, AuditLogger, Database, PgAuditStore, PolicyStore, SecurityLevelHierarchy},
};
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use service_core::observability::{init_metrics, logging::init_tracing};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = AccessConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    let metrics_handle = init_metrics();

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting access resolver service"
    );

    // The level ladder is validated here; an unknown or ambiguous level
    // never survives to request time
    let hierarchy = Arc::new(
        SecurityLevelHierarchy::from_levels(&config.security_levels)
            .map_err(service_core::error::AppError::from)?,
    );
    tracing::info!(
        levels = config.security_levels.len(),
        "Security level hierarchy loaded"
    );

    tracing::info!("Connecting to PostgreSQL");
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .map_err(|e| {
            service_core::error::AppError::ConfigError(anyhow::anyhow!(
                "Failed to connect to PostgreSQL: {}",
                e
            ))
        })?;
    let db = Database::new(pool);
    db.health_check().await?;

    // Hydrate the policy store; snapshot build validates the whole catalog
    let catalog = db.load_catalog().await?;
    let store = Arc::new(PolicyStore::from_catalog(hierarchy, catalog)?);
    tracing::info!(
        snapshot_version = store.version()?,
        "Policy store hydrated"
    );

    let audit = AuditLogger::new(Arc::new(PgAuditStore::new(db.clone())));
    let resolver = AccessResolver::new(store.clone(), audit.clone());

    let ip_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.global_ip_limit,
        config.rate_limit.global_ip_window_seconds,
    );

    let port = config.common.port;
    let state = AppState {
        config,
        db,
        store,
        resolver,
        audit,
        metrics_handle,
        ip_rate_limiter,
    };

    let app = build_router(state).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
