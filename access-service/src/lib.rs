pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
};
use metrics_exporter_prometheus::PrometheusHandle;
use service_core::middleware::{
    metrics::metrics_middleware, rate_limit::IpRateLimiter,
    rate_limit::ip_rate_limit_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AccessConfig;
use crate::services::{AccessResolver, AuditLogger, Database, PolicyStore};
use service_core::error::AppError;

/// Shared application state. Everything here is explicit construction-time
/// wiring; the decision path never reaches for ambient globals.
#[derive(Clone)]
pub struct AppState {
    pub config: AccessConfig,
    pub db: Database,
    pub store: Arc<PolicyStore>,
    pub resolver: AccessResolver,
    pub audit: AuditLogger,
    pub metrics_handle: PrometheusHandle,
    pub ip_rate_limiter: IpRateLimiter,
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    let ip_limiter = state.ip_rate_limiter.clone();

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        // Evaluation API
        .route("/access/check", post(handlers::access::check_access))
        .route("/access/filter", post(handlers::access::filter_allowed))
        // Audit query API
        .route("/audit/records", get(handlers::audit::list_access_logs))
        // Administrative write interfaces
        .route("/tenants", post(handlers::org::create_tenant))
        .route("/org-tree", put(handlers::org::replace_org_tree))
        .route("/actors/:actor_id", put(handlers::org::upsert_actor))
        .route("/positions", post(handlers::org::create_position))
        .route("/policies", post(handlers::policy::create_policy))
        .route(
            "/policies/:policy_id/revoke",
            post(handlers::policy::revoke_policy),
        )
        .route(
            "/contracts/:contract_id/visibility",
            put(handlers::visibility::set_contract_visibility),
        )
        .route(
            "/contracts/:contract_id/grants",
            post(handlers::visibility::create_contract_grant),
        )
        .route(
            "/contract-grants/:grant_id/revoke",
            post(handlers::visibility::revoke_contract_grant),
        )
        .route(
            "/knowledge-bases/:kb_id",
            put(handlers::kb_grant::upsert_knowledge_base),
        )
        .route("/kb-grants", post(handlers::kb_grant::create_kb_grant))
        .route(
            "/kb-grants/:grant_id/revoke",
            post(handlers::kb_grant::revoke_kb_grant),
        )
        .with_state(state.clone())
        // Global IP rate limiting
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        // Request metrics
        .layer(from_fn(metrics_middleware))
        // Tracing span per request
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        // Request id propagation
        .layer(from_fn(request_id_middleware))
        // Security headers
        .layer(from_fn(security_headers_middleware))
        // CORS
        .layer(
            CorsLayer::new()
                .allow_origin(
                    state
                        .config
                        .security
                        .allowed_origins
                        .iter()
                        .map(|o| {
                            o.parse::<axum::http::HeaderValue>().unwrap_or_else(|e| {
                                tracing::error!(
                                    "Invalid CORS origin '{}': {}. Using fallback.",
                                    o,
                                    e
                                );
                                axum::http::HeaderValue::from_static("*")
                            })
                        })
                        .collect::<Vec<axum::http::HeaderValue>>(),
                )
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PUT,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([
                    axum::http::header::CONTENT_TYPE,
                    axum::http::header::HeaderName::from_static("x-actor-id"),
                    axum::http::header::HeaderName::from_static("x-tenant-id"),
                    axum::http::header::HeaderName::from_static("x-request-id"),
                ]),
        );

    Ok(app)
}

/// Service health check.
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<axum::Json<serde_json::Value>, AppError> {
    state.db.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "PostgreSQL health check failed");
        AppError::ServiceUnavailable("database unreachable".to_string())
    })?;

    let snapshot_version = state.store.version()?;

    Ok(axum::Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "postgres": "up",
            "snapshot_version": snapshot_version
        }
    })))
}
