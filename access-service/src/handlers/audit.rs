//! Audit query handler - read-only compliance access to the decision trail.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::AuditQuery;
use crate::AppState;
use service_core::error::AppError;

// ============================================================================
// Query Parameters
// ============================================================================

/// Query params for listing access log records.
#[derive(Debug, Deserialize)]
pub struct ListAccessLogsQuery {
    pub tenant_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub resource_id: Option<Uuid>,
    pub from_utc: Option<DateTime<Utc>>,
    pub to_utc: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}

// ============================================================================
// Response Types
// ============================================================================

/// One audit record as returned to compliance reviewers.
#[derive(Debug, Serialize)]
pub struct AccessLogResponse {
    pub record_id: Uuid,
    pub tenant_id: Uuid,
    pub actor_id: Uuid,
    pub domain: String,
    pub resource_type: String,
    pub resource_id: Uuid,
    pub action: String,
    pub decision: String,
    pub reason: Option<String>,
    pub matched_policy_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
}

/// Paginated audit response.
#[derive(Debug, Serialize)]
pub struct AccessLogsResponse {
    pub records: Vec<AccessLogResponse>,
    pub limit: i64,
    pub offset: i64,
}

// ============================================================================
// Handlers
// ============================================================================

/// List audit records with filtering and pagination.
///
/// GET /audit/records
#[tracing::instrument(
    skip(state),
    fields(
        tenant_id = %query.tenant_id,
        actor_id = ?query.actor_id,
        resource_id = ?query.resource_id,
        limit = query.limit,
        offset = query.offset
    )
)]
pub async fn list_access_logs(
    State(state): State<AppState>,
    Query(query): Query<ListAccessLogsQuery>,
) -> Result<Json<AccessLogsResponse>, AppError> {
    let limit = query.limit.clamp(1, 1000);
    let offset = query.offset.max(0);

    let filter = AuditQuery {
        tenant_id: query.tenant_id,
        actor_id: query.actor_id,
        resource_id: query.resource_id,
        from_utc: query.from_utc,
        to_utc: query.to_utc,
        limit,
        offset,
    };

    let records = state.audit.query(&filter).await?;

    let records: Vec<AccessLogResponse> = records
        .into_iter()
        .map(|r| AccessLogResponse {
            record_id: r.record_id,
            tenant_id: r.tenant_id,
            actor_id: r.actor_id,
            domain: r.domain_code,
            resource_type: r.resource_type_code,
            resource_id: r.resource_id,
            action: r.action_code,
            decision: r.decision_code,
            reason: r.reason_code,
            matched_policy_id: r.matched_policy_id,
            created_utc: r.created_utc,
        })
        .collect();

    Ok(Json(AccessLogsResponse {
        records,
        limit,
        offset,
    }))
}
