//! Evaluation handlers - the sole entry points request-handling
//! collaborators call before serving or mutating content.

use axum::extract::{Json, State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::ActorContext;
use crate::models::{AccessDomain, Decision};
use crate::services::AccessRequest;
use crate::AppState;
use service_core::error::AppError;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Body of a single evaluation request. The acting identity comes from the
/// gateway headers, never from the body.
#[derive(Debug, Deserialize)]
pub struct CheckAccessRequest {
    pub domain: AccessDomain,
    /// Defaults to the domain's canonical resource type.
    pub resource_type: Option<String>,
    pub resource_id: Uuid,
    pub action: String,
}

/// Evaluation result.
#[derive(Debug, Serialize)]
pub struct CheckAccessResponse {
    pub decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_policy_id: Option<Uuid>,
    pub snapshot_version: u64,
}

/// Body of a bulk filter request.
#[derive(Debug, Deserialize)]
pub struct FilterAllowedRequest {
    pub domain: AccessDomain,
    pub resource_type: Option<String>,
    pub action: String,
    pub resource_ids: Vec<Uuid>,
}

/// The subset of submitted resources the actor may act on.
#[derive(Debug, Serialize)]
pub struct FilterAllowedResponse {
    pub allowed: Vec<Uuid>,
}

fn resource_type_for(domain: AccessDomain, explicit: Option<String>) -> String {
    explicit.unwrap_or_else(|| {
        match domain {
            AccessDomain::Contracts => "contract",
            AccessDomain::KnowledgeBase => "knowledge_base",
        }
        .to_string()
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// Evaluate one access request.
///
/// POST /access/check
#[tracing::instrument(
    skip(state, req),
    fields(
        actor_id = %ctx.actor_id,
        tenant_id = %ctx.tenant_id,
        resource_id = %req.resource_id,
        action = %req.action
    )
)]
pub async fn check_access(
    State(state): State<AppState>,
    ctx: ActorContext,
    Json(req): Json<CheckAccessRequest>,
) -> Result<Json<CheckAccessResponse>, AppError> {
    let request = AccessRequest {
        tenant_id: ctx.tenant_id,
        actor_id: ctx.actor_id,
        domain: req.domain,
        resource_type_code: resource_type_for(req.domain, req.resource_type),
        resource_id: req.resource_id,
        action_code: req.action,
    };

    let resolved = state.resolver.check_access(&request).await?;

    Ok(Json(CheckAccessResponse {
        decision: resolved.decision,
        reason: resolved.reason.map(|r| r.as_str().to_string()),
        matched_policy_id: resolved.matched_policy_id,
        snapshot_version: resolved.snapshot_version,
    }))
}

/// Pre-filter a listing/search result set. Produces exactly the resources a
/// per-item check would allow.
///
/// POST /access/filter
#[tracing::instrument(
    skip(state, req),
    fields(
        actor_id = %ctx.actor_id,
        tenant_id = %ctx.tenant_id,
        action = %req.action,
        candidates = req.resource_ids.len()
    )
)]
pub async fn filter_allowed(
    State(state): State<AppState>,
    ctx: ActorContext,
    Json(req): Json<FilterAllowedRequest>,
) -> Result<Json<FilterAllowedResponse>, AppError> {
    let resource_type = resource_type_for(req.domain, req.resource_type);

    let allowed = state
        .resolver
        .filter_allowed(
            ctx.tenant_id,
            ctx.actor_id,
            req.domain,
            &resource_type,
            &req.action,
            &req.resource_ids,
        )
        .await?;

    Ok(Json(FilterAllowedResponse { allowed }))
}
