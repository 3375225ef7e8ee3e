//! Policy administration handlers. Every write bumps the snapshot version.

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AccessDomain, AccessPolicy, PolicyEffect, PolicyScope};
use crate::services::ServiceError;
use crate::AppState;
use service_core::error::AppError;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request to create a policy.
#[derive(Debug, Deserialize)]
pub struct CreatePolicyRequest {
    pub tenant_id: Uuid,
    pub domain: AccessDomain,
    pub resource_type: String,
    pub action: String,
    pub resource_id: Option<Uuid>,
    pub scope: PolicyScope,
    pub effect: PolicyEffect,
}

/// Response after creating a policy.
#[derive(Debug, Serialize)]
pub struct CreatePolicyResponse {
    pub policy_id: Uuid,
    pub snapshot_version: u64,
}

/// Response after a revocation.
#[derive(Debug, Serialize)]
pub struct RevokeResponse {
    pub snapshot_version: u64,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new access policy.
///
/// POST /policies
#[tracing::instrument(
    skip(state, req),
    fields(tenant_id = %req.tenant_id, action = %req.action, effect = ?req.effect)
)]
pub async fn create_policy(
    State(state): State<AppState>,
    Json(req): Json<CreatePolicyRequest>,
) -> Result<(StatusCode, Json<CreatePolicyResponse>), AppError> {
    // Validate references against the current catalog
    state.store.read(|catalog| {
        if !catalog.tenants.contains_key(&req.tenant_id) {
            return Err(ServiceError::NotFound("Tenant"));
        }
        if let PolicyScope::OrgSubtree { org_unit_id } = &req.scope {
            let known = catalog
                .org_units
                .get(org_unit_id)
                .is_some_and(|u| u.tenant_id == req.tenant_id);
            if !known {
                return Err(ServiceError::Validation(
                    "Scope org unit does not belong to the tenant".to_string(),
                ));
            }
        }
        Ok(())
    })??;

    let current_version = state.store.version()?;
    let policy = AccessPolicy::new(
        req.tenant_id,
        req.domain,
        req.resource_type,
        req.action,
        req.resource_id,
        req.scope,
        req.effect,
        current_version as i64,
    );
    let policy_id = policy.policy_id;

    state.db.insert_policy(&policy).await?;

    let snapshot_version = state.store.apply(|catalog| {
        catalog.add_policy(policy.clone());
        Ok(())
    })?;

    tracing::info!(
        policy_id = %policy_id,
        snapshot_version,
        "Access policy created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreatePolicyResponse {
            policy_id,
            snapshot_version,
        }),
    ))
}

/// Revoke a policy. The record is kept for audit; only its effect ends.
///
/// POST /policies/{policy_id}/revoke
#[tracing::instrument(skip(state), fields(policy_id = %policy_id))]
pub async fn revoke_policy(
    State(state): State<AppState>,
    Path(policy_id): Path<Uuid>,
) -> Result<Json<RevokeResponse>, AppError> {
    state.db.revoke_policy(policy_id).await?;

    let snapshot_version = state
        .store
        .apply(|catalog| catalog.revoke_policy(policy_id, chrono::Utc::now()))?;

    tracing::info!(policy_id = %policy_id, snapshot_version, "Access policy revoked");

    Ok(Json(RevokeResponse { snapshot_version }))
}
