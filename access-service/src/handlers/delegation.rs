//! Delegation administration handlers.
//!
//! Cycle detection happens here, at write time; the evaluation path only
//! follows bounded hops.

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::handlers::policy::RevokeResponse;
use crate::models::OrgDelegation;
use crate::services::ServiceError;
use crate::AppState;
use service_core::error::AppError;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request to create a delegation.
#[derive(Debug, Deserialize)]
pub struct CreateDelegationRequest {
    pub tenant_id: Uuid,
    pub delegator_id: Uuid,
    pub delegate_id: Uuid,
    pub scope_org_unit_id: Uuid,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    /// Hops the delegated scope may travel; defaults to direct-only.
    #[serde(default = "default_max_depth")]
    pub max_depth: i32,
}

fn default_max_depth() -> i32 {
    1
}

/// Response after creating a delegation.
#[derive(Debug, Serialize)]
pub struct CreateDelegationResponse {
    pub delegation_id: Uuid,
    pub snapshot_version: u64,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a time-bounded delegation of organizational scope.
///
/// POST /delegations
#[tracing::instrument(
    skip(state, req),
    fields(
        tenant_id = %req.tenant_id,
        delegator_id = %req.delegator_id,
        delegate_id = %req.delegate_id
    )
)]
pub async fn create_delegation(
    State(state): State<AppState>,
    Json(req): Json<CreateDelegationRequest>,
) -> Result<(StatusCode, Json<CreateDelegationResponse>), AppError> {
    if req.valid_until <= req.valid_from {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "valid_until must be after valid_from"
        )));
    }

    state.store.read(|catalog| {
        if !catalog.tenants.contains_key(&req.tenant_id) {
            return Err(ServiceError::NotFound("Tenant"));
        }
        for actor_id in [req.delegator_id, req.delegate_id] {
            let known = catalog
                .actors
                .get(&actor_id)
                .is_some_and(|a| a.tenant_id == req.tenant_id);
            if !known {
                return Err(ServiceError::NotFound("Actor"));
            }
        }
        let owned = catalog
            .org_units
            .get(&req.scope_org_unit_id)
            .is_some_and(|u| u.tenant_id == req.tenant_id);
        if !owned {
            return Err(ServiceError::Validation(
                "Scope org unit does not belong to the tenant".to_string(),
            ));
        }
        // Reject cycles before the durable insert; apply re-checks
        if req.delegator_id == req.delegate_id
            || catalog.delegation_path_exists(req.delegate_id, req.delegator_id)
        {
            return Err(ServiceError::DelegationCycle);
        }
        Ok(())
    })??;

    let delegation = OrgDelegation::new(
        req.tenant_id,
        req.delegator_id,
        req.delegate_id,
        req.scope_org_unit_id,
        req.valid_from,
        req.valid_until,
        req.max_depth,
    );
    let delegation_id = delegation.delegation_id;

    state.db.insert_delegation(&delegation).await?;

    let snapshot_version = state
        .store
        .apply(|catalog| catalog.add_delegation(delegation.clone()))?;

    tracing::info!(delegation_id = %delegation_id, snapshot_version, "Delegation created");

    Ok((
        StatusCode::CREATED,
        Json(CreateDelegationResponse {
            delegation_id,
            snapshot_version,
        }),
    ))
}

/// Revoke a delegation. The record stays in the catalog for audit.
///
/// POST /delegations/{delegation_id}/revoke
#[tracing::instrument(skip(state), fields(delegation_id = %delegation_id))]
pub async fn revoke_delegation(
    State(state): State<AppState>,
    Path(delegation_id): Path<Uuid>,
) -> Result<Json<RevokeResponse>, AppError> {
    state.db.revoke_delegation(delegation_id).await?;

    let snapshot_version = state
        .store
        .apply(|catalog| catalog.revoke_delegation(delegation_id, Utc::now()))?;

    tracing::info!(delegation_id = %delegation_id, snapshot_version, "Delegation revoked");

    Ok(Json(RevokeResponse { snapshot_version }))
}
