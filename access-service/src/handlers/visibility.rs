//! Contract visibility handlers - classification and explicit grants.

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ContractGrant, ContractVisibility};
use crate::services::ServiceError;
use crate::AppState;
use service_core::error::AppError;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request to set a contract's visibility attributes.
#[derive(Debug, Deserialize)]
pub struct SetVisibilityRequest {
    pub tenant_id: Uuid,
    pub org_unit_id: Uuid,
    pub security_level: String,
}

/// Request to add an explicit per-contract grant.
#[derive(Debug, Deserialize)]
pub struct CreateContractGrantRequest {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub action: String,
}

/// Response after a visibility write.
#[derive(Debug, Serialize)]
pub struct VisibilityResponse {
    pub contract_id: Uuid,
    pub snapshot_version: u64,
}

/// Response after creating a grant.
#[derive(Debug, Serialize)]
pub struct CreateGrantResponse {
    pub grant_id: Uuid,
    pub snapshot_version: u64,
}

// ============================================================================
// Handlers
// ============================================================================

/// Set a contract's owning org unit and security level. A contract always
/// carries exactly one current level; this replaces it.
///
/// PUT /contracts/{contract_id}/visibility
#[tracing::instrument(
    skip(state, req),
    fields(contract_id = %contract_id, tenant_id = %req.tenant_id, level = %req.security_level)
)]
pub async fn set_contract_visibility(
    State(state): State<AppState>,
    Path(contract_id): Path<Uuid>,
    Json(req): Json<SetVisibilityRequest>,
) -> Result<Json<VisibilityResponse>, AppError> {
    // Unknown level names must fail here, at write time, with a client error
    state
        .store
        .hierarchy()
        .rank_of(&req.security_level)
        .map_err(|_| {
            AppError::BadRequest(anyhow::anyhow!(
                "Unknown security level: {}",
                req.security_level
            ))
        })?;

    state.store.read(|catalog| {
        if !catalog.tenants.contains_key(&req.tenant_id) {
            return Err(ServiceError::NotFound("Tenant"));
        }
        let owned = catalog
            .org_units
            .get(&req.org_unit_id)
            .is_some_and(|u| u.tenant_id == req.tenant_id);
        if !owned {
            return Err(ServiceError::Validation(
                "Org unit does not belong to the tenant".to_string(),
            ));
        }
        Ok(())
    })??;

    let visibility = ContractVisibility::new(
        contract_id,
        req.tenant_id,
        req.org_unit_id,
        req.security_level,
    );

    state.db.upsert_contract_visibility(&visibility).await?;

    let snapshot_version = state.store.apply(|catalog| {
        catalog.set_contract_visibility(visibility.clone());
        Ok(())
    })?;

    tracing::info!(contract_id = %contract_id, snapshot_version, "Contract visibility updated");

    Ok(Json(VisibilityResponse {
        contract_id,
        snapshot_version,
    }))
}

/// Add an explicit per-contract grant for a single user. Additive only: the
/// document's level requirement is unaffected.
///
/// POST /contracts/{contract_id}/grants
#[tracing::instrument(
    skip(state, req),
    fields(contract_id = %contract_id, user_id = %req.user_id, action = %req.action)
)]
pub async fn create_contract_grant(
    State(state): State<AppState>,
    Path(contract_id): Path<Uuid>,
    Json(req): Json<CreateContractGrantRequest>,
) -> Result<(StatusCode, Json<CreateGrantResponse>), AppError> {
    state.store.read(|catalog| {
        let contract = catalog
            .contracts
            .get(&contract_id)
            .ok_or(ServiceError::NotFound("Contract"))?;
        if contract.tenant_id != req.tenant_id {
            return Err(ServiceError::Validation(
                "Contract does not belong to the tenant".to_string(),
            ));
        }
        let known_user = catalog
            .actors
            .get(&req.user_id)
            .is_some_and(|a| a.tenant_id == req.tenant_id);
        if !known_user {
            return Err(ServiceError::NotFound("Actor"));
        }
        Ok(())
    })??;

    let grant = ContractGrant::new(req.tenant_id, contract_id, req.user_id, req.action);
    let grant_id = grant.grant_id;

    state.db.insert_contract_grant(&grant).await?;

    let snapshot_version = state.store.apply(|catalog| {
        catalog.add_contract_grant(grant.clone());
        Ok(())
    })?;

    tracing::info!(grant_id = %grant_id, snapshot_version, "Contract grant created");

    Ok((
        StatusCode::CREATED,
        Json(CreateGrantResponse {
            grant_id,
            snapshot_version,
        }),
    ))
}

/// Revoke an explicit contract grant.
///
/// POST /contract-grants/{grant_id}/revoke
#[tracing::instrument(skip(state), fields(grant_id = %grant_id))]
pub async fn revoke_contract_grant(
    State(state): State<AppState>,
    Path(grant_id): Path<Uuid>,
) -> Result<Json<super::policy::RevokeResponse>, AppError> {
    state.db.revoke_contract_grant(grant_id).await?;

    let snapshot_version = state
        .store
        .apply(|catalog| catalog.revoke_contract_grant(grant_id, chrono::Utc::now()))?;

    tracing::info!(grant_id = %grant_id, snapshot_version, "Contract grant revoked");

    Ok(Json(super::policy::RevokeResponse { snapshot_version }))
}
