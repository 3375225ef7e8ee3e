//! Knowledge-base administration handlers - registry and grants.

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::handlers::policy::RevokeResponse;
use crate::models::{KbGrant, KbGrantee, KnowledgeBase};
use crate::services::ServiceError;
use crate::AppState;
use service_core::error::AppError;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request to register or relabel a knowledge base.
#[derive(Debug, Deserialize)]
pub struct UpsertKnowledgeBaseRequest {
    pub tenant_id: Uuid,
    pub kb_label: String,
}

/// Request to create a knowledge-base grant.
#[derive(Debug, Deserialize)]
pub struct CreateKbGrantRequest {
    pub tenant_id: Uuid,
    pub kb_id: Uuid,
    pub grantee: KbGrantee,
    pub can_query: bool,
    pub can_manage: bool,
    pub end_utc: Option<DateTime<Utc>>,
}

/// Response after creating a grant.
#[derive(Debug, Serialize)]
pub struct CreateKbGrantResponse {
    pub grant_id: Uuid,
    pub snapshot_version: u64,
}

// ============================================================================
// Handlers
// ============================================================================

/// Register a knowledge base (ownership attributes only).
///
/// PUT /knowledge-bases/{kb_id}
#[tracing::instrument(skip(state, req), fields(kb_id = %kb_id, tenant_id = %req.tenant_id))]
pub async fn upsert_knowledge_base(
    State(state): State<AppState>,
    Path(kb_id): Path<Uuid>,
    Json(req): Json<UpsertKnowledgeBaseRequest>,
) -> Result<StatusCode, AppError> {
    state.store.read(|catalog| {
        if !catalog.tenants.contains_key(&req.tenant_id) {
            return Err(ServiceError::NotFound("Tenant"));
        }
        Ok(())
    })??;

    let kb = KnowledgeBase {
        kb_id,
        tenant_id: req.tenant_id,
        kb_label: req.kb_label,
        created_utc: Utc::now(),
    };

    state.db.upsert_knowledge_base(&kb).await?;

    state.store.apply(|catalog| {
        catalog.upsert_knowledge_base(kb.clone());
        Ok(())
    })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Grant a knowledge base to an org subtree or a single principal. Grants
/// are domain-scoped to the knowledge-base universe only.
///
/// POST /kb-grants
#[tracing::instrument(
    skip(state, req),
    fields(tenant_id = %req.tenant_id, kb_id = %req.kb_id)
)]
pub async fn create_kb_grant(
    State(state): State<AppState>,
    Json(req): Json<CreateKbGrantRequest>,
) -> Result<(StatusCode, Json<CreateKbGrantResponse>), AppError> {
    state.store.read(|catalog| {
        let kb = catalog
            .knowledge_bases
            .get(&req.kb_id)
            .ok_or(ServiceError::NotFound("Knowledge base"))?;
        if kb.tenant_id != req.tenant_id {
            return Err(ServiceError::Validation(
                "Knowledge base does not belong to the tenant".to_string(),
            ));
        }
        match &req.grantee {
            KbGrantee::OrgSubtree { org_unit_id } => {
                let owned = catalog
                    .org_units
                    .get(org_unit_id)
                    .is_some_and(|u| u.tenant_id == req.tenant_id);
                if !owned {
                    return Err(ServiceError::Validation(
                        "Grantee org unit does not belong to the tenant".to_string(),
                    ));
                }
            }
            KbGrantee::User { user_id } => {
                let known = catalog
                    .actors
                    .get(user_id)
                    .is_some_and(|a| a.tenant_id == req.tenant_id);
                if !known {
                    return Err(ServiceError::NotFound("Actor"));
                }
            }
        }
        Ok(())
    })??;

    let grant = KbGrant::new(
        req.tenant_id,
        req.kb_id,
        req.grantee,
        req.can_query,
        req.can_manage,
        req.end_utc,
    );
    let grant_id = grant.grant_id;

    state.db.insert_kb_grant(&grant).await?;

    let snapshot_version = state.store.apply(|catalog| {
        catalog.add_kb_grant(grant.clone());
        Ok(())
    })?;

    tracing::info!(grant_id = %grant_id, snapshot_version, "Knowledge-base grant created");

    Ok((
        StatusCode::CREATED,
        Json(CreateKbGrantResponse {
            grant_id,
            snapshot_version,
        }),
    ))
}

/// Revoke a knowledge-base grant.
///
/// POST /kb-grants/{grant_id}/revoke
#[tracing::instrument(skip(state), fields(grant_id = %grant_id))]
pub async fn revoke_kb_grant(
    State(state): State<AppState>,
    Path(grant_id): Path<Uuid>,
) -> Result<Json<RevokeResponse>, AppError> {
    state.db.revoke_kb_grant(grant_id).await?;

    let snapshot_version = state
        .store
        .apply(|catalog| catalog.revoke_kb_grant(grant_id, Utc::now()))?;

    tracing::info!(grant_id = %grant_id, snapshot_version, "Knowledge-base grant revoked");

    Ok(Json(RevokeResponse { snapshot_version }))
}
