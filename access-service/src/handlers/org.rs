//! Tenant, org-tree and actor registry handlers.
//!
//! The resolver consumes a precomputed org tree: the org-management
//! collaborator submits the full forest for a tenant and this service
//! materializes ancestor paths and advances the org version.

use std::collections::HashMap;

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{Actor, ActorKind, OrgUnit, Position, Tenant};
use crate::services::ServiceError;
use crate::AppState;
use service_core::error::AppError;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request to create a tenant.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTenantRequest {
    #[validate(length(min = 1, max = 64))]
    pub tenant_slug: String,
    #[validate(length(min = 1, max = 256))]
    pub tenant_label: String,
}

/// Response after creating a tenant.
#[derive(Debug, Serialize)]
pub struct CreateTenantResponse {
    pub tenant_id: Uuid,
}

/// One unit in a submitted org tree. Ids are assigned by the org-management
/// collaborator; paths are materialized here.
#[derive(Debug, Deserialize, Serialize)]
pub struct OrgUnitInput {
    pub org_unit_id: Uuid,
    pub parent_org_unit_id: Option<Uuid>,
    pub unit_type_code: String,
    pub unit_label: String,
}

/// Request to replace a tenant's org tree.
#[derive(Debug, Deserialize, Validate)]
pub struct ReplaceOrgTreeRequest {
    pub tenant_id: Uuid,
    #[validate(length(min = 1))]
    pub units: Vec<OrgUnitInput>,
}

/// Response after an org-tree replace.
#[derive(Debug, Serialize)]
pub struct ReplaceOrgTreeResponse {
    pub org_version: u64,
    pub snapshot_version: u64,
    pub unit_count: usize,
}

/// Request to upsert an actor.
#[derive(Debug, Deserialize)]
pub struct UpsertActorRequest {
    pub tenant_id: Uuid,
    pub actor_kind: ActorKind,
    pub display_label: String,
    pub clearance: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Request to create a position.
#[derive(Debug, Deserialize)]
pub struct CreatePositionRequest {
    pub tenant_id: Uuid,
    pub org_unit_id: Uuid,
    pub role_code: String,
    pub user_id: Option<Uuid>,
}

/// Response after creating a position.
#[derive(Debug, Serialize)]
pub struct CreatePositionResponse {
    pub position_id: Uuid,
    pub snapshot_version: u64,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a tenant.
///
/// POST /tenants
#[tracing::instrument(skip(state, req), fields(tenant_slug = %req.tenant_slug))]
pub async fn create_tenant(
    State(state): State<AppState>,
    Json(req): Json<CreateTenantRequest>,
) -> Result<(StatusCode, Json<CreateTenantResponse>), AppError> {
    req.validate()?;

    let tenant = Tenant::new(req.tenant_slug, req.tenant_label);
    let tenant_id = tenant.tenant_id;

    state.db.insert_tenant(&tenant).await?;

    state.store.apply(|catalog| {
        catalog.upsert_tenant(tenant.clone());
        Ok(())
    })?;

    tracing::info!(tenant_id = %tenant_id, "Tenant created");

    Ok((StatusCode::CREATED, Json(CreateTenantResponse { tenant_id })))
}

/// Replace a tenant's org tree. Materializes paths, bumps the org version
/// and publishes a new snapshot.
///
/// PUT /org-tree
#[tracing::instrument(
    skip(state, req),
    fields(tenant_id = %req.tenant_id, unit_count = req.units.len())
)]
pub async fn replace_org_tree(
    State(state): State<AppState>,
    Json(req): Json<ReplaceOrgTreeRequest>,
) -> Result<Json<ReplaceOrgTreeResponse>, AppError> {
    req.validate()?;

    state.store.read(|catalog| {
        if !catalog.tenants.contains_key(&req.tenant_id) {
            return Err(ServiceError::NotFound("Tenant"));
        }
        Ok(())
    })??;

    let units = materialize_units(req.tenant_id, &req.units)?;
    let unit_count = units.len();

    let snapshot_version = state.store.apply(|catalog| {
        catalog.replace_org_tree(req.tenant_id, units.clone());
        Ok(())
    })?;
    let org_version = state.store.read(|catalog| catalog.org_version)?;

    state
        .db
        .replace_org_tree(req.tenant_id, &units, org_version)
        .await?;

    tracing::info!(
        tenant_id = %req.tenant_id,
        org_version,
        snapshot_version,
        unit_count,
        "Org tree replaced"
    );

    Ok(Json(ReplaceOrgTreeResponse {
        org_version,
        snapshot_version,
        unit_count,
    }))
}

/// Upsert an actor (user or automated agent).
///
/// PUT /actors/{actor_id}
#[tracing::instrument(
    skip(state, req),
    fields(actor_id = %actor_id, tenant_id = %req.tenant_id, kind = ?req.actor_kind)
)]
pub async fn upsert_actor(
    State(state): State<AppState>,
    Path(actor_id): Path<Uuid>,
    Json(req): Json<UpsertActorRequest>,
) -> Result<StatusCode, AppError> {
    // Unknown clearance names are a client error at write time
    if let Some(clearance) = &req.clearance {
        state.store.hierarchy().rank_of(clearance).map_err(|_| {
            AppError::BadRequest(anyhow::anyhow!("Unknown security level: {}", clearance))
        })?;
    }

    state.store.read(|catalog| {
        if !catalog.tenants.contains_key(&req.tenant_id) {
            return Err(ServiceError::NotFound("Tenant"));
        }
        Ok(())
    })??;

    let actor = Actor {
        actor_id,
        tenant_id: req.tenant_id,
        actor_kind_code: req.actor_kind.as_str().to_string(),
        display_label: req.display_label,
        clearance_code: req.clearance,
        active_flag: req.active,
        created_utc: Utc::now(),
    };

    state.db.upsert_actor(&actor).await?;

    state.store.apply(|catalog| {
        catalog.upsert_actor(actor.clone());
        Ok(())
    })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Create a position (role seat) in an org unit.
///
/// POST /positions
#[tracing::instrument(
    skip(state, req),
    fields(tenant_id = %req.tenant_id, org_unit_id = %req.org_unit_id, role = %req.role_code)
)]
pub async fn create_position(
    State(state): State<AppState>,
    Json(req): Json<CreatePositionRequest>,
) -> Result<(StatusCode, Json<CreatePositionResponse>), AppError> {
    state.store.read(|catalog| {
        let owned = catalog
            .org_units
            .get(&req.org_unit_id)
            .is_some_and(|u| u.tenant_id == req.tenant_id);
        if !owned {
            return Err(ServiceError::Validation(
                "Org unit does not belong to the tenant".to_string(),
            ));
        }
        if let Some(user_id) = req.user_id {
            let known = catalog
                .actors
                .get(&user_id)
                .is_some_and(|a| a.tenant_id == req.tenant_id);
            if !known {
                return Err(ServiceError::NotFound("Actor"));
            }
        }
        Ok(())
    })??;

    let position = Position::new(req.tenant_id, req.org_unit_id, req.role_code, req.user_id);
    let position_id = position.position_id;

    state.db.insert_position(&position).await?;

    let snapshot_version = state.store.apply(|catalog| {
        catalog.add_position(position.clone());
        Ok(())
    })?;

    tracing::info!(position_id = %position_id, snapshot_version, "Position created");

    Ok((
        StatusCode::CREATED,
        Json(CreatePositionResponse {
            position_id,
            snapshot_version,
        }),
    ))
}

/// Materialize paths for a submitted forest. Rejects unknown parents and
/// cycles: every unit must resolve to a root within the submitted set.
fn materialize_units(tenant_id: Uuid, inputs: &[OrgUnitInput]) -> Result<Vec<OrgUnit>, AppError> {
    let by_id: HashMap<Uuid, &OrgUnitInput> =
        inputs.iter().map(|u| (u.org_unit_id, u)).collect();
    if by_id.len() != inputs.len() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Duplicate org_unit_id in submitted tree"
        )));
    }

    let mut paths: HashMap<Uuid, String> = HashMap::new();
    let mut remaining: Vec<&OrgUnitInput> = inputs.iter().collect();

    while !remaining.is_empty() {
        let before = remaining.len();
        remaining.retain(|input| {
            let path = match input.parent_org_unit_id {
                None => Some(format!("/{}", input.org_unit_id)),
                Some(parent) => paths
                    .get(&parent)
                    .map(|parent_path| format!("{}/{}", parent_path, input.org_unit_id)),
            };
            match path {
                Some(p) => {
                    paths.insert(input.org_unit_id, p);
                    false
                }
                None => true,
            }
        });
        if remaining.len() == before {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Org tree contains a cycle or a parent outside the submitted set"
            )));
        }
    }

    let now = Utc::now();
    Ok(inputs
        .iter()
        .map(|input| OrgUnit {
            org_unit_id: input.org_unit_id,
            tenant_id,
            parent_org_unit_id: input.parent_org_unit_id,
            unit_type_code: input.unit_type_code.clone(),
            unit_label: input.unit_label.clone(),
            path: paths[&input.org_unit_id].clone(),
            active_flag: true,
            created_utc: now,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn materializes_paths_for_a_forest() {
        let tenant = Uuid::new_v4();
        let root = Uuid::new_v4();
        let child = Uuid::new_v4();
        let inputs = vec![
            OrgUnitInput {
                org_unit_id: child,
                parent_org_unit_id: Some(root),
                unit_type_code: "team".into(),
                unit_label: "Team".into(),
            },
            OrgUnitInput {
                org_unit_id: root,
                parent_org_unit_id: None,
                unit_type_code: "division".into(),
                unit_label: "Division".into(),
            },
        ];

        let units = materialize_units(tenant, &inputs).unwrap();
        let child_unit = units.iter().find(|u| u.org_unit_id == child).unwrap();
        assert_eq!(child_unit.path, format!("/{}/{}", root, child));
    }

    #[test]
    fn rejects_unknown_parent() {
        let inputs = vec![OrgUnitInput {
            org_unit_id: Uuid::new_v4(),
            parent_org_unit_id: Some(Uuid::new_v4()),
            unit_type_code: "team".into(),
            unit_label: "Team".into(),
        }];
        assert!(materialize_units(Uuid::new_v4(), &inputs).is_err());
    }

    #[test]
    fn rejects_parent_cycle() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let inputs = vec![
            OrgUnitInput {
                org_unit_id: a,
                parent_org_unit_id: Some(b),
                unit_type_code: "team".into(),
                unit_label: "A".into(),
            },
            OrgUnitInput {
                org_unit_id: b,
                parent_org_unit_id: Some(a),
                unit_type_code: "team".into(),
                unit_label: "B".into(),
            },
        ];
        assert!(materialize_units(Uuid::new_v4(), &inputs).is_err());
    }
}
