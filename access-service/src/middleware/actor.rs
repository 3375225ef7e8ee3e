//! Actor context extraction for evaluation and audit-query endpoints.
//!
//! The gateway terminates authentication and forwards the acting identity as
//! trusted internal headers. Tenant and actor are always explicit parameters
//! of an evaluation, never inferred from ambient request state.

use axum::{extract::FromRequestParts, http::request::Parts};
use service_core::error::AppError;
use uuid::Uuid;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const TENANT_ID_HEADER: &str = "x-tenant-id";

/// The acting identity forwarded by the gateway.
#[derive(Debug, Clone)]
pub struct ActorContext {
    pub actor_id: Uuid,
    pub tenant_id: Uuid,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for ActorContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor_id = header_uuid(parts, ACTOR_ID_HEADER)?;
        let tenant_id = header_uuid(parts, TENANT_ID_HEADER)?;
        Ok(ActorContext { actor_id, tenant_id })
    }
}

fn header_uuid(parts: &Parts, name: &str) -> Result<Uuid, AppError> {
    let raw = parts
        .headers
        .get(name)
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing {} header", name)))?
        .to_str()
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid {} header encoding", name)))?;
    Uuid::parse_str(raw)
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid {} header format", name)))
}
