use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Unknown security level: {0}")]
    UnknownSecurityLevel(String),

    #[error("Security level ranks must form a total order; rank {0} is duplicated")]
    AmbiguousSecurityRank(i32),

    #[error("Malformed org unit path for unit {0}")]
    MalformedOrgPath(uuid::Uuid),

    #[error("Malformed policy scope for policy {0}")]
    MalformedPolicyScope(uuid::Uuid),

    #[error("Org scope index is stale: expected version {expected}, found {found}")]
    StaleOrgIndex { expected: u64, found: u64 },

    #[error("Policy snapshot unavailable: {0}")]
    SnapshotUnavailable(String),

    #[error("Audit store unavailable: {0}")]
    AuditUnavailable(String),

    #[error("Delegation would create a cycle")]
    DelegationCycle,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::anyhow!(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::UnknownSecurityLevel(_) | ServiceError::AmbiguousSecurityRank(_) => {
                AppError::ConfigError(anyhow::anyhow!(err.to_string()))
            }
            ServiceError::MalformedOrgPath(_) | ServiceError::MalformedPolicyScope(_) => {
                AppError::ConfigError(anyhow::anyhow!(err.to_string()))
            }
            ServiceError::StaleOrgIndex { .. }
            | ServiceError::SnapshotUnavailable(_)
            | ServiceError::AuditUnavailable(_) => AppError::ServiceUnavailable(err.to_string()),
            ServiceError::DelegationCycle => AppError::Conflict(anyhow::anyhow!(err.to_string())),
            ServiceError::NotFound(what) => AppError::NotFound(anyhow::anyhow!("{} not found", what)),
            ServiceError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
        }
    }
}
