//! Contract visibility model - per-document classification and explicit grants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Visibility attributes of a contract document. A contract always carries
/// exactly one current security level.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContractVisibility {
    pub contract_id: Uuid,
    pub tenant_id: Uuid,
    /// Org unit that owns the document.
    pub org_unit_id: Uuid,
    pub security_level_code: String,
    pub updated_utc: DateTime<Utc>,
}

impl ContractVisibility {
    pub fn new(
        contract_id: Uuid,
        tenant_id: Uuid,
        org_unit_id: Uuid,
        security_level_code: String,
    ) -> Self {
        Self {
            contract_id,
            tenant_id,
            org_unit_id,
            security_level_code,
            updated_utc: Utc::now(),
        }
    }
}

/// Explicit per-contract grant for a single user. Additive: it widens who may
/// match, but the document's level requirement still applies in full.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContractGrant {
    pub grant_id: Uuid,
    pub tenant_id: Uuid,
    pub contract_id: Uuid,
    pub user_id: Uuid,
    pub action_code: String,
    pub revoked_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl ContractGrant {
    pub fn new(tenant_id: Uuid, contract_id: Uuid, user_id: Uuid, action_code: String) -> Self {
        Self {
            grant_id: Uuid::new_v4(),
            tenant_id,
            contract_id,
            user_id,
            action_code,
            revoked_utc: None,
            created_utc: Utc::now(),
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_utc.is_some()
    }
}
