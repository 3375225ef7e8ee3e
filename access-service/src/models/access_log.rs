//! Access log model - the immutable audit record, one per evaluation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::AccessDomain;

/// Terminal evaluation outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Deny => "deny",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "allow" => Decision::Allow,
            _ => Decision::Deny,
        }
    }
}

/// Reason codes attached to policy-driven denials. Infrastructure failures
/// are surfaced as errors, never as one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    CrossTenant,
    WrongDomain,
    InsufficientClearance,
    NoGrant,
    ExplicitDeny,
    DelegationExpired,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::CrossTenant => "cross_tenant",
            DenyReason::WrongDomain => "wrong_domain",
            DenyReason::InsufficientClearance => "insufficient_clearance",
            DenyReason::NoGrant => "no_grant",
            DenyReason::ExplicitDeny => "explicit_deny",
            DenyReason::DelegationExpired => "delegation_expired",
        }
    }
}

/// Access log entity. Append-only; owned exclusively by the audit logger.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AccessLogRecord {
    pub record_id: Uuid,
    pub tenant_id: Uuid,
    pub actor_id: Uuid,
    pub domain_code: String,
    pub resource_type_code: String,
    pub resource_id: Uuid,
    pub action_code: String,
    pub decision_code: String,
    pub reason_code: Option<String>,
    pub matched_policy_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
}

impl AccessLogRecord {
    /// Create a record for a completed evaluation.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_id: Uuid,
        actor_id: Uuid,
        domain: AccessDomain,
        resource_type_code: String,
        resource_id: Uuid,
        action_code: String,
        decision: Decision,
        reason: Option<DenyReason>,
        matched_policy_id: Option<Uuid>,
    ) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            tenant_id,
            actor_id,
            domain_code: domain.as_str().to_string(),
            resource_type_code,
            resource_id,
            action_code,
            decision_code: decision.as_str().to_string(),
            reason_code: reason.map(|r| r.as_str().to_string()),
            matched_policy_id,
            created_utc: Utc::now(),
        }
    }

    pub fn decision(&self) -> Decision {
        Decision::parse(&self.decision_code)
    }
}
