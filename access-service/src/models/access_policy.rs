//! Access policy model - grant/deny rules keyed by scope, resource type and action.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The two isolated resource universes. Grants never cross domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDomain {
    Contracts,
    KnowledgeBase,
}

impl AccessDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessDomain::Contracts => "contracts",
            AccessDomain::KnowledgeBase => "knowledge_base",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "contracts" => Some(AccessDomain::Contracts),
            "knowledge_base" => Some(AccessDomain::KnowledgeBase),
            _ => None,
        }
    }
}

/// Policy effect codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyEffect {
    Allow,
    Deny,
}

impl PolicyEffect {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyEffect::Allow => "allow",
            PolicyEffect::Deny => "deny",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "allow" => PolicyEffect::Allow,
            _ => PolicyEffect::Deny,
        }
    }
}

/// Who a policy covers. Specificity decreases top to bottom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PolicyScope {
    User { user_id: Uuid },
    Role { role_code: String },
    OrgSubtree { org_unit_id: Uuid },
    TenantDefault,
}

impl PolicyScope {
    /// Numeric specificity rank; higher outranks lower during precedence.
    pub fn specificity(&self) -> u8 {
        match self {
            PolicyScope::User { .. } => 3,
            PolicyScope::Role { .. } => 2,
            PolicyScope::OrgSubtree { .. } => 1,
            PolicyScope::TenantDefault => 0,
        }
    }

    pub fn kind_code(&self) -> &'static str {
        match self {
            PolicyScope::User { .. } => "user",
            PolicyScope::Role { .. } => "role",
            PolicyScope::OrgSubtree { .. } => "org_subtree",
            PolicyScope::TenantDefault => "tenant_default",
        }
    }
}

/// Access policy entity, stored flat with `*_code` columns.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AccessPolicy {
    pub policy_id: Uuid,
    pub tenant_id: Uuid,
    pub domain_code: String,
    pub resource_type_code: String,
    pub action_code: String,
    /// Narrows the policy to a single resource when set.
    pub resource_id: Option<Uuid>,
    pub scope_kind_code: String,
    pub scope_user_id: Option<Uuid>,
    pub scope_role_code: Option<String>,
    pub scope_org_unit_id: Option<Uuid>,
    pub effect_code: String,
    /// Snapshot version at which this policy became effective.
    pub snapshot_version: i64,
    pub revoked_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl AccessPolicy {
    /// Create a new policy.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_id: Uuid,
        domain: AccessDomain,
        resource_type_code: String,
        action_code: String,
        resource_id: Option<Uuid>,
        scope: PolicyScope,
        effect: PolicyEffect,
        snapshot_version: i64,
    ) -> Self {
        let (scope_user_id, scope_role_code, scope_org_unit_id) = match &scope {
            PolicyScope::User { user_id } => (Some(*user_id), None, None),
            PolicyScope::Role { role_code } => (None, Some(role_code.clone()), None),
            PolicyScope::OrgSubtree { org_unit_id } => (None, None, Some(*org_unit_id)),
            PolicyScope::TenantDefault => (None, None, None),
        };
        Self {
            policy_id: Uuid::new_v4(),
            tenant_id,
            domain_code: domain.as_str().to_string(),
            resource_type_code,
            action_code,
            resource_id,
            scope_kind_code: scope.kind_code().to_string(),
            scope_user_id,
            scope_role_code,
            scope_org_unit_id,
            effect_code: effect.as_str().to_string(),
            snapshot_version,
            revoked_utc: None,
            created_utc: Utc::now(),
        }
    }

    /// Reconstruct the typed scope from the flat columns.
    ///
    /// `None` signals a malformed row, which is a load-time error.
    pub fn scope(&self) -> Option<PolicyScope> {
        match self.scope_kind_code.as_str() {
            "user" => self.scope_user_id.map(|user_id| PolicyScope::User { user_id }),
            "role" => self
                .scope_role_code
                .clone()
                .map(|role_code| PolicyScope::Role { role_code }),
            "org_subtree" => self
                .scope_org_unit_id
                .map(|org_unit_id| PolicyScope::OrgSubtree { org_unit_id }),
            "tenant_default" => Some(PolicyScope::TenantDefault),
            _ => None,
        }
    }

    pub fn domain(&self) -> Option<AccessDomain> {
        AccessDomain::parse(&self.domain_code)
    }

    pub fn effect(&self) -> PolicyEffect {
        PolicyEffect::parse(&self.effect_code)
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_utc.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_round_trips_through_flat_columns() {
        let user_id = Uuid::new_v4();
        let policy = AccessPolicy::new(
            Uuid::new_v4(),
            AccessDomain::Contracts,
            "contract".into(),
            "read".into(),
            None,
            PolicyScope::User { user_id },
            PolicyEffect::Allow,
            1,
        );
        assert_eq!(policy.scope(), Some(PolicyScope::User { user_id }));
        assert_eq!(policy.effect(), PolicyEffect::Allow);
        assert_eq!(policy.domain(), Some(AccessDomain::Contracts));
    }

    #[test]
    fn specificity_ordering() {
        let user = PolicyScope::User { user_id: Uuid::new_v4() };
        let role = PolicyScope::Role { role_code: "manager".into() };
        let subtree = PolicyScope::OrgSubtree { org_unit_id: Uuid::new_v4() };

        assert!(user.specificity() > role.specificity());
        assert!(role.specificity() > subtree.specificity());
        assert!(subtree.specificity() > PolicyScope::TenantDefault.specificity());
    }

    #[test]
    fn malformed_scope_row_is_detected() {
        let mut policy = AccessPolicy::new(
            Uuid::new_v4(),
            AccessDomain::Contracts,
            "contract".into(),
            "read".into(),
            None,
            PolicyScope::TenantDefault,
            PolicyEffect::Deny,
            1,
        );
        policy.scope_kind_code = "user".to_string();
        assert!(policy.scope().is_none());
    }
}
