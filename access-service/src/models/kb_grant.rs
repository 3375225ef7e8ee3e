//! Knowledge-base models - the KB registry and its org/user grants.
//!
//! Grants are domain-scoped to the knowledge base universe only; they never
//! apply to contract documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Knowledge-base registry entry (ownership attributes only; content is
/// stored and searched elsewhere).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct KnowledgeBase {
    pub kb_id: Uuid,
    pub tenant_id: Uuid,
    pub kb_label: String,
    pub created_utc: DateTime<Utc>,
}

impl KnowledgeBase {
    pub fn new(tenant_id: Uuid, kb_label: String) -> Self {
        Self {
            kb_id: Uuid::new_v4(),
            tenant_id,
            kb_label,
            created_utc: Utc::now(),
        }
    }
}

/// Who a knowledge-base grant covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum KbGrantee {
    OrgSubtree { org_unit_id: Uuid },
    User { user_id: Uuid },
}

impl KbGrantee {
    pub fn kind_code(&self) -> &'static str {
        match self {
            KbGrantee::OrgSubtree { .. } => "org_subtree",
            KbGrantee::User { .. } => "user",
        }
    }
}

/// Knowledge-base grant entity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct KbGrant {
    pub grant_id: Uuid,
    pub tenant_id: Uuid,
    pub kb_id: Uuid,
    pub grantee_kind_code: String,
    pub grantee_org_unit_id: Option<Uuid>,
    pub grantee_user_id: Option<Uuid>,
    pub can_query: bool,
    pub can_manage: bool,
    pub start_utc: DateTime<Utc>,
    pub end_utc: Option<DateTime<Utc>>,
    pub revoked_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl KbGrant {
    /// Create a new grant starting now.
    pub fn new(
        tenant_id: Uuid,
        kb_id: Uuid,
        grantee: KbGrantee,
        can_query: bool,
        can_manage: bool,
        end_utc: Option<DateTime<Utc>>,
    ) -> Self {
        let (grantee_org_unit_id, grantee_user_id) = match &grantee {
            KbGrantee::OrgSubtree { org_unit_id } => (Some(*org_unit_id), None),
            KbGrantee::User { user_id } => (None, Some(*user_id)),
        };
        Self {
            grant_id: Uuid::new_v4(),
            tenant_id,
            kb_id,
            grantee_kind_code: grantee.kind_code().to_string(),
            grantee_org_unit_id,
            grantee_user_id,
            can_query,
            can_manage,
            start_utc: Utc::now(),
            end_utc,
            revoked_utc: None,
            created_utc: Utc::now(),
        }
    }

    /// Reconstruct the typed grantee from the flat columns.
    pub fn grantee(&self) -> Option<KbGrantee> {
        match self.grantee_kind_code.as_str() {
            "org_subtree" => self
                .grantee_org_unit_id
                .map(|org_unit_id| KbGrantee::OrgSubtree { org_unit_id }),
            "user" => self.grantee_user_id.map(|user_id| KbGrantee::User { user_id }),
            _ => None,
        }
    }

    /// Check if the grant is in force at the given instant.
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.start_utc <= at
            && self.end_utc.is_none_or(|end| end > at)
            && self.revoked_utc.is_none_or(|rev| rev > at)
    }

    /// Check whether the grant covers an action code.
    pub fn allows_action(&self, action_code: &str) -> bool {
        match action_code {
            "query" | "read" => self.can_query,
            "manage" | "write" => self.can_manage,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_action_mapping() {
        let grant = KbGrant::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            KbGrantee::User { user_id: Uuid::new_v4() },
            true,
            false,
            None,
        );
        assert!(grant.allows_action("query"));
        assert!(grant.allows_action("read"));
        assert!(!grant.allows_action("manage"));
        assert!(!grant.allows_action("delete"));
    }

    #[test]
    fn revoked_grant_is_inactive() {
        let mut grant = KbGrant::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            KbGrantee::OrgSubtree { org_unit_id: Uuid::new_v4() },
            true,
            true,
            None,
        );
        let now = Utc::now();
        assert!(grant.is_active_at(now));

        grant.revoked_utc = Some(now - chrono::Duration::minutes(5));
        assert!(!grant.is_active_at(now));
    }
}
