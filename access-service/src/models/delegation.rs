//! Org delegation model - time-bounded transfer of organizational scope.
//!
//! Delegation is directional and never deleted: expired or revoked records
//! stay inert in the catalog for audit review.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Org delegation entity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrgDelegation {
    pub delegation_id: Uuid,
    pub tenant_id: Uuid,
    pub delegator_id: Uuid,
    pub delegate_id: Uuid,
    /// Root of the delegated subtree scope.
    pub scope_org_unit_id: Uuid,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    /// How many hops the delegated scope may travel. 1 = direct only.
    pub max_depth: i32,
    pub revoked_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl OrgDelegation {
    /// Create a new delegation.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_id: Uuid,
        delegator_id: Uuid,
        delegate_id: Uuid,
        scope_org_unit_id: Uuid,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
        max_depth: i32,
    ) -> Self {
        Self {
            delegation_id: Uuid::new_v4(),
            tenant_id,
            delegator_id,
            delegate_id,
            scope_org_unit_id,
            valid_from,
            valid_until,
            max_depth: max_depth.max(1),
            revoked_utc: None,
            created_utc: Utc::now(),
        }
    }

    /// Validity is a closed interval: active iff
    /// `valid_from <= at <= valid_until` and not revoked before `at`.
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.valid_from <= at
            && at <= self.valid_until
            && self.revoked_utc.is_none_or(|rev| rev > at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn validity_interval_is_closed_on_both_ends() {
        let from = Utc::now();
        let until = from + Duration::hours(2);
        let delegation = OrgDelegation::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            from,
            until,
            1,
        );

        assert!(delegation.is_active_at(from));
        assert!(delegation.is_active_at(until));
        assert!(!delegation.is_active_at(from - Duration::nanoseconds(1000)));
        assert!(!delegation.is_active_at(until + Duration::nanoseconds(1000)));
    }

    #[test]
    fn depth_is_clamped_to_at_least_one_hop() {
        let now = Utc::now();
        let delegation = OrgDelegation::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            now,
            now + Duration::hours(1),
            0,
        );
        assert_eq!(delegation.max_depth, 1);
    }
}
