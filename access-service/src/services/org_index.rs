//! Org scope index - materialized ancestor lookup over the org forest.
//!
//! Built once per org-tree version from the units' materialized paths, so
//! subtree containment during an evaluation is a set lookup rather than a
//! graph walk. The index carries the version it was built from; callers
//! holding a different version must refresh instead of trusting stale data.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::models::OrgUnit;
use crate::services::ServiceError;

#[derive(Debug, Clone, Default)]
pub struct OrgScopeIndex {
    version: u64,
    /// Unit id -> every ancestor id including the unit itself.
    ancestors: HashMap<Uuid, HashSet<Uuid>>,
}

impl OrgScopeIndex {
    /// Build the index for one org-tree version.
    pub fn build(version: u64, units: &[OrgUnit]) -> Result<Self, ServiceError> {
        let mut ancestors = HashMap::with_capacity(units.len());
        for unit in units {
            let chain = unit
                .ancestor_ids()
                .ok_or(ServiceError::MalformedOrgPath(unit.org_unit_id))?;
            ancestors.insert(unit.org_unit_id, chain.into_iter().collect());
        }
        Ok(Self { version, ancestors })
    }

    /// Version of the org tree this index was built from.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Reject lookups when the caller expects a different org-tree version.
    pub fn ensure_version(&self, expected: u64) -> Result<(), ServiceError> {
        if self.version != expected {
            return Err(ServiceError::StaleOrgIndex {
                expected,
                found: self.version,
            });
        }
        Ok(())
    }

    /// True iff `unit_id` equals `scope_root_id` or is one of its descendants.
    pub fn is_within(&self, unit_id: Uuid, scope_root_id: Uuid) -> bool {
        self.ancestors
            .get(&unit_id)
            .is_some_and(|chain| chain.contains(&scope_root_id))
    }

    /// True iff the unit exists in this version of the tree.
    pub fn contains(&self, unit_id: Uuid) -> bool {
        self.ancestors.contains_key(&unit_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containment_follows_materialized_paths() {
        let tenant = Uuid::new_v4();
        let division = OrgUnit::new_root(tenant, "division".into(), "Division A".into());
        let district = OrgUnit::new_child(&division, "district".into(), "District 1".into());
        let team = OrgUnit::new_child(&district, "team".into(), "Team X".into());
        let other = OrgUnit::new_root(tenant, "division".into(), "Division B".into());

        let index = OrgScopeIndex::build(
            1,
            &[division.clone(), district.clone(), team.clone(), other.clone()],
        )
        .unwrap();

        assert!(index.is_within(team.org_unit_id, division.org_unit_id));
        assert!(index.is_within(district.org_unit_id, division.org_unit_id));
        assert!(index.is_within(division.org_unit_id, division.org_unit_id));
        assert!(!index.is_within(other.org_unit_id, division.org_unit_id));
        assert!(!index.is_within(division.org_unit_id, team.org_unit_id));
    }

    #[test]
    fn stale_version_is_rejected() {
        let index = OrgScopeIndex::build(3, &[]).unwrap();
        assert!(index.ensure_version(3).is_ok());
        assert!(matches!(
            index.ensure_version(4),
            Err(ServiceError::StaleOrgIndex { expected: 4, found: 3 })
        ));
    }

    #[test]
    fn unknown_unit_is_never_within_any_scope() {
        let index = OrgScopeIndex::build(1, &[]).unwrap();
        assert!(!index.is_within(Uuid::new_v4(), Uuid::new_v4()));
    }
}
