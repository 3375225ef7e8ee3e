//! Versioned policy store - master catalog plus immutable published snapshots.
//!
//! Administrative writes mutate the catalog under a write lock, rebuild the
//! derived snapshot and publish it atomically as a new version. Evaluations
//! pin the `Arc<Snapshot>` current at call start, so no decision ever mixes
//! pre- and post-edit policy state.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    AccessPolicy, Actor, ContractGrant, ContractVisibility, KbGrant, KnowledgeBase, OrgDelegation,
    OrgUnit, Position, Tenant,
};
use crate::services::{OrgScopeIndex, SecurityLevelHierarchy, ServiceError};

// ============================================================================
// Catalog (master data)
// ============================================================================

/// Master policy/org/delegation data. Mutated only through [`PolicyStore::apply`].
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub tenants: HashMap<Uuid, Tenant>,
    pub org_units: HashMap<Uuid, OrgUnit>,
    pub positions: Vec<Position>,
    pub actors: HashMap<Uuid, Actor>,
    pub policies: Vec<AccessPolicy>,
    pub delegations: Vec<OrgDelegation>,
    pub contracts: HashMap<Uuid, ContractVisibility>,
    pub contract_grants: Vec<ContractGrant>,
    pub knowledge_bases: HashMap<Uuid, KnowledgeBase>,
    pub kb_grants: Vec<KbGrant>,
    /// Bumped whenever a tenant's org tree is replaced.
    pub org_version: u64,
}

impl Catalog {
    pub fn upsert_tenant(&mut self, tenant: Tenant) {
        self.tenants.insert(tenant.tenant_id, tenant);
    }

    /// Replace a tenant's org tree and advance the org version.
    pub fn replace_org_tree(&mut self, tenant_id: Uuid, units: Vec<OrgUnit>) {
        self.org_units.retain(|_, u| u.tenant_id != tenant_id);
        for unit in units {
            self.org_units.insert(unit.org_unit_id, unit);
        }
        self.org_version += 1;
    }

    pub fn upsert_actor(&mut self, actor: Actor) {
        self.actors.insert(actor.actor_id, actor);
    }

    pub fn add_position(&mut self, position: Position) {
        self.positions.push(position);
    }

    pub fn end_position(&mut self, position_id: Uuid, at: DateTime<Utc>) -> Result<(), ServiceError> {
        let position = self
            .positions
            .iter_mut()
            .find(|p| p.position_id == position_id)
            .ok_or(ServiceError::NotFound("Position"))?;
        position.end_utc = Some(at);
        Ok(())
    }

    pub fn add_policy(&mut self, policy: AccessPolicy) {
        self.policies.push(policy);
    }

    /// Revoke a policy. Records are kept for audit, never removed.
    pub fn revoke_policy(&mut self, policy_id: Uuid, at: DateTime<Utc>) -> Result<(), ServiceError> {
        let policy = self
            .policies
            .iter_mut()
            .find(|p| p.policy_id == policy_id)
            .ok_or(ServiceError::NotFound("Policy"))?;
        policy.revoked_utc = Some(at);
        Ok(())
    }

    pub fn set_contract_visibility(&mut self, visibility: ContractVisibility) {
        self.contracts.insert(visibility.contract_id, visibility);
    }

    pub fn add_contract_grant(&mut self, grant: ContractGrant) {
        self.contract_grants.push(grant);
    }

    pub fn revoke_contract_grant(
        &mut self,
        grant_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let grant = self
            .contract_grants
            .iter_mut()
            .find(|g| g.grant_id == grant_id)
            .ok_or(ServiceError::NotFound("Contract grant"))?;
        grant.revoked_utc = Some(at);
        Ok(())
    }

    pub fn upsert_knowledge_base(&mut self, kb: KnowledgeBase) {
        self.knowledge_bases.insert(kb.kb_id, kb);
    }

    pub fn add_kb_grant(&mut self, grant: KbGrant) {
        self.kb_grants.push(grant);
    }

    pub fn revoke_kb_grant(&mut self, grant_id: Uuid, at: DateTime<Utc>) -> Result<(), ServiceError> {
        let grant = self
            .kb_grants
            .iter_mut()
            .find(|g| g.grant_id == grant_id)
            .ok_or(ServiceError::NotFound("Knowledge-base grant"))?;
        grant.revoked_utc = Some(at);
        Ok(())
    }

    /// Add a delegation, rejecting cycles at write time. The read path never
    /// has to detect cycles; it only follows bounded hops.
    pub fn add_delegation(&mut self, delegation: OrgDelegation) -> Result<(), ServiceError> {
        if delegation.delegator_id == delegation.delegate_id
            || self.delegation_path_exists(delegation.delegate_id, delegation.delegator_id)
        {
            return Err(ServiceError::DelegationCycle);
        }
        self.delegations.push(delegation);
        Ok(())
    }

    pub fn revoke_delegation(&mut self, delegation_id: Uuid, at: DateTime<Utc>) -> Result<(), ServiceError> {
        let delegation = self
            .delegations
            .iter_mut()
            .find(|d| d.delegation_id == delegation_id)
            .ok_or(ServiceError::NotFound("Delegation"))?;
        delegation.revoked_utc = Some(at);
        Ok(())
    }

    /// Check whether `to` is reachable from `from` along unrevoked delegation
    /// edges (delegator -> delegate).
    pub fn delegation_path_exists(&self, from: Uuid, to: Uuid) -> bool {
        let mut visited = std::collections::HashSet::from([from]);
        let mut frontier = vec![from];
        while let Some(current) = frontier.pop() {
            for d in self.delegations.iter().filter(|d| d.revoked_utc.is_none()) {
                if d.delegator_id == current {
                    if d.delegate_id == to {
                        return true;
                    }
                    if visited.insert(d.delegate_id) {
                        frontier.push(d.delegate_id);
                    }
                }
            }
        }
        false
    }
}

// ============================================================================
// Snapshot (derived, immutable)
// ============================================================================

/// Actor with everything an evaluation needs resolved up front.
#[derive(Debug, Clone)]
pub struct ActorEntry {
    pub actor: Actor,
    pub positions: Vec<Position>,
    pub clearance_rank: i32,
}

/// Contract visibility with its level resolved to a rank.
#[derive(Debug, Clone)]
pub struct ContractEntry {
    pub visibility: ContractVisibility,
    pub required_rank: i32,
    pub grants: Vec<ContractGrant>,
}

/// Knowledge base with its grants.
#[derive(Debug, Clone)]
pub struct KbEntry {
    pub kb: KnowledgeBase,
    pub grants: Vec<KbGrant>,
}

/// One immutable view of policy/org/delegation state. Everything an
/// evaluation reads comes from a single pinned snapshot.
#[derive(Debug)]
pub struct Snapshot {
    pub version: u64,
    pub org_version: u64,
    pub org_index: OrgScopeIndex,
    actors: HashMap<Uuid, ActorEntry>,
    policies: HashMap<(String, String, String), Vec<AccessPolicy>>,
    delegations_to: HashMap<Uuid, Vec<OrgDelegation>>,
    contracts: HashMap<Uuid, ContractEntry>,
    knowledge_bases: HashMap<Uuid, KbEntry>,
}

impl Snapshot {
    pub fn actor(&self, actor_id: Uuid) -> Option<&ActorEntry> {
        self.actors.get(&actor_id)
    }

    pub fn contract(&self, contract_id: Uuid) -> Option<&ContractEntry> {
        self.contracts.get(&contract_id)
    }

    pub fn knowledge_base(&self, kb_id: Uuid) -> Option<&KbEntry> {
        self.knowledge_bases.get(&kb_id)
    }

    /// Unrevoked policies for (domain, resource type, action).
    pub fn policies_matching(
        &self,
        domain_code: &str,
        resource_type_code: &str,
        action_code: &str,
    ) -> &[AccessPolicy] {
        self.policies
            .get(&(
                domain_code.to_string(),
                resource_type_code.to_string(),
                action_code.to_string(),
            ))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All delegation records naming this actor as delegate, active or not.
    /// Callers filter by validity.
    pub fn delegations_to(&self, delegate_id: Uuid) -> &[OrgDelegation] {
        self.delegations_to
            .get(&delegate_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn build_snapshot(
    catalog: &Catalog,
    version: u64,
    hierarchy: &SecurityLevelHierarchy,
) -> Result<Snapshot, ServiceError> {
    let units: Vec<OrgUnit> = catalog.org_units.values().cloned().collect();
    let org_index = OrgScopeIndex::build(catalog.org_version, &units)?;

    let mut actors = HashMap::with_capacity(catalog.actors.len());
    for actor in catalog.actors.values() {
        let clearance_rank = match &actor.clearance_code {
            Some(code) => hierarchy.rank_of(code)?,
            None => hierarchy.least_privileged_rank(),
        };
        let positions: Vec<Position> = catalog
            .positions
            .iter()
            .filter(|p| p.user_id == Some(actor.actor_id))
            .cloned()
            .collect();
        actors.insert(
            actor.actor_id,
            ActorEntry {
                actor: actor.clone(),
                positions,
                clearance_rank,
            },
        );
    }

    let mut policies: HashMap<(String, String, String), Vec<AccessPolicy>> = HashMap::new();
    for policy in catalog.policies.iter().filter(|p| !p.is_revoked()) {
        if policy.scope().is_none() {
            return Err(ServiceError::MalformedPolicyScope(policy.policy_id));
        }
        policies
            .entry((
                policy.domain_code.clone(),
                policy.resource_type_code.clone(),
                policy.action_code.clone(),
            ))
            .or_default()
            .push(policy.clone());
    }

    let mut delegations_to: HashMap<Uuid, Vec<OrgDelegation>> = HashMap::new();
    for delegation in &catalog.delegations {
        delegations_to
            .entry(delegation.delegate_id)
            .or_default()
            .push(delegation.clone());
    }

    let mut contracts = HashMap::with_capacity(catalog.contracts.len());
    for visibility in catalog.contracts.values() {
        let required_rank = hierarchy.rank_of(&visibility.security_level_code)?;
        let grants: Vec<ContractGrant> = catalog
            .contract_grants
            .iter()
            .filter(|g| g.contract_id == visibility.contract_id && !g.is_revoked())
            .cloned()
            .collect();
        contracts.insert(
            visibility.contract_id,
            ContractEntry {
                visibility: visibility.clone(),
                required_rank,
                grants,
            },
        );
    }

    let mut knowledge_bases = HashMap::with_capacity(catalog.knowledge_bases.len());
    for kb in catalog.knowledge_bases.values() {
        let grants: Vec<KbGrant> = catalog
            .kb_grants
            .iter()
            .filter(|g| g.kb_id == kb.kb_id)
            .cloned()
            .collect();
        knowledge_bases.insert(
            kb.kb_id,
            KbEntry {
                kb: kb.clone(),
                grants,
            },
        );
    }

    Ok(Snapshot {
        version,
        org_version: catalog.org_version,
        org_index,
        actors,
        policies,
        delegations_to,
        contracts,
        knowledge_bases,
    })
}

// ============================================================================
// Store
// ============================================================================

struct StoreInner {
    catalog: Catalog,
    current: Arc<Snapshot>,
}

/// Thread-safe owner of the catalog and the currently published snapshot.
pub struct PolicyStore {
    hierarchy: Arc<SecurityLevelHierarchy>,
    inner: RwLock<StoreInner>,
}

impl PolicyStore {
    /// Create an empty store at version 1.
    pub fn new(hierarchy: Arc<SecurityLevelHierarchy>) -> Result<Self, ServiceError> {
        Self::from_catalog(hierarchy, Catalog::default())
    }

    /// Create a store from a preloaded catalog. Fails fast on any level name
    /// or scope the snapshot build cannot resolve.
    pub fn from_catalog(
        hierarchy: Arc<SecurityLevelHierarchy>,
        catalog: Catalog,
    ) -> Result<Self, ServiceError> {
        let current = Arc::new(build_snapshot(&catalog, 1, &hierarchy)?);
        Ok(Self {
            hierarchy,
            inner: RwLock::new(StoreInner { catalog, current }),
        })
    }

    pub fn hierarchy(&self) -> &Arc<SecurityLevelHierarchy> {
        &self.hierarchy
    }

    /// The currently published snapshot.
    pub fn snapshot(&self) -> Result<Arc<Snapshot>, ServiceError> {
        self.inner
            .read()
            .map(|inner| Arc::clone(&inner.current))
            .map_err(|_| ServiceError::SnapshotUnavailable("store lock poisoned".to_string()))
    }

    pub fn version(&self) -> Result<u64, ServiceError> {
        Ok(self.snapshot()?.version)
    }

    /// Run a read-only closure against the current catalog. Used by
    /// administrative handlers for reference validation before persisting.
    pub fn read<F, R>(&self, f: F) -> Result<R, ServiceError>
    where
        F: FnOnce(&Catalog) -> R,
    {
        self.inner
            .read()
            .map(|inner| f(&inner.catalog))
            .map_err(|_| ServiceError::SnapshotUnavailable("store lock poisoned".to_string()))
    }

    /// Apply an administrative mutation and publish the next snapshot version.
    ///
    /// The mutation runs against a staging copy; a failed mutation or a
    /// failed snapshot build leaves the published state untouched.
    pub fn apply<F>(&self, mutate: F) -> Result<u64, ServiceError>
    where
        F: FnOnce(&mut Catalog) -> Result<(), ServiceError>,
    {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ServiceError::SnapshotUnavailable("store lock poisoned".to_string()))?;

        let mut staging = inner.catalog.clone();
        mutate(&mut staging)?;

        let next_version = inner.current.version + 1;
        let snapshot = Arc::new(build_snapshot(&staging, next_version, &self.hierarchy)?);

        inner.catalog = staging;
        inner.current = snapshot;
        Ok(next_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SecurityLevel;

    fn hierarchy() -> Arc<SecurityLevelHierarchy> {
        Arc::new(
            SecurityLevelHierarchy::from_levels(&[
                SecurityLevel::new("confidential", 20),
                SecurityLevel::new("public", 40),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn apply_bumps_version_and_publishes() {
        let store = PolicyStore::new(hierarchy()).unwrap();
        assert_eq!(store.version().unwrap(), 1);

        let tenant = Tenant::new("acme".into(), "Acme".into());
        let version = store
            .apply(|catalog| {
                catalog.upsert_tenant(tenant.clone());
                Ok(())
            })
            .unwrap();

        assert_eq!(version, 2);
        assert_eq!(store.version().unwrap(), 2);
    }

    #[test]
    fn failed_apply_leaves_published_state_untouched() {
        let store = PolicyStore::new(hierarchy()).unwrap();
        let before = store.snapshot().unwrap();

        let result = store.apply(|catalog| {
            catalog.upsert_tenant(Tenant::new("acme".into(), "Acme".into()));
            Err(ServiceError::Validation("boom".to_string()))
        });

        assert!(result.is_err());
        let after = store.snapshot().unwrap();
        assert_eq!(before.version, after.version);
    }

    #[test]
    fn unknown_contract_level_fails_snapshot_build() {
        let store = PolicyStore::new(hierarchy()).unwrap();
        let result = store.apply(|catalog| {
            catalog.set_contract_visibility(ContractVisibility::new(
                Uuid::new_v4(),
                Uuid::new_v4(),
                Uuid::new_v4(),
                "cosmic".to_string(),
            ));
            Ok(())
        });
        assert!(matches!(result, Err(ServiceError::UnknownSecurityLevel(_))));
    }

    #[test]
    fn delegation_cycles_are_rejected_at_write_time() {
        let store = PolicyStore::new(hierarchy()).unwrap();
        let (a, b, tenant, unit) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();
        let later = now + chrono::Duration::days(1);

        store
            .apply(|catalog| {
                catalog.add_delegation(OrgDelegation::new(tenant, a, b, unit, now, later, 1))
            })
            .unwrap();

        let result = store.apply(|catalog| {
            catalog.add_delegation(OrgDelegation::new(tenant, b, a, unit, now, later, 1))
        });
        assert!(matches!(result, Err(ServiceError::DelegationCycle)));
    }
}
