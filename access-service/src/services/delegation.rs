//! Delegation resolver - effective organizational scope at a point in time.
//!
//! An actor's effective scope is the union of their own active positions and
//! every scope delegated to them within the validity window, following at
//! most `max_depth` hops per originating delegation. Cycles are rejected at
//! write time, so the read path only bounds depth and tracks visited actors.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::services::policy_store::Snapshot;

/// Scope descriptors an evaluation matches policies against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveScopes {
    /// Org units the actor can act within: own position units plus delegated
    /// subtree roots.
    pub org_units: HashSet<Uuid>,
    /// Role codes from the actor's own positions. Delegation transfers
    /// organizational scope, not identity, so these never travel.
    pub role_codes: HashSet<String>,
    /// The subset of `org_units` contributed by delegation.
    pub delegated_units: HashSet<Uuid>,
}

pub struct DelegationResolver;

impl DelegationResolver {
    /// Effective scopes at `as_of`, honoring delegation validity windows.
    pub fn effective_scopes(snapshot: &Snapshot, actor_id: Uuid, as_of: DateTime<Utc>) -> EffectiveScopes {
        Self::resolve(snapshot, actor_id, as_of, false)
    }

    /// Effective scopes with expired and not-yet-active delegations treated
    /// as if they were in force. Used only to refine a `no_grant` denial
    /// into `delegation_expired` for the audit trail.
    pub fn effective_scopes_including_inactive(
        snapshot: &Snapshot,
        actor_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> EffectiveScopes {
        Self::resolve(snapshot, actor_id, as_of, true)
    }

    fn resolve(
        snapshot: &Snapshot,
        actor_id: Uuid,
        as_of: DateTime<Utc>,
        include_inactive: bool,
    ) -> EffectiveScopes {
        let mut org_units = HashSet::new();
        let mut role_codes = HashSet::new();

        if let Some(entry) = snapshot.actor(actor_id) {
            for position in entry.positions.iter().filter(|p| p.is_active_at(as_of)) {
                org_units.insert(position.org_unit_id);
                role_codes.insert(position.role_code.clone());
            }
        }

        let delegated_units = Self::delegated_units(snapshot, actor_id, as_of, include_inactive);
        org_units.extend(delegated_units.iter().copied());

        EffectiveScopes {
            org_units,
            role_codes,
            delegated_units,
        }
    }

    /// Walk delegation edges backwards from the actor, breadth-first so each
    /// delegator is first reached at its minimal hop count. An edge at hop h
    /// contributes its scope only if its `max_depth` allows h hops.
    fn delegated_units(
        snapshot: &Snapshot,
        actor_id: Uuid,
        as_of: DateTime<Utc>,
        include_inactive: bool,
    ) -> HashSet<Uuid> {
        let mut out = HashSet::new();
        let mut visited = HashSet::from([actor_id]);
        let mut frontier = VecDeque::from([(actor_id, 1u32)]);

        while let Some((delegate, hop)) = frontier.pop_front() {
            for delegation in snapshot.delegations_to(delegate) {
                if !include_inactive && !delegation.is_active_at(as_of) {
                    continue;
                }
                if (delegation.max_depth as u32) < hop {
                    continue;
                }
                out.insert(delegation.scope_org_unit_id);
                if visited.insert(delegation.delegator_id) {
                    frontier.push_back((delegation.delegator_id, hop + 1));
                }
            }
        }

        out
    }
}
