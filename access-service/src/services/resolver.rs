//! Access resolver - the single evaluation entry point.
//!
//! Composes the org index, delegation resolver, policy snapshot and security
//! level hierarchy into one allow/deny decision, and writes exactly one audit
//! record per evaluation before the decision is released to the caller.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    AccessDomain, AccessLogRecord, Decision, DenyReason, PolicyEffect, PolicyScope,
};
use crate::services::delegation::{DelegationResolver, EffectiveScopes};
use crate::services::policy_store::{ActorEntry, PolicyStore, Snapshot};
use crate::services::{AuditLogger, SecurityLevelHierarchy, ServiceError, metrics};

/// One evaluation request. The tenant the caller is acting in is threaded
/// explicitly; it is never inferred from ambient state.
#[derive(Debug, Clone)]
pub struct AccessRequest {
    pub tenant_id: Uuid,
    pub actor_id: Uuid,
    pub domain: AccessDomain,
    pub resource_type_code: String,
    pub resource_id: Uuid,
    pub action_code: String,
}

/// Outcome of a completed evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDecision {
    pub decision: Decision,
    pub reason: Option<DenyReason>,
    pub matched_policy_id: Option<Uuid>,
    pub snapshot_version: u64,
}

impl ResolvedDecision {
    pub fn is_allowed(&self) -> bool {
        self.decision == Decision::Allow
    }
}

/// A policy or grant that matched the request.
#[derive(Debug, Clone)]
struct PolicyMatch {
    specificity: u8,
    resource_specific: bool,
    effect: PolicyEffect,
    matched_id: Option<Uuid>,
}

/// What the snapshot knows about the requested resource.
enum ResourceMeta<'a> {
    Contract(&'a crate::services::policy_store::ContractEntry),
    KnowledgeBase(&'a crate::services::policy_store::KbEntry),
}

impl ResourceMeta<'_> {
    fn tenant_id(&self) -> Uuid {
        match self {
            ResourceMeta::Contract(entry) => entry.visibility.tenant_id,
            ResourceMeta::KnowledgeBase(entry) => entry.kb.tenant_id,
        }
    }
}

/// The resolver service. Cheap to clone; shares the store and audit sink.
#[derive(Clone)]
pub struct AccessResolver {
    store: Arc<PolicyStore>,
    audit: AuditLogger,
}

impl AccessResolver {
    pub fn new(store: Arc<PolicyStore>, audit: AuditLogger) -> Self {
        Self { store, audit }
    }

    /// Evaluate one request at the current time.
    ///
    /// Returns `Err` only for infrastructure failures (snapshot or audit
    /// store unavailable); those are never coerced into an allow, and are
    /// reported distinctly from policy-driven denials.
    pub async fn check_access(&self, req: &AccessRequest) -> Result<ResolvedDecision, ServiceError> {
        self.check_access_at(req, Utc::now()).await
    }

    /// Evaluate one request as of an explicit instant.
    pub async fn check_access_at(
        &self,
        req: &AccessRequest,
        as_of: DateTime<Utc>,
    ) -> Result<ResolvedDecision, ServiceError> {
        let snapshot = self.store.snapshot()?;
        self.evaluate_and_audit(&snapshot, req, as_of).await
    }

    /// Bulk pre-filter: the subset of `resource_ids` the actor may act on.
    ///
    /// Evaluates every item individually against one pinned snapshot, audit
    /// record included, so results are exactly those of per-item
    /// `check_access` calls at that snapshot.
    pub async fn filter_allowed(
        &self,
        tenant_id: Uuid,
        actor_id: Uuid,
        domain: AccessDomain,
        resource_type_code: &str,
        action_code: &str,
        resource_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, ServiceError> {
        let snapshot = self.store.snapshot()?;
        let as_of = Utc::now();
        let mut allowed = Vec::new();

        for resource_id in resource_ids {
            let req = AccessRequest {
                tenant_id,
                actor_id,
                domain,
                resource_type_code: resource_type_code.to_string(),
                resource_id: *resource_id,
                action_code: action_code.to_string(),
            };
            let decision = self.evaluate_and_audit(&snapshot, &req, as_of).await?;
            if decision.is_allowed() {
                allowed.push(*resource_id);
            }
        }

        Ok(allowed)
    }

    /// Read access to the store for administrative collaborators.
    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    async fn evaluate_and_audit(
        &self,
        snapshot: &Snapshot,
        req: &AccessRequest,
        as_of: DateTime<Utc>,
    ) -> Result<ResolvedDecision, ServiceError> {
        let resolved = evaluate(snapshot, req, as_of)?;

        let record = AccessLogRecord::new(
            req.tenant_id,
            req.actor_id,
            req.domain,
            req.resource_type_code.clone(),
            req.resource_id,
            req.action_code.clone(),
            resolved.decision,
            resolved.reason,
            resolved.matched_policy_id,
        );
        // The decision must not be released until the audit record is durable.
        self.audit.record(record).await?;

        metrics::record_decision(req.domain, &resolved);

        tracing::debug!(
            actor_id = %req.actor_id,
            resource_id = %req.resource_id,
            domain = %req.domain.as_str(),
            action = %req.action_code,
            decision = %resolved.decision.as_str(),
            reason = ?resolved.reason.map(|r| r.as_str()),
            snapshot_version = resolved.snapshot_version,
            "Access evaluated"
        );

        Ok(resolved)
    }
}

/// Pure decision function over one pinned snapshot. Identical inputs at the
/// same snapshot version always produce the same decision.
pub fn evaluate(
    snapshot: &Snapshot,
    req: &AccessRequest,
    as_of: DateTime<Utc>,
) -> Result<ResolvedDecision, ServiceError> {
    snapshot.org_index.ensure_version(snapshot.org_version)?;

    let deny = |reason: DenyReason, matched: Option<Uuid>| ResolvedDecision {
        decision: Decision::Deny,
        reason: Some(reason),
        matched_policy_id: matched,
        snapshot_version: snapshot.version,
    };

    // Unknown or deactivated actors hold no grants. Fail closed.
    let Some(actor) = snapshot.actor(req.actor_id) else {
        return Ok(deny(DenyReason::NoGrant, None));
    };
    if !actor.actor.active_flag {
        return Ok(deny(DenyReason::NoGrant, None));
    }
    if actor.actor.tenant_id != req.tenant_id {
        return Ok(deny(DenyReason::CrossTenant, None));
    }

    // Unknown resources likewise carry no grants.
    let resource = match req.domain {
        AccessDomain::Contracts => snapshot.contract(req.resource_id).map(ResourceMeta::Contract),
        AccessDomain::KnowledgeBase => snapshot
            .knowledge_base(req.resource_id)
            .map(ResourceMeta::KnowledgeBase),
    };
    let Some(resource) = resource else {
        return Ok(deny(DenyReason::NoGrant, None));
    };

    if resource.tenant_id() != actor.actor.tenant_id {
        return Ok(deny(DenyReason::CrossTenant, None));
    }

    // The knowledge-base universe is reachable by automated agents only.
    if req.domain == AccessDomain::KnowledgeBase && !actor.actor.is_agent() {
        return Ok(deny(DenyReason::WrongDomain, None));
    }

    let scopes = DelegationResolver::effective_scopes(snapshot, req.actor_id, as_of);
    let matches = collect_matches(snapshot, req, actor, &scopes, &resource, as_of);

    if matches.is_empty() {
        // Refine no_grant to delegation_expired when an out-of-window
        // delegation is the only thing standing between the actor and an
        // allow. Access is denied either way.
        let probe =
            DelegationResolver::effective_scopes_including_inactive(snapshot, req.actor_id, as_of);
        if probe.delegated_units != scopes.delegated_units {
            let probe_matches = collect_matches(snapshot, req, actor, &probe, &resource, as_of);
            let probe_decision = decide_from_matches(&probe_matches, actor, &resource, snapshot.version);
            if probe_decision.is_allowed() {
                return Ok(deny(DenyReason::DelegationExpired, None));
            }
        }
        return Ok(deny(DenyReason::NoGrant, None));
    }

    Ok(decide_from_matches(&matches, actor, &resource, snapshot.version))
}

/// Collect every policy and grant match for the request over the resolved
/// scope candidates.
fn collect_matches(
    snapshot: &Snapshot,
    req: &AccessRequest,
    actor: &ActorEntry,
    scopes: &EffectiveScopes,
    resource: &ResourceMeta<'_>,
    as_of: DateTime<Utc>,
) -> Vec<PolicyMatch> {
    let mut matches = Vec::new();

    for policy in snapshot.policies_matching(
        req.domain.as_str(),
        &req.resource_type_code,
        &req.action_code,
    ) {
        if policy.tenant_id != actor.actor.tenant_id {
            continue;
        }
        if policy.resource_id.is_some_and(|r| r != req.resource_id) {
            continue;
        }
        let Some(scope) = policy.scope() else {
            continue;
        };
        let covered = match &scope {
            PolicyScope::User { user_id } => *user_id == req.actor_id,
            PolicyScope::Role { role_code } => scopes.role_codes.contains(role_code),
            PolicyScope::OrgSubtree { org_unit_id } => scopes
                .org_units
                .iter()
                .any(|unit| snapshot.org_index.is_within(*unit, *org_unit_id)),
            PolicyScope::TenantDefault => true,
        };
        if covered {
            matches.push(PolicyMatch {
                specificity: scope.specificity(),
                resource_specific: policy.resource_id.is_some(),
                effect: policy.effect(),
                matched_id: Some(policy.policy_id),
            });
        }
    }

    match resource {
        // Explicit per-contract grants behave as user-specific allows. They
        // widen who may match; the level requirement still applies in full.
        ResourceMeta::Contract(entry) => {
            for grant in entry
                .grants
                .iter()
                .filter(|g| g.user_id == req.actor_id && g.action_code == req.action_code)
            {
                matches.push(PolicyMatch {
                    specificity: PolicyScope::User { user_id: grant.user_id }.specificity(),
                    resource_specific: true,
                    effect: PolicyEffect::Allow,
                    matched_id: Some(grant.grant_id),
                });
            }
        }
        ResourceMeta::KnowledgeBase(entry) => {
            for grant in entry
                .grants
                .iter()
                .filter(|g| g.is_active_at(as_of) && g.allows_action(&req.action_code))
            {
                let covered = match grant.grantee() {
                    Some(crate::models::KbGrantee::User { user_id }) => user_id == req.actor_id,
                    Some(crate::models::KbGrantee::OrgSubtree { org_unit_id }) => scopes
                        .org_units
                        .iter()
                        .any(|unit| snapshot.org_index.is_within(*unit, org_unit_id)),
                    None => false,
                };
                if covered {
                    let specificity = match grant.grantee() {
                        Some(crate::models::KbGrantee::User { .. }) => 3,
                        _ => 1,
                    };
                    matches.push(PolicyMatch {
                        specificity,
                        resource_specific: true,
                        effect: PolicyEffect::Allow,
                        matched_id: Some(grant.grant_id),
                    });
                }
            }
        }
    }

    matches
}

/// Precedence: the most specific rank with any match decides; within that
/// rank a deny always beats an allow. A winning allow on a contract must
/// still pass the classification gate.
fn decide_from_matches(
    matches: &[PolicyMatch],
    actor: &ActorEntry,
    resource: &ResourceMeta<'_>,
    snapshot_version: u64,
) -> ResolvedDecision {
    let deny = |reason: DenyReason, matched: Option<Uuid>| ResolvedDecision {
        decision: Decision::Deny,
        reason: Some(reason),
        matched_policy_id: matched,
        snapshot_version,
    };

    let Some(top) = matches.iter().map(|m| m.specificity).max() else {
        return deny(DenyReason::NoGrant, None);
    };
    let at_top: Vec<&PolicyMatch> = matches.iter().filter(|m| m.specificity == top).collect();

    if let Some(denial) = at_top.iter().find(|m| m.effect == PolicyEffect::Deny) {
        return deny(DenyReason::ExplicitDeny, denial.matched_id);
    }

    let winner = at_top
        .iter()
        .max_by_key(|m| m.resource_specific)
        .expect("at_top is non-empty");

    if let ResourceMeta::Contract(entry) = resource {
        if !SecurityLevelHierarchy::level_satisfies(actor.clearance_rank, entry.required_rank) {
            return deny(DenyReason::InsufficientClearance, None);
        }
    }

    ResolvedDecision {
        decision: Decision::Allow,
        reason: None,
        matched_policy_id: winner.matched_id,
        snapshot_version,
    }
}
