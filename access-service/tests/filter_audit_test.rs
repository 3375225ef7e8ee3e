//! Bulk-filter equivalence and audit-trail guarantees.

mod common;

use std::sync::Arc;

use access_service::models::{AccessDomain, AccessLogRecord, Decision, PolicyEffect, PolicyScope};
use access_service::services::{
    AccessResolver, AuditLogger, AuditQuery, AuditStore, Catalog, ServiceError,
};
use async_trait::async_trait;
use common::{read_contract, seed_contract, seed_subtree_allow, seed_user, OrgFixture, TestHarness};
use uuid::Uuid;

#[tokio::test]
async fn filter_matches_per_item_checks_exactly() {
    // Arrange - three contracts: one readable, one above clearance, one in
    // another division with no covering policy
    let mut catalog = Catalog::default();
    let org = OrgFixture::seed(&mut catalog);
    let actor = seed_user(
        &mut catalog,
        org.tenant.tenant_id,
        org.division_a.org_unit_id,
        "analyst",
        Some("confidential"),
    );
    let readable = seed_contract(
        &mut catalog,
        org.tenant.tenant_id,
        org.division_a.org_unit_id,
        "confidential",
    );
    let classified = seed_contract(
        &mut catalog,
        org.tenant.tenant_id,
        org.division_a.org_unit_id,
        "secret",
    );
    let elsewhere = seed_contract(
        &mut catalog,
        org.tenant.tenant_id,
        org.division_b.org_unit_id,
        "public",
    );
    seed_subtree_allow(&mut catalog, org.tenant.tenant_id, org.division_a.org_unit_id);
    let harness = TestHarness::from_catalog(catalog);

    let all = vec![readable, classified, elsewhere];

    // Act
    let filtered = harness
        .resolver
        .filter_allowed(
            org.tenant.tenant_id,
            actor.actor_id,
            AccessDomain::Contracts,
            "contract",
            "read",
            &all,
        )
        .await
        .expect("filter succeeds");

    // Assert - bulk equals per-item
    let mut singles = Vec::new();
    for contract_id in &all {
        let resolved = harness
            .resolver
            .check_access(&read_contract(
                org.tenant.tenant_id,
                actor.actor_id,
                *contract_id,
            ))
            .await
            .expect("evaluation succeeds");
        if resolved.is_allowed() {
            singles.push(*contract_id);
        }
    }
    assert_eq!(filtered, singles);
    assert_eq!(filtered, vec![readable]);
}

#[tokio::test]
async fn every_evaluation_writes_exactly_one_audit_record() {
    // Arrange
    let mut catalog = Catalog::default();
    let org = OrgFixture::seed(&mut catalog);
    let actor = seed_user(
        &mut catalog,
        org.tenant.tenant_id,
        org.division_a.org_unit_id,
        "analyst",
        Some("confidential"),
    );
    let contract = seed_contract(
        &mut catalog,
        org.tenant.tenant_id,
        org.division_a.org_unit_id,
        "confidential",
    );
    let policy = seed_subtree_allow(&mut catalog, org.tenant.tenant_id, org.division_a.org_unit_id);
    let harness = TestHarness::from_catalog(catalog);

    // Act - one allowed read, one denied write
    let request = read_contract(org.tenant.tenant_id, actor.actor_id, contract);
    harness.resolver.check_access(&request).await.unwrap();

    let mut write_request = request.clone();
    write_request.action_code = "write".into();
    harness.resolver.check_access(&write_request).await.unwrap();

    // Assert
    let records = harness.audit_store.records();
    assert_eq!(records.len(), 2);

    let allow: &AccessLogRecord = &records[0];
    assert_eq!(allow.actor_id, actor.actor_id);
    assert_eq!(allow.tenant_id, org.tenant.tenant_id);
    assert_eq!(allow.resource_id, contract);
    assert_eq!(allow.action_code, "read");
    assert_eq!(allow.decision(), Decision::Allow);
    assert_eq!(allow.reason_code, None);
    assert_eq!(allow.matched_policy_id, Some(policy.policy_id));

    let denied = &records[1];
    assert_eq!(denied.action_code, "write");
    assert_eq!(denied.decision(), Decision::Deny);
    assert_eq!(denied.reason_code, Some("no_grant".to_string()));
    assert_eq!(denied.matched_policy_id, None);
}

#[tokio::test]
async fn bulk_filter_audits_every_item() {
    let mut catalog = Catalog::default();
    let org = OrgFixture::seed(&mut catalog);
    let actor = seed_user(
        &mut catalog,
        org.tenant.tenant_id,
        org.division_a.org_unit_id,
        "analyst",
        Some("confidential"),
    );
    let contracts: Vec<Uuid> = (0..3)
        .map(|_| {
            seed_contract(
                &mut catalog,
                org.tenant.tenant_id,
                org.division_a.org_unit_id,
                "confidential",
            )
        })
        .collect();
    seed_subtree_allow(&mut catalog, org.tenant.tenant_id, org.division_a.org_unit_id);
    let harness = TestHarness::from_catalog(catalog);

    harness
        .resolver
        .filter_allowed(
            org.tenant.tenant_id,
            actor.actor_id,
            AccessDomain::Contracts,
            "contract",
            "read",
            &contracts,
        )
        .await
        .unwrap();

    assert_eq!(harness.audit_store.records().len(), contracts.len());
}

/// Audit sink that refuses every append.
struct FailingAuditStore;

#[async_trait]
impl AuditStore for FailingAuditStore {
    async fn append(&self, _record: &AccessLogRecord) -> Result<(), ServiceError> {
        Err(ServiceError::AuditUnavailable("sink offline".to_string()))
    }

    async fn query(&self, _filter: &AuditQuery) -> Result<Vec<AccessLogRecord>, ServiceError> {
        Err(ServiceError::AuditUnavailable("sink offline".to_string()))
    }
}

#[tokio::test]
async fn unaudited_decisions_never_reach_the_caller() {
    // Arrange - a request that would be allowed, but the audit sink is down
    let mut catalog = Catalog::default();
    let org = OrgFixture::seed(&mut catalog);
    let actor = seed_user(
        &mut catalog,
        org.tenant.tenant_id,
        org.division_a.org_unit_id,
        "analyst",
        Some("confidential"),
    );
    let contract = seed_contract(
        &mut catalog,
        org.tenant.tenant_id,
        org.division_a.org_unit_id,
        "confidential",
    );
    seed_subtree_allow(&mut catalog, org.tenant.tenant_id, org.division_a.org_unit_id);
    let harness = TestHarness::from_catalog(catalog);

    let resolver = AccessResolver::new(
        harness.store.clone(),
        AuditLogger::new(Arc::new(FailingAuditStore)),
    );

    // Act
    let result = resolver
        .check_access(&read_contract(org.tenant.tenant_id, actor.actor_id, contract))
        .await;

    // Assert - a distinct failure, not a silent allow and not a policy deny
    assert!(matches!(result, Err(ServiceError::AuditUnavailable(_))));
}

#[tokio::test]
async fn audit_query_filters_by_actor_and_resource() {
    let mut catalog = Catalog::default();
    let org = OrgFixture::seed(&mut catalog);
    let alice = seed_user(
        &mut catalog,
        org.tenant.tenant_id,
        org.division_a.org_unit_id,
        "analyst",
        Some("confidential"),
    );
    let bob = seed_user(
        &mut catalog,
        org.tenant.tenant_id,
        org.division_a.org_unit_id,
        "analyst",
        Some("confidential"),
    );
    let contract = seed_contract(
        &mut catalog,
        org.tenant.tenant_id,
        org.division_a.org_unit_id,
        "confidential",
    );
    seed_subtree_allow(&mut catalog, org.tenant.tenant_id, org.division_a.org_unit_id);
    let harness = TestHarness::from_catalog(catalog);

    for actor in [&alice, &bob] {
        harness
            .resolver
            .check_access(&read_contract(
                org.tenant.tenant_id,
                actor.actor_id,
                contract,
            ))
            .await
            .unwrap();
    }

    let logger = AuditLogger::new(harness.audit_store.clone() as Arc<dyn AuditStore>);
    let records = logger
        .query(&AuditQuery {
            tenant_id: org.tenant.tenant_id,
            actor_id: Some(alice.actor_id),
            resource_id: Some(contract),
            from_utc: None,
            to_utc: None,
            limit: 100,
            offset: 0,
        })
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].actor_id, alice.actor_id);
}

#[tokio::test]
async fn evaluations_pin_the_snapshot_current_at_call_start() {
    // Arrange
    let mut catalog = Catalog::default();
    let org = OrgFixture::seed(&mut catalog);
    let actor = seed_user(
        &mut catalog,
        org.tenant.tenant_id,
        org.division_a.org_unit_id,
        "analyst",
        Some("confidential"),
    );
    let contract = seed_contract(
        &mut catalog,
        org.tenant.tenant_id,
        org.division_a.org_unit_id,
        "confidential",
    );
    seed_subtree_allow(&mut catalog, org.tenant.tenant_id, org.division_a.org_unit_id);
    let harness = TestHarness::from_catalog(catalog);

    let request = read_contract(org.tenant.tenant_id, actor.actor_id, contract);

    // Act - allowed at version 1
    let before = harness.resolver.check_access(&request).await.unwrap();

    // Concurrent administrative edit publishes version 2 with a deny
    let deny = access_service::models::AccessPolicy::new(
        org.tenant.tenant_id,
        AccessDomain::Contracts,
        "contract".into(),
        "read".into(),
        Some(contract),
        PolicyScope::User { user_id: actor.actor_id },
        PolicyEffect::Deny,
        1,
    );
    harness
        .store
        .apply(|catalog| {
            catalog.add_policy(deny.clone());
            Ok(())
        })
        .unwrap();

    let after = harness.resolver.check_access(&request).await.unwrap();

    // Assert - each evaluation reflects exactly one snapshot version
    assert_eq!(before.decision, Decision::Allow);
    assert_eq!(before.snapshot_version, 1);
    assert_eq!(after.decision, Decision::Deny);
    assert_eq!(after.snapshot_version, 2);
}
