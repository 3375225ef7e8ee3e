//! Handler-level tests over the axum surface, plus snapshot version flow.

mod common;

use access_service::build_router;
use access_service::models::Decision;
use access_service::services::Catalog;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::{seed_contract, seed_subtree_allow, seed_user, test_app_state, OrgFixture, TestHarness};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn check_access_endpoint_round_trip() {
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
    let app = build_router(test_app_state(&harness)).await.unwrap();

    // Act
    let request = Request::builder()
        .method("POST")
        .uri("/access/check")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-actor-id", actor.actor_id.to_string())
        .header("x-tenant-id", org.tenant.tenant_id.to_string())
        .body(Body::from(
            json!({
                "domain": "contracts",
                "resource_id": contract,
                "action": "read"
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["decision"], "allow");
    assert_eq!(body["snapshot_version"], 1);
    assert!(body.get("reason").is_none());
}

#[tokio::test]
async fn check_access_requires_gateway_identity_headers() {
    let harness = TestHarness::new();
    let app = build_router(test_app_state(&harness)).await.unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/access/check")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "domain": "contracts",
                "resource_id": uuid::Uuid::new_v4(),
                "action": "read"
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn denied_check_reports_reason_code() {
    // Arrange - no policies at all
    let mut catalog = Catalog::default();
    let org = OrgFixture::seed(&mut catalog);
    let actor = seed_user(
        &mut catalog,
        org.tenant.tenant_id,
        org.division_a.org_unit_id,
        "analyst",
        Some("secret"),
    );
    let contract = seed_contract(
        &mut catalog,
        org.tenant.tenant_id,
        org.division_a.org_unit_id,
        "public",
    );
    let harness = TestHarness::from_catalog(catalog);
    let app = build_router(test_app_state(&harness)).await.unwrap();

    // Act
    let request = Request::builder()
        .method("POST")
        .uri("/access/check")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-actor-id", actor.actor_id.to_string())
        .header("x-tenant-id", org.tenant.tenant_id.to_string())
        .body(Body::from(
            json!({
                "domain": "contracts",
                "resource_id": contract,
                "action": "read"
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["decision"], "deny");
    assert_eq!(body["reason"], "no_grant");
}

#[tokio::test]
async fn audit_records_are_queryable_over_http() {
    // Arrange - one evaluation, then read the trail back
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

    harness
        .resolver
        .check_access(&common::read_contract(
            org.tenant.tenant_id,
            actor.actor_id,
            contract,
        ))
        .await
        .unwrap();

    let app = build_router(test_app_state(&harness)).await.unwrap();

    // Act
    let uri = format!(
        "/audit/records?tenant_id={}&actor_id={}",
        org.tenant.tenant_id, actor.actor_id
    );
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let records = body["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["decision"], Decision::Allow.as_str());
    assert_eq!(records[0]["action"], "read");
}

#[tokio::test]
async fn admin_writes_advance_the_snapshot_version() {
    // Direct store flow; the HTTP admin handlers persist to PostgreSQL and
    // are covered by the ignored test below
    let mut catalog = Catalog::default();
    let org = OrgFixture::seed(&mut catalog);
    let actor = seed_user(
        &mut catalog,
        org.tenant.tenant_id,
        org.division_a.org_unit_id,
        "analyst",
        Some("confidential"),
    );
    let harness = TestHarness::from_catalog(catalog);
    assert_eq!(harness.store.version().unwrap(), 1);

    let contract = uuid::Uuid::new_v4();
    let version = harness
        .store
        .apply(|catalog| {
            catalog.set_contract_visibility(access_service::models::ContractVisibility::new(
                contract,
                org.tenant.tenant_id,
                org.division_a.org_unit_id,
                "confidential".into(),
            ));
            Ok(())
        })
        .unwrap();
    assert_eq!(version, 2);

    let version = harness
        .store
        .apply(|catalog| {
            catalog.add_contract_grant(access_service::models::ContractGrant::new(
                org.tenant.tenant_id,
                contract,
                actor.actor_id,
                "read".into(),
            ));
            Ok(())
        })
        .unwrap();
    assert_eq!(version, 3);

    let resolved = harness
        .resolver
        .check_access(&common::read_contract(
            org.tenant.tenant_id,
            actor.actor_id,
            contract,
        ))
        .await
        .unwrap();
    assert_eq!(resolved.decision, Decision::Allow);
    assert_eq!(resolved.snapshot_version, 3);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn policy_create_persists_and_publishes() {
    // Arrange - full stack against a local database
    let harness = TestHarness::new();
    let state = test_app_state(&harness);
    state.db.health_check().await.expect("PostgreSQL reachable");

    let app = build_router(state).await.unwrap();

    let tenant_request = Request::builder()
        .method("POST")
        .uri("/tenants")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"tenant_slug": "acme", "tenant_label": "Acme Corp"}).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(tenant_request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let tenant_id = body_json(response).await["tenant_id"].as_str().unwrap().to_string();

    // Act - create a tenant-default policy
    let policy_request = Request::builder()
        .method("POST")
        .uri("/policies")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "tenant_id": tenant_id,
                "domain": "contracts",
                "resource_type": "contract",
                "action": "read",
                "scope": {"kind": "tenant_default"},
                "effect": "allow"
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.oneshot(policy_request).await.unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert!(body["snapshot_version"].as_u64().unwrap() >= 3);
}
