//! PostgreSQL persistence for the catalog and the audit trail.
//!
//! The resolver itself never reads these tables on the evaluation path; the
//! catalog is hydrated into the policy store at startup and kept in sync by
//! administrative writes, which persist here first.

use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::models::{
    AccessLogRecord, AccessPolicy, Actor, ContractGrant, ContractVisibility, KbGrant,
    KnowledgeBase, OrgDelegation, OrgUnit, Position, Tenant,
};
use crate::services::audit::AuditQuery;
use crate::services::policy_store::Catalog;
use crate::services::ServiceError;

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database wrapper from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Health check - ping the database.
    pub async fn health_check(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ==================== Catalog hydration ====================

    /// Load the full catalog for the policy store. Called once at startup.
    pub async fn load_catalog(&self) -> Result<Catalog, ServiceError> {
        let tenants = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants")
            .fetch_all(&self.pool)
            .await?;
        let org_units = sqlx::query_as::<_, OrgUnit>("SELECT * FROM org_units")
            .fetch_all(&self.pool)
            .await?;
        let positions = sqlx::query_as::<_, Position>("SELECT * FROM positions")
            .fetch_all(&self.pool)
            .await?;
        let actors = sqlx::query_as::<_, Actor>("SELECT * FROM actors")
            .fetch_all(&self.pool)
            .await?;
        let policies = sqlx::query_as::<_, AccessPolicy>("SELECT * FROM access_policies")
            .fetch_all(&self.pool)
            .await?;
        let delegations = sqlx::query_as::<_, OrgDelegation>("SELECT * FROM org_delegations")
            .fetch_all(&self.pool)
            .await?;
        let contracts =
            sqlx::query_as::<_, ContractVisibility>("SELECT * FROM contract_visibility")
                .fetch_all(&self.pool)
                .await?;
        let contract_grants = sqlx::query_as::<_, ContractGrant>("SELECT * FROM contract_grants")
            .fetch_all(&self.pool)
            .await?;
        let knowledge_bases = sqlx::query_as::<_, KnowledgeBase>("SELECT * FROM knowledge_bases")
            .fetch_all(&self.pool)
            .await?;
        let kb_grants = sqlx::query_as::<_, KbGrant>("SELECT * FROM kb_grants")
            .fetch_all(&self.pool)
            .await?;
        let org_version = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(MAX(org_version), 0) FROM org_tree_versions",
        )
        .fetch_one(&self.pool)
        .await?;

        let mut catalog = Catalog {
            org_version: org_version.max(0) as u64,
            ..Catalog::default()
        };
        for tenant in tenants {
            catalog.tenants.insert(tenant.tenant_id, tenant);
        }
        for unit in org_units {
            catalog.org_units.insert(unit.org_unit_id, unit);
        }
        catalog.positions = positions;
        for actor in actors {
            catalog.actors.insert(actor.actor_id, actor);
        }
        catalog.policies = policies;
        catalog.delegations = delegations;
        for visibility in contracts {
            catalog.contracts.insert(visibility.contract_id, visibility);
        }
        catalog.contract_grants = contract_grants;
        for kb in knowledge_bases {
            catalog.knowledge_bases.insert(kb.kb_id, kb);
        }
        catalog.kb_grants = kb_grants;

        Ok(catalog)
    }

    // ==================== Tenant / org operations ====================

    /// Insert a new tenant.
    pub async fn insert_tenant(&self, tenant: &Tenant) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO tenants (tenant_id, tenant_slug, tenant_label, tenant_state_code, created_utc)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(tenant.tenant_id)
        .bind(&tenant.tenant_slug)
        .bind(&tenant.tenant_label)
        .bind(&tenant.tenant_state_code)
        .bind(tenant.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Replace a tenant's org tree and record the new org version.
    pub async fn replace_org_tree(
        &self,
        tenant_id: Uuid,
        units: &[OrgUnit],
        org_version: u64,
    ) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM org_units WHERE tenant_id = $1")
            .bind(tenant_id)
            .execute(&mut *tx)
            .await?;

        for unit in units {
            sqlx::query(
                r#"
                INSERT INTO org_units
                    (org_unit_id, tenant_id, parent_org_unit_id, unit_type_code, unit_label, path, active_flag, created_utc)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(unit.org_unit_id)
            .bind(unit.tenant_id)
            .bind(unit.parent_org_unit_id)
            .bind(&unit.unit_type_code)
            .bind(&unit.unit_label)
            .bind(&unit.path)
            .bind(unit.active_flag)
            .bind(unit.created_utc)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("INSERT INTO org_tree_versions (org_version, tenant_id) VALUES ($1, $2)")
            .bind(org_version as i64)
            .bind(tenant_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Upsert an actor.
    pub async fn upsert_actor(&self, actor: &Actor) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO actors
                (actor_id, tenant_id, actor_kind_code, display_label, clearance_code, active_flag, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (actor_id) DO UPDATE SET
                actor_kind_code = EXCLUDED.actor_kind_code,
                display_label = EXCLUDED.display_label,
                clearance_code = EXCLUDED.clearance_code,
                active_flag = EXCLUDED.active_flag
            "#,
        )
        .bind(actor.actor_id)
        .bind(actor.tenant_id)
        .bind(&actor.actor_kind_code)
        .bind(&actor.display_label)
        .bind(&actor.clearance_code)
        .bind(actor.active_flag)
        .bind(actor.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a new position.
    pub async fn insert_position(&self, position: &Position) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO positions
                (position_id, tenant_id, org_unit_id, role_code, user_id, start_utc, end_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(position.position_id)
        .bind(position.tenant_id)
        .bind(position.org_unit_id)
        .bind(&position.role_code)
        .bind(position.user_id)
        .bind(position.start_utc)
        .bind(position.end_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ==================== Policy operations ====================

    /// Insert a new access policy.
    pub async fn insert_policy(&self, policy: &AccessPolicy) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO access_policies
                (policy_id, tenant_id, domain_code, resource_type_code, action_code, resource_id,
                 scope_kind_code, scope_user_id, scope_role_code, scope_org_unit_id,
                 effect_code, snapshot_version, revoked_utc, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(policy.policy_id)
        .bind(policy.tenant_id)
        .bind(&policy.domain_code)
        .bind(&policy.resource_type_code)
        .bind(&policy.action_code)
        .bind(policy.resource_id)
        .bind(&policy.scope_kind_code)
        .bind(policy.scope_user_id)
        .bind(&policy.scope_role_code)
        .bind(policy.scope_org_unit_id)
        .bind(&policy.effect_code)
        .bind(policy.snapshot_version)
        .bind(policy.revoked_utc)
        .bind(policy.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark a policy revoked. Rows are kept for audit.
    pub async fn revoke_policy(&self, policy_id: Uuid) -> Result<(), ServiceError> {
        sqlx::query("UPDATE access_policies SET revoked_utc = now() WHERE policy_id = $1")
            .bind(policy_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ==================== Contract visibility operations ====================

    /// Upsert a contract's visibility attributes.
    pub async fn upsert_contract_visibility(
        &self,
        visibility: &ContractVisibility,
    ) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO contract_visibility
                (contract_id, tenant_id, org_unit_id, security_level_code, updated_utc)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (contract_id) DO UPDATE SET
                org_unit_id = EXCLUDED.org_unit_id,
                security_level_code = EXCLUDED.security_level_code,
                updated_utc = EXCLUDED.updated_utc
            "#,
        )
        .bind(visibility.contract_id)
        .bind(visibility.tenant_id)
        .bind(visibility.org_unit_id)
        .bind(&visibility.security_level_code)
        .bind(visibility.updated_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert an explicit per-contract grant.
    pub async fn insert_contract_grant(&self, grant: &ContractGrant) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO contract_grants
                (grant_id, tenant_id, contract_id, user_id, action_code, revoked_utc, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(grant.grant_id)
        .bind(grant.tenant_id)
        .bind(grant.contract_id)
        .bind(grant.user_id)
        .bind(&grant.action_code)
        .bind(grant.revoked_utc)
        .bind(grant.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark a contract grant revoked.
    pub async fn revoke_contract_grant(&self, grant_id: Uuid) -> Result<(), ServiceError> {
        sqlx::query("UPDATE contract_grants SET revoked_utc = now() WHERE grant_id = $1")
            .bind(grant_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ==================== Knowledge-base operations ====================

    /// Upsert a knowledge-base registry entry.
    pub async fn upsert_knowledge_base(&self, kb: &KnowledgeBase) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO knowledge_bases (kb_id, tenant_id, kb_label, created_utc)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (kb_id) DO UPDATE SET kb_label = EXCLUDED.kb_label
            "#,
        )
        .bind(kb.kb_id)
        .bind(kb.tenant_id)
        .bind(&kb.kb_label)
        .bind(kb.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a knowledge-base grant.
    pub async fn insert_kb_grant(&self, grant: &KbGrant) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO kb_grants
                (grant_id, tenant_id, kb_id, grantee_kind_code, grantee_org_unit_id,
                 grantee_user_id, can_query, can_manage, start_utc, end_utc, revoked_utc, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(grant.grant_id)
        .bind(grant.tenant_id)
        .bind(grant.kb_id)
        .bind(&grant.grantee_kind_code)
        .bind(grant.grantee_org_unit_id)
        .bind(grant.grantee_user_id)
        .bind(grant.can_query)
        .bind(grant.can_manage)
        .bind(grant.start_utc)
        .bind(grant.end_utc)
        .bind(grant.revoked_utc)
        .bind(grant.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark a knowledge-base grant revoked.
    pub async fn revoke_kb_grant(&self, grant_id: Uuid) -> Result<(), ServiceError> {
        sqlx::query("UPDATE kb_grants SET revoked_utc = now() WHERE grant_id = $1")
            .bind(grant_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ==================== Delegation operations ====================

    /// Insert a delegation record.
    pub async fn insert_delegation(&self, delegation: &OrgDelegation) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO org_delegations
                (delegation_id, tenant_id, delegator_id, delegate_id, scope_org_unit_id,
                 valid_from, valid_until, max_depth, revoked_utc, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(delegation.delegation_id)
        .bind(delegation.tenant_id)
        .bind(delegation.delegator_id)
        .bind(delegation.delegate_id)
        .bind(delegation.scope_org_unit_id)
        .bind(delegation.valid_from)
        .bind(delegation.valid_until)
        .bind(delegation.max_depth)
        .bind(delegation.revoked_utc)
        .bind(delegation.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark a delegation revoked. The record stays for audit.
    pub async fn revoke_delegation(&self, delegation_id: Uuid) -> Result<(), ServiceError> {
        sqlx::query("UPDATE org_delegations SET revoked_utc = now() WHERE delegation_id = $1")
            .bind(delegation_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ==================== Audit operations ====================

    /// Append one access log record.
    pub async fn insert_access_log(&self, record: &AccessLogRecord) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO access_logs
                (record_id, tenant_id, actor_id, domain_code, resource_type_code, resource_id,
                 action_code, decision_code, reason_code, matched_policy_id, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(record.record_id)
        .bind(record.tenant_id)
        .bind(record.actor_id)
        .bind(&record.domain_code)
        .bind(&record.resource_type_code)
        .bind(record.resource_id)
        .bind(&record.action_code)
        .bind(&record.decision_code)
        .bind(&record.reason_code)
        .bind(record.matched_policy_id)
        .bind(record.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Filtered, paginated read over the audit trail.
    pub async fn find_access_logs(
        &self,
        filter: &AuditQuery,
    ) -> Result<Vec<AccessLogRecord>, ServiceError> {
        let records = sqlx::query_as::<_, AccessLogRecord>(
            r#"
            SELECT * FROM access_logs
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR actor_id = $2)
              AND ($3::uuid IS NULL OR resource_id = $3)
              AND ($4::timestamptz IS NULL OR created_utc >= $4)
              AND ($5::timestamptz IS NULL OR created_utc <= $5)
            ORDER BY created_utc DESC
            LIMIT $6 OFFSET $7
            "#,
        )
        .bind(filter.tenant_id)
        .bind(filter.actor_id)
        .bind(filter.resource_id)
        .bind(filter.from_utc)
        .bind(filter.to_utc)
        .bind(filter.limit.clamp(1, 1000))
        .bind(filter.offset.max(0))
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}
