//! Audit logger - durable, append-only, one record per evaluation.
//!
//! The store is a trait so the Postgres-backed sink and the in-memory sink
//! used by tests share one seam. Records are never updated or deleted here;
//! retention expiry is enforced by a compliance collaborator.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::AccessLogRecord;
use crate::services::{Database, ServiceError};

/// Filter for compliance queries over the audit trail.
#[derive(Debug, Clone)]
pub struct AuditQuery {
    pub tenant_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub resource_id: Option<Uuid>,
    pub from_utc: Option<DateTime<Utc>>,
    pub to_utc: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

/// Append-only audit sink.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Durably append one record. Returning `Ok` means committed.
    async fn append(&self, record: &AccessLogRecord) -> Result<(), ServiceError>;

    /// Range/filter read for compliance review. Never mutates.
    async fn query(&self, filter: &AuditQuery) -> Result<Vec<AccessLogRecord>, ServiceError>;
}

/// Postgres-backed audit store.
#[derive(Clone)]
pub struct PgAuditStore {
    db: Database,
}

impl PgAuditStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn append(&self, record: &AccessLogRecord) -> Result<(), ServiceError> {
        self.db.insert_access_log(record).await
    }

    async fn query(&self, filter: &AuditQuery) -> Result<Vec<AccessLogRecord>, ServiceError> {
        self.db.find_access_logs(filter).await
    }
}

/// In-memory audit store for tests and local runs.
#[derive(Default)]
pub struct MemoryAuditStore {
    records: Mutex<Vec<AccessLogRecord>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record appended so far, in append order.
    pub fn records(&self) -> Vec<AccessLogRecord> {
        self.records.lock().expect("audit store lock poisoned").clone()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, record: &AccessLogRecord) -> Result<(), ServiceError> {
        self.records
            .lock()
            .map_err(|_| ServiceError::AuditUnavailable("audit store lock poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }

    async fn query(&self, filter: &AuditQuery) -> Result<Vec<AccessLogRecord>, ServiceError> {
        let records = self
            .records
            .lock()
            .map_err(|_| ServiceError::AuditUnavailable("audit store lock poisoned".to_string()))?;

        let filtered: Vec<AccessLogRecord> = records
            .iter()
            .filter(|r| r.tenant_id == filter.tenant_id)
            .filter(|r| filter.actor_id.is_none_or(|a| r.actor_id == a))
            .filter(|r| filter.resource_id.is_none_or(|res| r.resource_id == res))
            .filter(|r| filter.from_utc.is_none_or(|from| r.created_utc >= from))
            .filter(|r| filter.to_utc.is_none_or(|to| r.created_utc <= to))
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.clamp(1, 1000) as usize)
            .cloned()
            .collect();

        Ok(filtered)
    }
}

/// The audit logger every evaluation writes through.
#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn AuditStore>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Durably record a decision. A failed write fails the enclosing
    /// evaluation; an unaudited decision must never reach the caller.
    pub async fn record(&self, record: AccessLogRecord) -> Result<(), ServiceError> {
        self.store.append(&record).await.map_err(|e| {
            tracing::error!(
                record_id = %record.record_id,
                actor_id = %record.actor_id,
                error = %e,
                "Failed to write audit record"
            );
            ServiceError::AuditUnavailable(e.to_string())
        })
    }

    /// Compliance query over the trail.
    pub async fn query(&self, filter: &AuditQuery) -> Result<Vec<AccessLogRecord>, ServiceError> {
        self.store.query(filter).await
    }
}
