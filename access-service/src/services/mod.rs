//! Services layer for the access resolver.
//!
//! The evaluation core (security levels, org index, delegation, policy
//! snapshots, resolver, audit) plus persistence and metrics.

mod audit;
mod database;
mod delegation;
pub mod error;
pub mod metrics;
mod org_index;
pub mod policy_store;
pub mod resolver;
mod security_levels;

pub use audit::{AuditLogger, AuditQuery, AuditStore, MemoryAuditStore, PgAuditStore};
pub use database::Database;
pub use delegation::{DelegationResolver, EffectiveScopes};
pub use error::ServiceError;
pub use org_index::OrgScopeIndex;
pub use policy_store::{Catalog, PolicyStore, Snapshot};
pub use resolver::{AccessRequest, AccessResolver, ResolvedDecision};
pub use security_levels::SecurityLevelHierarchy;
