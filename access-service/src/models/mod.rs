//! Domain models for the access resolver.

mod access_log;
mod access_policy;
mod actor;
mod contract_visibility;
mod delegation;
mod kb_grant;
mod org_unit;
mod position;
mod security_level;
mod tenant;

pub use access_log::{AccessLogRecord, Decision, DenyReason};
pub use access_policy::{AccessDomain, AccessPolicy, PolicyEffect, PolicyScope};
pub use actor::{Actor, ActorKind};
pub use contract_visibility::{ContractGrant, ContractVisibility};
pub use delegation::OrgDelegation;
pub use kb_grant::{KbGrant, KbGrantee, KnowledgeBase};
pub use org_unit::OrgUnit;
pub use position::{Position, SUPERUSER_ROLE, primary_role_code};
pub use security_level::SecurityLevel;
pub use tenant::{Tenant, TenantState};
