//! Organization unit model - node in the per-tenant org forest.
//!
//! Ancestry is materialized on each unit as a slash-joined id path, so
//! subtree containment is a prefix question rather than a graph walk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Org unit entity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrgUnit {
    pub org_unit_id: Uuid,
    pub tenant_id: Uuid,
    pub parent_org_unit_id: Option<Uuid>,
    pub unit_type_code: String,
    pub unit_label: String,
    /// Materialized ancestor chain, root first, self last: "/a/b/c".
    pub path: String,
    pub active_flag: bool,
    pub created_utc: DateTime<Utc>,
}

impl OrgUnit {
    /// Create a root unit for a tenant.
    pub fn new_root(tenant_id: Uuid, unit_type_code: String, unit_label: String) -> Self {
        let org_unit_id = Uuid::new_v4();
        Self {
            org_unit_id,
            tenant_id,
            parent_org_unit_id: None,
            unit_type_code,
            unit_label,
            path: format!("/{}", org_unit_id),
            active_flag: true,
            created_utc: Utc::now(),
        }
    }

    /// Create a child of an existing unit; the path extends the parent's.
    pub fn new_child(parent: &OrgUnit, unit_type_code: String, unit_label: String) -> Self {
        let org_unit_id = Uuid::new_v4();
        Self {
            org_unit_id,
            tenant_id: parent.tenant_id,
            parent_org_unit_id: Some(parent.org_unit_id),
            unit_type_code,
            unit_label,
            path: format!("{}/{}", parent.path, org_unit_id),
            active_flag: true,
            created_utc: Utc::now(),
        }
    }

    /// Check if this is a root unit.
    pub fn is_root(&self) -> bool {
        self.parent_org_unit_id.is_none()
    }

    /// Parse the materialized path into ancestor ids, root first, self last.
    ///
    /// Malformed segments yield `None` so a corrupt path surfaces as a
    /// load-time error instead of silently shrinking the ancestor set.
    pub fn ancestor_ids(&self) -> Option<Vec<Uuid>> {
        self.path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| Uuid::parse_str(s).ok())
            .collect()
    }
}
