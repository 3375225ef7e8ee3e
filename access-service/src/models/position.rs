//! Position model - a role seat within an org unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Sentinel role returned for superusers by [`primary_role_code`].
pub const SUPERUSER_ROLE: &str = "superuser";

/// Position entity. A vacant seat has no user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Position {
    pub position_id: Uuid,
    pub tenant_id: Uuid,
    pub org_unit_id: Uuid,
    pub role_code: String,
    pub user_id: Option<Uuid>,
    pub start_utc: DateTime<Utc>,
    pub end_utc: Option<DateTime<Utc>>,
}

impl Position {
    /// Create a new position starting now.
    pub fn new(
        tenant_id: Uuid,
        org_unit_id: Uuid,
        role_code: String,
        user_id: Option<Uuid>,
    ) -> Self {
        Self {
            position_id: Uuid::new_v4(),
            tenant_id,
            org_unit_id,
            role_code,
            user_id,
            start_utc: Utc::now(),
            end_utc: None,
        }
    }

    /// Check if the position is held at the given instant.
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.start_utc <= at && self.end_utc.is_none_or(|end| end > at)
    }
}

/// Derive the single display role from an ordered list of role codes.
///
/// Presentation-layer convenience only: the enforced scope always comes from
/// the full position set, never from this value. Superusers short-circuit to
/// the fixed sentinel; otherwise the first code in the list wins.
pub fn primary_role_code(role_codes: &[String]) -> String {
    if role_codes.iter().any(|r| r == SUPERUSER_ROLE) {
        return SUPERUSER_ROLE.to_string();
    }
    role_codes
        .first()
        .cloned()
        .unwrap_or_else(|| "member".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superuser_short_circuits_primary_role() {
        let codes = vec![
            "analyst".to_string(),
            SUPERUSER_ROLE.to_string(),
            "manager".to_string(),
        ];
        assert_eq!(primary_role_code(&codes), SUPERUSER_ROLE);
    }

    #[test]
    fn first_role_wins_without_superuser() {
        let codes = vec!["manager".to_string(), "analyst".to_string()];
        assert_eq!(primary_role_code(&codes), "manager");
    }

    #[test]
    fn empty_roles_fall_back_to_member() {
        assert_eq!(primary_role_code(&[]), "member");
    }

    #[test]
    fn position_active_window() {
        let mut pos = Position::new(Uuid::new_v4(), Uuid::new_v4(), "analyst".into(), None);
        let now = Utc::now();
        assert!(pos.is_active_at(now));

        pos.end_utc = Some(now - chrono::Duration::hours(1));
        assert!(!pos.is_active_at(now));
    }
}
