//! Actor model - a user or an automated agent, unified for evaluation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Actor kind codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
    User,
    Agent,
}

impl ActorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorKind::User => "user",
            ActorKind::Agent => "agent",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "agent" => ActorKind::Agent,
            _ => ActorKind::User,
        }
    }
}

/// Actor entity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Actor {
    pub actor_id: Uuid,
    pub tenant_id: Uuid,
    pub actor_kind_code: String,
    pub display_label: String,
    /// Security clearance level name; absent means least privileged.
    pub clearance_code: Option<String>,
    pub active_flag: bool,
    pub created_utc: DateTime<Utc>,
}

impl Actor {
    /// Create a new user actor.
    pub fn new_user(tenant_id: Uuid, display_label: String, clearance_code: Option<String>) -> Self {
        Self {
            actor_id: Uuid::new_v4(),
            tenant_id,
            actor_kind_code: ActorKind::User.as_str().to_string(),
            display_label,
            clearance_code,
            active_flag: true,
            created_utc: Utc::now(),
        }
    }

    /// Create a new automated-agent actor.
    pub fn new_agent(tenant_id: Uuid, display_label: String) -> Self {
        Self {
            actor_id: Uuid::new_v4(),
            tenant_id,
            actor_kind_code: ActorKind::Agent.as_str().to_string(),
            display_label,
            clearance_code: None,
            active_flag: true,
            created_utc: Utc::now(),
        }
    }

    /// Get actor kind as enum.
    pub fn kind(&self) -> ActorKind {
        ActorKind::parse(&self.actor_kind_code)
    }

    /// Check if this actor is an automated agent.
    pub fn is_agent(&self) -> bool {
        self.kind() == ActorKind::Agent
    }
}
