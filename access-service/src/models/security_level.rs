//! Security level model - ordinal document classification.

use serde::{Deserialize, Serialize};

/// A named classification level. Lower rank = more privileged: an actor
/// cleared at rank r may view documents classified at rank >= r.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityLevel {
    pub level_name: String,
    pub level_rank: i32,
}

impl SecurityLevel {
    pub fn new(level_name: impl Into<String>, level_rank: i32) -> Self {
        Self {
            level_name: level_name.into(),
            level_rank,
        }
    }
}
