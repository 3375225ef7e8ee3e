//! Security level hierarchy - the single source of truth for clearance checks.
//!
//! Built once from configuration at startup. Unknown level names are a
//! configuration error raised at load time, never during an evaluation.

use std::collections::HashMap;

use crate::models::SecurityLevel;
use crate::services::ServiceError;

/// Total order over classification levels. Lower rank = more privileged.
#[derive(Debug, Clone)]
pub struct SecurityLevelHierarchy {
    ranks: HashMap<String, i32>,
    least_privileged_rank: i32,
}

impl SecurityLevelHierarchy {
    /// Build the hierarchy from the configured level ladder.
    ///
    /// Duplicate ranks would make comparisons ambiguous and are rejected.
    pub fn from_levels(levels: &[SecurityLevel]) -> Result<Self, ServiceError> {
        if levels.is_empty() {
            return Err(ServiceError::Validation(
                "at least one security level must be configured".to_string(),
            ));
        }

        let mut ranks = HashMap::with_capacity(levels.len());
        let mut seen_ranks = std::collections::HashSet::new();
        for level in levels {
            if !seen_ranks.insert(level.level_rank) {
                return Err(ServiceError::AmbiguousSecurityRank(level.level_rank));
            }
            if ranks.insert(level.level_name.clone(), level.level_rank).is_some() {
                return Err(ServiceError::Validation(format!(
                    "security level '{}' is defined twice",
                    level.level_name
                )));
            }
        }

        let least_privileged_rank = levels
            .iter()
            .map(|l| l.level_rank)
            .max()
            .expect("levels is non-empty");

        Ok(Self {
            ranks,
            least_privileged_rank,
        })
    }

    /// Resolve a level name to its rank. Unknown names are a configuration
    /// error on whatever catalog data carried them.
    pub fn rank_of(&self, level_name: &str) -> Result<i32, ServiceError> {
        self.ranks
            .get(level_name)
            .copied()
            .ok_or_else(|| ServiceError::UnknownSecurityLevel(level_name.to_string()))
    }

    /// Rank assigned to actors with no clearance at all.
    pub fn least_privileged_rank(&self) -> i32 {
        self.least_privileged_rank
    }

    /// True iff an actor cleared at `clearance_rank` may view material
    /// classified at `required_rank`.
    pub fn level_satisfies(clearance_rank: i32, required_rank: i32) -> bool {
        clearance_rank <= required_rank
    }
}
