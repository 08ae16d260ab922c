//! Engine settings.

use serde::{Deserialize, Serialize};
use stratum_core::DEFAULT_DIMENSIONS;

/// Strategy for computing a subject's primary group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrimaryGroupStrategy {
    /// Use the explicitly stored primary pointer, if any.
    Stored,
    /// Highest weight among direct memberships.
    #[default]
    DirectByWeight,
    /// Highest weight among the full inheritance closure.
    InheritedByWeight,
}

/// Store-wide configuration, fixed at construction except where a setter
/// exists on the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    /// Group auto-created at load; hosts typically assign it to new
    /// subjects on first contact.
    pub default_group: String,
    /// When enabled, any deny among the most-specific candidates for a
    /// node wins. When disabled, the last candidate in evaluation order
    /// wins.
    pub deny_precedence: bool,
    /// Primary group computation strategy.
    pub primary_group_strategy: PrimaryGroupStrategy,
    /// Context dimensions recognized when normalizing context keys.
    pub context_dimensions: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_group: "default".to_string(),
            deny_precedence: true,
            primary_group_strategy: PrimaryGroupStrategy::default(),
            context_dimensions: DEFAULT_DIMENSIONS
                .iter()
                .map(|d| (*d).to_string())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.default_group, "default");
        assert!(settings.deny_precedence);
        assert_eq!(
            settings.primary_group_strategy,
            PrimaryGroupStrategy::DirectByWeight
        );
        assert_eq!(settings.context_dimensions, vec!["world", "gamemode"]);
    }

    #[test]
    fn test_strategy_serde_names() {
        let json = serde_json::to_string(&PrimaryGroupStrategy::InheritedByWeight).unwrap();
        assert_eq!(json, "\"inherited-by-weight\"");
        let parsed: PrimaryGroupStrategy = serde_json::from_str("\"stored\"").unwrap();
        assert_eq!(parsed, PrimaryGroupStrategy::Stored);
    }
}
