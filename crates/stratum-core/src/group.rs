//! Group records.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::value::PermissionValue;

/// A named permission group.
///
/// Records are keyed by canonical lowercase name in their owning map and
/// do not repeat the name. Parent references are held by name; dangling
/// references are tolerated and skipped during traversal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupRecord {
    /// Permissions granted or denied by this group.
    pub permissions: BTreeMap<String, PermissionValue>,
    /// Parent group names, ordered and deduplicated.
    pub parents: Vec<String>,
    /// Weight used for primary-group selection; heavier wins.
    pub weight: i64,
    /// Free-form metadata (prefix, suffix, ...).
    pub meta: BTreeMap<String, String>,
}

impl GroupRecord {
    /// Create an empty group record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parent if not already present. Returns whether it was added.
    pub fn add_parent(&mut self, parent: &str) -> bool {
        let parent = parent.to_lowercase();
        if self.parents.iter().any(|p| *p == parent) {
            return false;
        }
        self.parents.push(parent);
        true
    }

    /// Remove a parent. Returns whether it was present.
    pub fn remove_parent(&mut self, parent: &str) -> bool {
        let parent = parent.to_lowercase();
        let before = self.parents.len();
        self.parents.retain(|p| *p != parent);
        self.parents.len() != before
    }

    /// Lowercase and deduplicate the parent list, keeping first positions.
    pub fn normalize(&mut self) {
        let mut seen = BTreeSet::new();
        self.parents = std::mem::take(&mut self.parents)
            .into_iter()
            .map(|p| p.to_lowercase())
            .filter(|p| seen.insert(p.clone()))
            .collect();
    }
}
