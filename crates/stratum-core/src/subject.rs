//! Subject records and temporary grants.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::time::Timestamp;
use crate::value::PermissionValue;

/// Unique identifier for a subject (user).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SubjectId(pub Uuid);

impl SubjectId {
    /// Create a new random subject identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SubjectId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A time-bound permission override held by a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporaryGrant {
    /// The permission node.
    pub node: String,
    /// Granted (`true`) or denied (`false`).
    pub value: bool,
    /// Canonical context key the grant is constrained to; empty is global.
    pub context_key: String,
    /// Absolute expiry.
    pub expires_at: Timestamp,
}

impl TemporaryGrant {
    /// Whether the grant has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_past()
    }
}

/// A subject's stored permission state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubjectRecord {
    /// Last known display name.
    pub name: String,
    /// Direct permissions.
    pub permissions: BTreeMap<String, PermissionValue>,
    /// Temporary grants; expired entries are purged lazily.
    pub temp_grants: Vec<TemporaryGrant>,
    /// Direct group memberships, ordered and deduplicated.
    pub groups: Vec<String>,
    /// Explicitly stored primary group, if any.
    pub primary: Option<String>,
    /// Free-form metadata.
    pub meta: BTreeMap<String, String>,
}

impl SubjectRecord {
    /// Create a record with the given display name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a group membership if absent. Returns whether it was added.
    pub fn add_group(&mut self, group: &str) -> bool {
        let group = group.to_lowercase();
        if self.groups.iter().any(|g| *g == group) {
            return false;
        }
        self.groups.push(group);
        true
    }

    /// Remove a group membership, clearing a matching primary pointer.
    ///
    /// Returns whether the membership was present.
    pub fn remove_group(&mut self, group: &str) -> bool {
        let group = group.to_lowercase();
        let before = self.groups.len();
        self.groups.retain(|g| *g != group);
        if self.primary.as_deref() == Some(group.as_str()) {
            self.primary = None;
        }
        self.groups.len() != before
    }

    /// Drop expired temporary grants. Returns how many were removed.
    pub fn purge_expired_grants(&mut self) -> usize {
        let before = self.temp_grants.len();
        self.temp_grants.retain(|g| !g.is_expired());
        before.saturating_sub(self.temp_grants.len())
    }

    /// Whether any unexpired temporary grant is present.
    #[must_use]
    pub fn has_active_grants(&self) -> bool {
        self.temp_grants.iter().any(|g| !g.is_expired())
    }

    /// Lowercase and deduplicate memberships and the primary pointer.
    pub fn normalize(&mut self) {
        let mut seen = BTreeSet::new();
        self.groups = std::mem::take(&mut self.groups)
            .into_iter()
            .map(|g| g.to_lowercase())
            .filter(|g| seen.insert(g.clone()))
            .collect();
        self.primary = self.primary.take().map(|p| p.to_lowercase());
    }
}
