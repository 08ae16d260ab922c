//! The permission store: owned state and mutation operations.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::{debug, warn};

use stratum_core::{
    ContextCodec, ContextSet, GroupRecord, PermissionValue, Snapshot, SubjectId,
    SubjectRecord, TemporaryGrant, Timestamp,
};
use stratum_storage::Storage;

use crate::cache::ResolutionCache;
use crate::config::{PrimaryGroupStrategy, Settings};
use crate::error::{EngineError, EngineResult};
use crate::registry::PermissionRegistry;

/// Owning store for groups, subjects, and tracks, plus the resolution
/// engine built on top of them.
///
/// All operations are synchronous and the store carries no internal
/// locking; a multi-threaded host wraps it in one exclusive lock and
/// serializes every call through it.
#[derive(Debug)]
pub struct PermissionStore {
    pub(crate) settings: Settings,
    pub(crate) codec: ContextCodec,
    pub(crate) groups: BTreeMap<String, GroupRecord>,
    pub(crate) subjects: BTreeMap<SubjectId, SubjectRecord>,
    pub(crate) tracks: BTreeMap<String, Vec<String>>,
    pub(crate) registry: PermissionRegistry,
    pub(crate) cache: ResolutionCache,
}

impl PermissionStore {
    /// Create an empty store. The configured default group is created
    /// immediately.
    #[must_use]
    pub fn new(mut settings: Settings) -> Self {
        settings.default_group = settings.default_group.to_lowercase();
        let codec = ContextCodec::new(settings.context_dimensions.clone());
        let mut groups = BTreeMap::new();
        groups.insert(settings.default_group.clone(), GroupRecord::new());
        Self {
            settings,
            codec,
            groups,
            subjects: BTreeMap::new(),
            tracks: BTreeMap::new(),
            registry: PermissionRegistry::new(),
            cache: ResolutionCache::new(),
        }
    }

    // ---- configuration ----------------------------------------------------

    /// Current settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Configured default group name.
    #[must_use]
    pub fn default_group(&self) -> &str {
        &self.settings.default_group
    }

    /// Switch the primary-group strategy at runtime.
    pub fn set_primary_group_strategy(&mut self, strategy: PrimaryGroupStrategy) {
        self.settings.primary_group_strategy = strategy;
    }

    /// Enable or disable deny precedence at runtime.
    pub fn set_deny_precedence(&mut self, enabled: bool) {
        if self.settings.deny_precedence != enabled {
            self.settings.deny_precedence = enabled;
            self.cache.clear();
        }
    }

    /// Register concrete permission names for wildcard expansion.
    pub fn register_permissions<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.registry.register_all(names);
        self.cache.clear();
    }

    /// The wildcard expansion registry.
    #[must_use]
    pub fn registry(&self) -> &PermissionRegistry {
        &self.registry
    }

    // ---- views ------------------------------------------------------------

    /// Immutable view of a group record.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&GroupRecord> {
        self.groups.get(&name.to_lowercase())
    }

    /// Iterate group names in sorted order.
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Immutable view of a subject record.
    #[must_use]
    pub fn subject(&self, id: &SubjectId) -> Option<&SubjectRecord> {
        self.subjects.get(id)
    }

    /// Whether a subject record exists.
    #[must_use]
    pub fn subject_exists(&self, id: &SubjectId) -> bool {
        self.subjects.contains_key(id)
    }

    /// Find a subject by last known display name, case-insensitively.
    #[must_use]
    pub fn find_subject_by_name(&self, name: &str) -> Option<SubjectId> {
        let name = name.to_lowercase();
        self.subjects
            .iter()
            .find(|(_, record)| record.name.to_lowercase() == name)
            .map(|(id, _)| *id)
    }

    /// Immutable view of a track's group order.
    #[must_use]
    pub fn track(&self, name: &str) -> Option<&[String]> {
        self.tracks.get(&name.to_lowercase()).map(Vec::as_slice)
    }

    /// Iterate track names in sorted order.
    pub fn track_names(&self) -> impl Iterator<Item = &str> {
        self.tracks.keys().map(String::as_str)
    }

    // ---- subjects ---------------------------------------------------------

    /// Create a subject record if absent, updating the stored display
    /// name either way.
    pub fn create_subject(&mut self, id: SubjectId, name: &str) {
        self.subjects
            .entry(id)
            .and_modify(|record| record.name = name.to_string())
            .or_insert_with(|| SubjectRecord::new(name));
    }

    /// Set a subject permission, globally or for a specific context.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EmptyNode`] for a blank node and
    /// [`EngineError::SubjectNotFound`] for an unknown subject.
    pub fn set_subject_permission(
        &mut self,
        id: &SubjectId,
        node: &str,
        value: bool,
        context: &ContextSet,
    ) -> EngineResult<()> {
        Self::ensure_node(node)?;
        let key = self.codec.normalize(context);
        let subject = self.subject_mut(id)?;
        set_permission(&mut subject.permissions, node, value, &key);
        self.cache.invalidate_subject(id);
        Ok(())
    }

    /// Remove a subject permission node entirely.
    ///
    /// Idempotent: a missing node is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SubjectNotFound`] for an unknown subject.
    pub fn unset_subject_permission(&mut self, id: &SubjectId, node: &str) -> EngineResult<()> {
        let subject = self.subject_mut(id)?;
        subject.permissions.remove(node);
        self.cache.invalidate_subject(id);
        Ok(())
    }

    /// Remove only the value a subject permission stores for a specific
    /// context. With the global context, only a plain global value is
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SubjectNotFound`] for an unknown subject.
    pub fn unset_subject_permission_context(
        &mut self,
        id: &SubjectId,
        node: &str,
        context: &ContextSet,
    ) -> EngineResult<()> {
        let key = self.codec.normalize(context);
        let subject = self.subject_mut(id)?;
        unset_permission_context(&mut subject.permissions, node, &key);
        self.cache.invalidate_subject(id);
        Ok(())
    }

    /// Add a temporary grant, replacing any existing grant with the same
    /// node and context.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidDuration`] for a non-positive
    /// duration, [`EngineError::EmptyNode`] for a blank node, and
    /// [`EngineError::SubjectNotFound`] for an unknown subject.
    pub fn add_temporary_grant(
        &mut self,
        id: &SubjectId,
        node: &str,
        value: bool,
        duration_secs: i64,
        context: &ContextSet,
    ) -> EngineResult<()> {
        Self::ensure_node(node)?;
        if duration_secs <= 0 {
            return Err(EngineError::InvalidDuration {
                seconds: duration_secs,
            });
        }
        let key = self.codec.normalize(context);
        let expires_at = Timestamp::now().plus_secs(duration_secs);
        let subject = self.subject_mut(id)?;
        subject
            .temp_grants
            .retain(|grant| !(grant.node == node && grant.context_key == key));
        subject.temp_grants.push(TemporaryGrant {
            node: node.to_string(),
            value,
            context_key: key,
            expires_at,
        });
        self.cache.invalidate_subject(id);
        Ok(())
    }

    /// Remove temporary grants for a node.
    ///
    /// With the global context, every grant for the node is removed;
    /// otherwise only the grant stored under the matching context key.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::GrantNotFound`] when nothing matched and
    /// [`EngineError::SubjectNotFound`] for an unknown subject.
    pub fn remove_temporary_grant(
        &mut self,
        id: &SubjectId,
        node: &str,
        context: &ContextSet,
    ) -> EngineResult<()> {
        let key = self.codec.normalize(context);
        let subject = self.subject_mut(id)?;
        let before = subject.temp_grants.len();
        subject.temp_grants.retain(|grant| {
            grant.node != node || (!key.is_empty() && grant.context_key != key)
        });
        if subject.temp_grants.len() == before {
            return Err(EngineError::GrantNotFound {
                node: node.to_string(),
            });
        }
        self.cache.invalidate_subject(id);
        Ok(())
    }

    /// Add a subject to a group.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::GroupNotFound`] for an unknown group and
    /// [`EngineError::SubjectNotFound`] for an unknown subject.
    pub fn add_group_membership(&mut self, id: &SubjectId, group: &str) -> EngineResult<()> {
        let group = group.to_lowercase();
        if !self.groups.contains_key(&group) {
            return Err(EngineError::GroupNotFound { name: group });
        }
        let subject = self.subject_mut(id)?;
        subject.add_group(&group);
        self.cache.invalidate_subject(id);
        Ok(())
    }

    /// Remove a subject from a group, clearing a matching primary pointer.
    ///
    /// Idempotent: a missing membership is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SubjectNotFound`] for an unknown subject.
    pub fn remove_group_membership(&mut self, id: &SubjectId, group: &str) -> EngineResult<()> {
        let subject = self.subject_mut(id)?;
        subject.remove_group(group);
        self.cache.invalidate_subject(id);
        Ok(())
    }

    /// Set the stored primary group, adding the membership if missing.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::GroupNotFound`] for an unknown group and
    /// [`EngineError::SubjectNotFound`] for an unknown subject.
    pub fn set_primary_group(&mut self, id: &SubjectId, group: &str) -> EngineResult<()> {
        let group = group.to_lowercase();
        if !self.groups.contains_key(&group) {
            return Err(EngineError::GroupNotFound { name: group });
        }
        let subject = self.subject_mut(id)?;
        subject.add_group(&group);
        subject.primary = Some(group);
        self.cache.invalidate_subject(id);
        Ok(())
    }

    /// Clear the stored primary group pointer.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SubjectNotFound`] for an unknown subject.
    pub fn unset_primary_group(&mut self, id: &SubjectId) -> EngineResult<()> {
        let subject = self.subject_mut(id)?;
        subject.primary = None;
        Ok(())
    }

    /// Set a subject metadata entry.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SubjectNotFound`] for an unknown subject.
    pub fn set_subject_meta(
        &mut self,
        id: &SubjectId,
        key: &str,
        value: &str,
    ) -> EngineResult<()> {
        let subject = self.subject_mut(id)?;
        subject.meta.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Remove a subject metadata entry.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SubjectNotFound`] for an unknown subject.
    pub fn unset_subject_meta(&mut self, id: &SubjectId, key: &str) -> EngineResult<()> {
        let subject = self.subject_mut(id)?;
        subject.meta.remove(key);
        Ok(())
    }

    // ---- groups -----------------------------------------------------------

    /// Create a group.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidName`] for a blank name and
    /// [`EngineError::GroupExists`] on collision.
    pub fn create_group(&mut self, name: &str) -> EngineResult<()> {
        let name = Self::canonical_name(name)?;
        if self.groups.contains_key(&name) {
            return Err(EngineError::GroupExists { name });
        }
        self.groups.insert(name, GroupRecord::new());
        Ok(())
    }

    /// Delete a group, cascading through memberships, primary pointers,
    /// parent lists, and tracks.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::GroupNotFound`] for an unknown group.
    pub fn delete_group(&mut self, name: &str) -> EngineResult<()> {
        let name = name.to_lowercase();
        if self.groups.remove(&name).is_none() {
            return Err(EngineError::GroupNotFound { name });
        }
        for subject in self.subjects.values_mut() {
            subject.remove_group(&name);
        }
        for group in self.groups.values_mut() {
            group.remove_parent(&name);
        }
        for order in self.tracks.values_mut() {
            order.retain(|g| *g != name);
        }
        debug!(group = %name, "deleted group and cascaded references");
        self.cache.clear();
        Ok(())
    }

    /// Rename a group, rewriting every reference to it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::GroupNotFound`] for an unknown source,
    /// [`EngineError::GroupExists`] on target collision, and
    /// [`EngineError::InvalidName`] for a blank target.
    pub fn rename_group(&mut self, old: &str, new: &str) -> EngineResult<()> {
        let old = old.to_lowercase();
        let new = Self::canonical_name(new)?;
        if old == new {
            return Ok(());
        }
        if self.groups.contains_key(&new) {
            return Err(EngineError::GroupExists { name: new });
        }
        let Some(record) = self.groups.remove(&old) else {
            return Err(EngineError::GroupNotFound { name: old });
        };
        self.groups.insert(new.clone(), record);
        for subject in self.subjects.values_mut() {
            for group in &mut subject.groups {
                if *group == old {
                    new.clone_into(group);
                }
            }
            if subject.primary.as_deref() == Some(old.as_str()) {
                subject.primary = Some(new.clone());
            }
        }
        for group in self.groups.values_mut() {
            for parent in &mut group.parents {
                if *parent == old {
                    new.clone_into(parent);
                }
            }
        }
        for order in self.tracks.values_mut() {
            for group in order.iter_mut() {
                if *group == old {
                    new.clone_into(group);
                }
            }
        }
        debug!(from = %old, to = %new, "renamed group");
        self.cache.clear();
        Ok(())
    }

    /// Copy a group's record under a new name. References to the source
    /// (memberships, parents, tracks) are not copied.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::GroupNotFound`] for an unknown source,
    /// [`EngineError::GroupExists`] on target collision, and
    /// [`EngineError::InvalidName`] for a blank target.
    pub fn clone_group(&mut self, source: &str, target: &str) -> EngineResult<()> {
        let source = source.to_lowercase();
        let target = Self::canonical_name(target)?;
        if self.groups.contains_key(&target) {
            return Err(EngineError::GroupExists { name: target });
        }
        let Some(record) = self.groups.get(&source).cloned() else {
            return Err(EngineError::GroupNotFound { name: source });
        };
        self.groups.insert(target, record);
        Ok(())
    }

    /// Set a group permission, globally or for a specific context.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EmptyNode`] for a blank node and
    /// [`EngineError::GroupNotFound`] for an unknown group.
    pub fn set_group_permission(
        &mut self,
        group: &str,
        node: &str,
        value: bool,
        context: &ContextSet,
    ) -> EngineResult<()> {
        Self::ensure_node(node)?;
        let key = self.codec.normalize(context);
        let record = self.group_mut(group)?;
        set_permission(&mut record.permissions, node, value, &key);
        self.cache.clear();
        Ok(())
    }

    /// Remove a group permission node entirely.
    ///
    /// Idempotent: a missing node is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::GroupNotFound`] for an unknown group.
    pub fn unset_group_permission(&mut self, group: &str, node: &str) -> EngineResult<()> {
        let record = self.group_mut(group)?;
        record.permissions.remove(node);
        self.cache.clear();
        Ok(())
    }

    /// Remove only the value a group permission stores for a specific
    /// context. With the global context, only a plain global value is
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::GroupNotFound`] for an unknown group.
    pub fn unset_group_permission_context(
        &mut self,
        group: &str,
        node: &str,
        context: &ContextSet,
    ) -> EngineResult<()> {
        let key = self.codec.normalize(context);
        let record = self.group_mut(group)?;
        unset_permission_context(&mut record.permissions, node, &key);
        self.cache.clear();
        Ok(())
    }

    /// Add a parent group edge. Duplicates are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::GroupNotFound`] when either group is
    /// unknown.
    pub fn add_parent(&mut self, group: &str, parent: &str) -> EngineResult<()> {
        let parent = parent.to_lowercase();
        if !self.groups.contains_key(&parent) {
            return Err(EngineError::GroupNotFound { name: parent });
        }
        let record = self.group_mut(group)?;
        record.add_parent(&parent);
        self.cache.clear();
        Ok(())
    }

    /// Remove a parent group edge.
    ///
    /// Idempotent: a missing edge is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::GroupNotFound`] for an unknown group.
    pub fn remove_parent(&mut self, group: &str, parent: &str) -> EngineResult<()> {
        let record = self.group_mut(group)?;
        record.remove_parent(parent);
        self.cache.clear();
        Ok(())
    }

    /// Set a group's weight.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::GroupNotFound`] for an unknown group.
    pub fn set_group_weight(&mut self, group: &str, weight: i64) -> EngineResult<()> {
        let record = self.group_mut(group)?;
        record.weight = weight;
        Ok(())
    }

    /// Set a group metadata entry.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::GroupNotFound`] for an unknown group.
    pub fn set_group_meta(&mut self, group: &str, key: &str, value: &str) -> EngineResult<()> {
        let record = self.group_mut(group)?;
        record.meta.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Remove a group metadata entry.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::GroupNotFound`] for an unknown group.
    pub fn unset_group_meta(&mut self, group: &str, key: &str) -> EngineResult<()> {
        let record = self.group_mut(group)?;
        record.meta.remove(key);
        Ok(())
    }

    // ---- traversal --------------------------------------------------------

    /// Compute inheritance order for the given seed groups: post-order
    /// depth-first, parents before the group itself, every group exactly
    /// once. Cycles terminate through the visited set; dangling
    /// references are skipped.
    #[must_use]
    pub fn traverse<I, S>(&self, seeds: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        for seed in seeds {
            self.traverse_into(seed.as_ref(), &mut visited, &mut order);
        }
        order
    }

    pub(crate) fn traverse_into(
        &self,
        seed: &str,
        visited: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) {
        // Iterative DFS; the second stack entry for a group emits it after
        // its parents.
        let mut stack = vec![(seed.to_lowercase(), false)];
        while let Some((name, parents_done)) = stack.pop() {
            if parents_done {
                order.push(name);
                continue;
            }
            if visited.contains(&name) {
                continue;
            }
            let Some(group) = self.groups.get(&name) else {
                continue;
            };
            let parents = group.parents.clone();
            visited.insert(name.clone());
            stack.push((name, true));
            for parent in parents.iter().rev() {
                if !visited.contains(parent) {
                    stack.push((parent.clone(), false));
                }
            }
        }
    }

    // ---- persistence ------------------------------------------------------

    /// Replace in-memory state from a storage collaborator.
    ///
    /// See [`Self::apply_snapshot`] for the normalization performed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] when the collaborator fails.
    pub fn load(&mut self, storage: &mut dyn Storage) -> EngineResult<()> {
        let snapshot = storage.load()?;
        self.apply_snapshot(snapshot);
        Ok(())
    }

    /// Hand the current state to a storage collaborator.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] when the collaborator fails.
    pub fn save(&self, storage: &mut dyn Storage) -> EngineResult<()> {
        storage.save(&self.snapshot())?;
        Ok(())
    }

    /// A copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            subjects: self.subjects.clone(),
            groups: self.groups.clone(),
            tracks: self.tracks.clone(),
        }
    }

    /// Install a snapshot, replacing all state.
    ///
    /// Normalization: names and references are lowercased, parent and
    /// membership lists deduplicated, track members referencing missing
    /// groups dropped, expired temporary grants purged, and the
    /// configured default group auto-created if absent. The resolution
    /// cache is cleared.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
        self.groups = snapshot
            .groups
            .into_iter()
            .map(|(name, mut record)| {
                record.normalize();
                (name.to_lowercase(), record)
            })
            .collect();

        self.subjects = snapshot.subjects;
        for subject in self.subjects.values_mut() {
            subject.normalize();
            let purged = subject.purge_expired_grants();
            if purged > 0 {
                debug!(count = purged, subject = %subject.name, "purged expired grants at load");
            }
        }

        let mut tracks = BTreeMap::new();
        for (name, order) in snapshot.tracks {
            let name = name.to_lowercase();
            let mut seen = BTreeSet::new();
            let mut kept = Vec::new();
            for group in order {
                let group = group.to_lowercase();
                if !self.groups.contains_key(&group) {
                    warn!(track = %name, group = %group, "dropping unknown group from track");
                    continue;
                }
                if seen.insert(group.clone()) {
                    kept.push(group);
                }
            }
            tracks.insert(name, kept);
        }
        self.tracks = tracks;

        if !self.groups.contains_key(&self.settings.default_group) {
            debug!(group = %self.settings.default_group, "auto-creating default group");
            self.groups
                .insert(self.settings.default_group.clone(), GroupRecord::new());
        }
        self.cache.clear();
    }

    // ---- internals --------------------------------------------------------

    pub(crate) fn subject_mut(&mut self, id: &SubjectId) -> EngineResult<&mut SubjectRecord> {
        self.subjects
            .get_mut(id)
            .ok_or_else(|| EngineError::SubjectNotFound { id: id.to_string() })
    }

    pub(crate) fn group_mut(&mut self, name: &str) -> EngineResult<&mut GroupRecord> {
        let name = name.to_lowercase();
        self.groups
            .get_mut(&name)
            .ok_or(EngineError::GroupNotFound { name })
    }

    pub(crate) fn ensure_node(node: &str) -> EngineResult<()> {
        if node.trim().is_empty() {
            return Err(EngineError::EmptyNode);
        }
        Ok(())
    }

    pub(crate) fn canonical_name(name: &str) -> EngineResult<String> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Err(EngineError::InvalidName { name });
        }
        Ok(name)
    }
}

/// Write a value into a permission map under a canonical context key.
fn set_permission(
    map: &mut BTreeMap<String, PermissionValue>,
    node: &str,
    value: bool,
    key: &str,
) {
    if key.is_empty() {
        map.insert(node.to_string(), PermissionValue::Global(value));
        return;
    }
    map.entry(node.to_string())
        .and_modify(|existing| existing.set_context(key, value))
        .or_insert_with(|| PermissionValue::Contextual {
            entries: vec![(key.to_string(), value)],
            fallback: None,
        });
}

/// Remove the value a permission map stores for a canonical context key,
/// dropping the node when nothing remains.
fn unset_permission_context(
    map: &mut BTreeMap<String, PermissionValue>,
    node: &str,
    key: &str,
) {
    let Some(value) = map.get_mut(node) else {
        return;
    };
    if key.is_empty() {
        if matches!(value, PermissionValue::Global(_)) {
            map.remove(node);
        }
        return;
    }
    if value.unset_context(key) {
        map.remove(node);
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
