//! Ordered group tracks and promote/demote stepping.

use std::collections::BTreeSet;

use tracing::debug;

use stratum_core::SubjectId;

use crate::error::{EngineError, EngineResult};
use crate::store::PermissionStore;

impl PermissionStore {
    /// Create an empty track.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidName`] for a blank name and
    /// [`EngineError::TrackExists`] on collision.
    pub fn create_track(&mut self, name: &str) -> EngineResult<()> {
        let name = Self::canonical_name(name)?;
        if self.tracks.contains_key(&name) {
            return Err(EngineError::TrackExists { name });
        }
        self.tracks.insert(name, Vec::new());
        Ok(())
    }

    /// Delete a track. Groups on it are unaffected.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TrackNotFound`] for an unknown track.
    pub fn delete_track(&mut self, name: &str) -> EngineResult<()> {
        let name = name.to_lowercase();
        if self.tracks.remove(&name).is_none() {
            return Err(EngineError::TrackNotFound { name });
        }
        Ok(())
    }

    /// Create or replace a track's group order. Every group must exist;
    /// duplicates are dropped, keeping first positions.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidName`] for a blank track name and
    /// [`EngineError::GroupNotFound`] for an unknown member group.
    pub fn set_track(&mut self, name: &str, groups: &[String]) -> EngineResult<()> {
        let name = Self::canonical_name(name)?;
        let mut seen = BTreeSet::new();
        let mut order = Vec::new();
        for group in groups {
            let group = group.to_lowercase();
            if !self.groups.contains_key(&group) {
                return Err(EngineError::GroupNotFound { name: group });
            }
            if seen.insert(group.clone()) {
                order.push(group);
            }
        }
        self.tracks.insert(name, order);
        Ok(())
    }

    /// Rename a track.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TrackNotFound`] for an unknown source,
    /// [`EngineError::TrackExists`] on target collision, and
    /// [`EngineError::InvalidName`] for a blank target.
    pub fn rename_track(&mut self, old: &str, new: &str) -> EngineResult<()> {
        let old = old.to_lowercase();
        let new = Self::canonical_name(new)?;
        if old == new {
            return Ok(());
        }
        if self.tracks.contains_key(&new) {
            return Err(EngineError::TrackExists { name: new });
        }
        let Some(order) = self.tracks.remove(&old) else {
            return Err(EngineError::TrackNotFound { name: old });
        };
        self.tracks.insert(new, order);
        Ok(())
    }

    /// Copy a track's order under a new name.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TrackNotFound`] for an unknown source,
    /// [`EngineError::TrackExists`] on target collision, and
    /// [`EngineError::InvalidName`] for a blank target.
    pub fn clone_track(&mut self, source: &str, target: &str) -> EngineResult<()> {
        let source = source.to_lowercase();
        let target = Self::canonical_name(target)?;
        if self.tracks.contains_key(&target) {
            return Err(EngineError::TrackExists { name: target });
        }
        let Some(order) = self.tracks.get(&source).cloned() else {
            return Err(EngineError::TrackNotFound { name: source });
        };
        self.tracks.insert(target, order);
        Ok(())
    }

    /// Insert a group into a track at a 1-based position, clamped to the
    /// valid range.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::GroupNotFound`] or
    /// [`EngineError::TrackNotFound`] for unknown names and
    /// [`EngineError::AlreadyInTrack`] when the group is present.
    pub fn insert_track_group(
        &mut self,
        track: &str,
        group: &str,
        position: usize,
    ) -> EngineResult<()> {
        let track = track.to_lowercase();
        let group = group.to_lowercase();
        if !self.groups.contains_key(&group) {
            return Err(EngineError::GroupNotFound { name: group });
        }
        let Some(order) = self.tracks.get_mut(&track) else {
            return Err(EngineError::TrackNotFound { name: track });
        };
        if order.contains(&group) {
            return Err(EngineError::AlreadyInTrack { track, group });
        }
        let index = position
            .max(1)
            .min(order.len().saturating_add(1))
            .saturating_sub(1);
        order.insert(index, group);
        Ok(())
    }

    /// Append a group to the end of a track.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::GroupNotFound`] or
    /// [`EngineError::TrackNotFound`] for unknown names and
    /// [`EngineError::AlreadyInTrack`] when the group is present.
    pub fn append_track_group(&mut self, track: &str, group: &str) -> EngineResult<()> {
        let position = self
            .tracks
            .get(&track.to_lowercase())
            .map_or(usize::MAX, |order| order.len().saturating_add(1));
        self.insert_track_group(track, group, position)
    }

    /// Remove a group from a track.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TrackNotFound`] for an unknown track and
    /// [`EngineError::NotInTrack`] when the group is absent.
    pub fn remove_track_group(&mut self, track: &str, group: &str) -> EngineResult<()> {
        let track = track.to_lowercase();
        let group = group.to_lowercase();
        let Some(order) = self.tracks.get_mut(&track) else {
            return Err(EngineError::TrackNotFound { name: track });
        };
        let Some(index) = order.iter().position(|g| *g == group) else {
            return Err(EngineError::NotInTrack { track, group });
        };
        order.remove(index);
        Ok(())
    }

    /// Current derived position of a subject on a track: the highest
    /// index among track groups the subject is a direct member of, or
    /// `None` when off the track.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TrackNotFound`] or
    /// [`EngineError::SubjectNotFound`] for unknown names.
    pub fn track_position(&self, id: &SubjectId, track: &str) -> EngineResult<Option<usize>> {
        let track = track.to_lowercase();
        let Some(order) = self.tracks.get(&track) else {
            return Err(EngineError::TrackNotFound { name: track });
        };
        let Some(subject) = self.subjects.get(id) else {
            return Err(EngineError::SubjectNotFound { id: id.to_string() });
        };
        Ok(order
            .iter()
            .enumerate()
            .filter(|(_, group)| subject.groups.contains(*group))
            .map(|(index, _)| index)
            .max())
    }

    /// Move a subject one step up the track. The destination becomes the
    /// subject's stored primary group (membership included); existing
    /// memberships are kept. A subject off the track enters at the first
    /// group. Returns the group promoted into.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AtTopOfTrack`] when no next group exists,
    /// plus the lookup errors of [`Self::track_position`].
    pub fn promote(&mut self, id: &SubjectId, track: &str) -> EngineResult<String> {
        let track = track.to_lowercase();
        let position = self.track_position(id, &track)?;
        let next_index = position.map_or(0, |p| p.saturating_add(1));
        let Some(next) = self
            .tracks
            .get(&track)
            .and_then(|order| order.get(next_index))
            .cloned()
        else {
            return Err(EngineError::AtTopOfTrack { track });
        };
        self.set_primary_group(id, &next)?;
        debug!(subject = %id, track = %track, group = %next, "promoted");
        Ok(next)
    }

    /// Move a subject one step down the track. The destination becomes
    /// the subject's stored primary group (membership included). Returns
    /// the group demoted into.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AtBottomOfTrack`] when the subject is off
    /// the track or at its first group, plus the lookup errors of
    /// [`Self::track_position`].
    pub fn demote(&mut self, id: &SubjectId, track: &str) -> EngineResult<String> {
        let track = track.to_lowercase();
        let position = self.track_position(id, &track)?;
        let previous = match position {
            None | Some(0) => None,
            Some(p) => self
                .tracks
                .get(&track)
                .and_then(|order| order.get(p.saturating_sub(1)))
                .cloned(),
        };
        let Some(previous) = previous else {
            return Err(EngineError::AtBottomOfTrack { track });
        };
        self.set_primary_group(id, &previous)?;
        debug!(subject = %id, track = %track, group = %previous, "demoted");
        Ok(previous)
    }
}

#[cfg(test)]
#[path = "tracks_tests.rs"]
mod tests;
