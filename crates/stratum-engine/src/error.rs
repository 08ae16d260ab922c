//! Engine error types.

use thiserror::Error;

/// Errors returned by store mutations and resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    // Not found
    /// Referenced subject does not exist.
    #[error("subject not found: {id}")]
    SubjectNotFound {
        /// The subject identifier.
        id: String,
    },

    /// Referenced group does not exist.
    #[error("group not found: {name}")]
    GroupNotFound {
        /// The group name.
        name: String,
    },

    /// Referenced track does not exist.
    #[error("track not found: {name}")]
    TrackNotFound {
        /// The track name.
        name: String,
    },

    /// No temporary grant matched the given node and context.
    #[error("no temporary grant for node: {node}")]
    GrantNotFound {
        /// The permission node.
        node: String,
    },

    // Conflicts
    /// A group with the target name already exists.
    #[error("group already exists: {name}")]
    GroupExists {
        /// The conflicting name.
        name: String,
    },

    /// A track with the target name already exists.
    #[error("track already exists: {name}")]
    TrackExists {
        /// The conflicting name.
        name: String,
    },

    /// The group is already part of the track.
    #[error("track {track} already contains group {group}")]
    AlreadyInTrack {
        /// The track name.
        track: String,
        /// The group name.
        group: String,
    },

    // Invalid input
    /// Temporary grant durations must be positive.
    #[error("invalid duration: {seconds}s")]
    InvalidDuration {
        /// The rejected duration in seconds.
        seconds: i64,
    },

    /// Permission nodes must be non-empty.
    #[error("empty permission node")]
    EmptyNode,

    /// Group and track names must be non-empty.
    #[error("invalid name: {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    // No-op steps
    /// The subject is already at the top of the track.
    #[error("already at top of track: {track}")]
    AtTopOfTrack {
        /// The track name.
        track: String,
    },

    /// The subject is at (or below) the bottom of the track.
    #[error("already at bottom of track: {track}")]
    AtBottomOfTrack {
        /// The track name.
        track: String,
    },

    /// The group is not part of the track.
    #[error("track {track} does not contain group {group}")]
    NotInTrack {
        /// The track name.
        track: String,
        /// The group name.
        group: String,
    },

    // Storage
    /// A storage collaborator failed during load or save.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<stratum_storage::StorageError> for EngineError {
    fn from(err: stratum_storage::StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
