//! Core data model for the Stratum permission engine.
//!
//! This crate defines the types shared by the resolution engine and the
//! storage backends: context sets and their canonical encoding, permission
//! values, group and subject records, temporary grants, and timestamps.
//! It carries no resolution logic of its own.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(clippy::all)]

mod context;
mod duration;
mod group;
mod snapshot;
mod subject;
mod time;
mod value;

pub use context::{ContextCodec, ContextSet, DEFAULT_DIMENSIONS};
pub use duration::parse_duration;
pub use group::GroupRecord;
pub use snapshot::Snapshot;
pub use subject::{SubjectId, SubjectRecord, TemporaryGrant};
pub use time::Timestamp;
pub use value::PermissionValue;

/// Reserved node prefix whose suffix names a group (`group.<name>`).
///
/// A subject node `group.admin` resolving to `true` implies membership in
/// the `admin` group, and the resolver synthesizes one such node for every
/// group in a subject's inheritance closure.
pub const GROUP_NODE_PREFIX: &str = "group.";
