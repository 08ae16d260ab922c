//! The unit of state exchanged with storage collaborators.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::group::GroupRecord;
use crate::subject::{SubjectId, SubjectRecord};

/// Full store state: subjects, groups, and tracks.
///
/// Storage backends load and save whole snapshots; the engine normalizes
/// them on installation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    /// Subject records keyed by identifier.
    pub subjects: BTreeMap<SubjectId, SubjectRecord>,
    /// Group records keyed by canonical lowercase name.
    pub groups: BTreeMap<String, GroupRecord>,
    /// Track group orderings keyed by track name.
    pub tracks: BTreeMap<String, Vec<String>>,
}
