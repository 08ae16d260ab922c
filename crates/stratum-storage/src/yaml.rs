//! YAML file storage: one file per group, track, and user.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use stratum_core::{
    GroupRecord, PermissionValue, Snapshot, SubjectId, SubjectRecord, TemporaryGrant,
    Timestamp,
};

use crate::{Storage, StorageError, StorageResult};

/// Storage backend writing YAML files under a base directory:
/// `groups/<name>.yml`, `tracks/<name>.yml`, and `users/<uuid>.yml`.
///
/// Temporary grants are written with the seconds *remaining* at save time
/// and converted back to absolute expiries on load, so stored data stays
/// meaningful across host downtime. Expired grants are dropped on both
/// paths. Files for entities no longer present in the snapshot are
/// deleted on save; unreadable files are skipped with a warning on load.
#[derive(Debug)]
pub struct YamlStorage {
    base: PathBuf,
}

const EXT: &str = "yml";

/// On-disk shape of a track file.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct TrackFile {
    groups: Vec<String>,
}

/// On-disk shape of a user file.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct UserFile {
    name: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    permissions: BTreeMap<String, PermissionValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    temp_permissions: Vec<TempEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    groups: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    primary: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    meta: BTreeMap<String, String>,
}

/// On-disk shape of a temporary grant.
///
/// New files carry `remaining` seconds; `expires` holds a legacy absolute
/// unix expiry and is still accepted on load.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct TempEntry {
    node: String,
    value: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires: Option<i64>,
}

impl TempEntry {
    fn from_grant(grant: &TemporaryGrant) -> Self {
        Self {
            node: grant.node.clone(),
            value: grant.value,
            context: grant.context_key.clone(),
            remaining: Some(grant.expires_at.remaining_secs()),
            expires: None,
        }
    }

    fn into_grant(self) -> Option<TemporaryGrant> {
        if self.node.is_empty() {
            return None;
        }
        let expires_at = match (self.remaining, self.expires) {
            (Some(remaining), _) => Timestamp::now().plus_secs(remaining),
            (None, Some(expires)) => Timestamp::from_unix(expires),
            (None, None) => return None,
        };
        if expires_at.is_past() {
            return None;
        }
        Some(TemporaryGrant {
            node: self.node,
            value: self.value,
            context_key: self.context,
            expires_at,
        })
    }
}

impl YamlStorage {
    /// Create a backend rooted at `base`. Directories are created lazily
    /// on save.
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn dir(&self, kind: &str) -> PathBuf {
        self.base.join(kind)
    }

    fn read_file<T: for<'de> Deserialize<'de>>(path: &Path) -> StorageResult<T> {
        let raw = fs::read_to_string(path).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| StorageError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write_file<T: Serialize>(path: &Path, value: &T) -> StorageResult<()> {
        let raw = serde_yaml::to_string(value).map_err(|source| StorageError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, raw).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Yield `(stem, path)` for every YAML file in a directory. A missing
    /// directory yields nothing.
    fn yaml_files(dir: &Path) -> StorageResult<Vec<(String, PathBuf)>> {
        let mut files = Vec::new();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(source) => {
                return Err(StorageError::Io {
                    path: dir.to_path_buf(),
                    source,
                });
            }
        };
        for entry in entries {
            let entry = entry.map_err(|source| StorageError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            files.push((stem.to_string(), path));
        }
        Ok(files)
    }

    fn load_groups(&self) -> StorageResult<BTreeMap<String, GroupRecord>> {
        let mut groups = BTreeMap::new();
        for (name, path) in Self::yaml_files(&self.dir("groups"))? {
            match Self::read_file::<GroupRecord>(&path) {
                Ok(record) => {
                    groups.insert(name.to_lowercase(), record);
                }
                Err(err) => warn!(file = %path.display(), error = %err, "skipping unreadable group file"),
            }
        }
        Ok(groups)
    }

    fn load_tracks(&self) -> StorageResult<BTreeMap<String, Vec<String>>> {
        let mut tracks = BTreeMap::new();
        for (name, path) in Self::yaml_files(&self.dir("tracks"))? {
            match Self::read_file::<TrackFile>(&path) {
                Ok(file) => {
                    tracks.insert(name.to_lowercase(), file.groups);
                }
                Err(err) => warn!(file = %path.display(), error = %err, "skipping unreadable track file"),
            }
        }
        Ok(tracks)
    }

    fn load_subjects(&self) -> StorageResult<BTreeMap<SubjectId, SubjectRecord>> {
        let mut subjects = BTreeMap::new();
        for (stem, path) in Self::yaml_files(&self.dir("users"))? {
            let Ok(id) = stem.parse::<SubjectId>() else {
                warn!(file = %path.display(), "skipping user file with invalid uuid name");
                continue;
            };
            match Self::read_file::<UserFile>(&path) {
                Ok(file) => {
                    subjects.insert(id, file.into_record());
                }
                Err(err) => warn!(file = %path.display(), error = %err, "skipping unreadable user file"),
            }
        }
        Ok(subjects)
    }

    /// Write one directory of entity files and delete stale ones.
    fn save_dir<T: Serialize>(
        &self,
        kind: &str,
        entries: impl Iterator<Item = (String, T)>,
    ) -> StorageResult<()> {
        let dir = self.dir(kind);
        fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            path: dir.clone(),
            source,
        })?;
        let mut kept = BTreeSet::new();
        for (name, value) in entries {
            let path = dir.join(format!("{name}.{EXT}"));
            Self::write_file(&path, &value)?;
            kept.insert(name);
        }
        for (stem, path) in Self::yaml_files(&dir)? {
            if !kept.contains(&stem) && fs::remove_file(&path).is_err() {
                warn!(file = %path.display(), "failed to delete stale file");
            }
        }
        Ok(())
    }
}

impl UserFile {
    fn from_record(record: &SubjectRecord) -> Self {
        Self {
            name: record.name.clone(),
            permissions: record.permissions.clone(),
            temp_permissions: record
                .temp_grants
                .iter()
                .filter(|g| !g.is_expired())
                .map(TempEntry::from_grant)
                .collect(),
            groups: record.groups.clone(),
            primary: record.primary.clone(),
            meta: record.meta.clone(),
        }
    }

    fn into_record(self) -> SubjectRecord {
        SubjectRecord {
            name: self.name,
            permissions: self.permissions,
            temp_grants: self
                .temp_permissions
                .into_iter()
                .filter_map(TempEntry::into_grant)
                .collect(),
            groups: self.groups,
            primary: self.primary,
            meta: self.meta,
        }
    }

    /// Whether the record carries nothing worth persisting.
    fn is_bare(&self) -> bool {
        self.permissions.is_empty()
            && self.temp_permissions.is_empty()
            && self.groups.is_empty()
            && self.primary.is_none()
            && self.meta.is_empty()
    }
}

impl Storage for YamlStorage {
    fn load(&mut self) -> StorageResult<Snapshot> {
        Ok(Snapshot {
            subjects: self.load_subjects()?,
            groups: self.load_groups()?,
            tracks: self.load_tracks()?,
        })
    }

    fn save(&mut self, snapshot: &Snapshot) -> StorageResult<()> {
        self.save_dir(
            "groups",
            snapshot
                .groups
                .iter()
                .map(|(name, record)| (name.clone(), record.clone())),
        )?;
        self.save_dir(
            "tracks",
            snapshot.tracks.iter().map(|(name, groups)| {
                (
                    name.clone(),
                    TrackFile {
                        groups: groups.clone(),
                    },
                )
            }),
        )?;
        // User files with no data are not written; existing files for such
        // users are left alone rather than deleted.
        let users: Vec<(String, UserFile)> = snapshot
            .subjects
            .iter()
            .map(|(id, record)| (id.to_string(), UserFile::from_record(record)))
            .filter(|(_, file)| !file.is_bare())
            .collect();
        let dir = self.dir("users");
        fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            path: dir.clone(),
            source,
        })?;
        for (name, file) in users {
            let path = dir.join(format!("{name}.{EXT}"));
            Self::write_file(&path, &file)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "yaml_tests.rs"]
mod tests;
