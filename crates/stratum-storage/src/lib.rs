//! Persistence backends for the Stratum permission store.
//!
//! The [`Storage`] trait is the seam between the engine and its
//! persistence: one blocking round-trip each way, exchanging a full
//! [`Snapshot`]. Two implementations ship here: [`MemoryStorage`] for
//! tests and embedded hosts, and [`YamlStorage`] writing one YAML file per
//! group, track, and user.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(clippy::all)]

mod error;
mod memory;
mod yaml;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStorage;
pub use yaml::YamlStorage;

use stratum_core::Snapshot;

/// A persistence collaborator for the permission store.
///
/// Implementations are free to reshape the snapshot on disk (the YAML
/// backend rewrites absolute expiries as remaining seconds) as long as a
/// save/load round-trip preserves unexpired state.
pub trait Storage {
    /// Load the full snapshot from the backing medium.
    ///
    /// A missing or empty medium yields an empty snapshot, not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] when the medium exists but cannot be
    /// read.
    fn load(&mut self) -> StorageResult<Snapshot>;

    /// Persist the full snapshot to the backing medium.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] when the medium cannot be written.
    fn save(&mut self, snapshot: &Snapshot) -> StorageResult<()>;
}
