//! In-memory storage.

use stratum_core::Snapshot;

use crate::{Storage, StorageResult};

/// Storage backend holding the snapshot in memory.
///
/// Useful for tests and for hosts that manage persistence themselves.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    snapshot: Snapshot,
}

impl MemoryStorage {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with a snapshot.
    #[must_use]
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }
}

impl Storage for MemoryStorage {
    fn load(&mut self) -> StorageResult<Snapshot> {
        Ok(self.snapshot.clone())
    }

    fn save(&mut self, snapshot: &Snapshot) -> StorageResult<()> {
        self.snapshot = snapshot.clone();
        Ok(())
    }
}
