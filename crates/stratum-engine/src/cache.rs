//! Memoization of resolved permission maps.

use std::collections::{BTreeMap, HashMap};

use stratum_core::SubjectId;

/// Cache of resolver output keyed by subject and normalized context key.
///
/// Invalidation contract: subject-scoped mutations that can change
/// resolver output invalidate that subject's entries; group permission,
/// parent, and registry mutations clear the whole cache. Fields that
/// never feed `resolve` — primary pointers, meta, weights, track
/// composition — leave the cache alone. Entries are neither read nor
/// written for a subject holding an active temporary grant.
#[derive(Debug, Default)]
pub(crate) struct ResolutionCache {
    entries: HashMap<SubjectId, HashMap<String, BTreeMap<String, bool>>>,
}

impl ResolutionCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(
        &self,
        subject: &SubjectId,
        key: &str,
    ) -> Option<&BTreeMap<String, bool>> {
        self.entries.get(subject)?.get(key)
    }

    pub(crate) fn insert(
        &mut self,
        subject: SubjectId,
        key: String,
        result: BTreeMap<String, bool>,
    ) {
        self.entries.entry(subject).or_default().insert(key, result);
    }

    pub(crate) fn invalidate_subject(&mut self, subject: &SubjectId) {
        self.entries.remove(subject);
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }
}
