//! Primary group computation and resolved metadata.

use stratum_core::SubjectId;

use crate::config::PrimaryGroupStrategy;
use crate::error::{EngineError, EngineResult};
use crate::store::PermissionStore;

impl PermissionStore {
    /// Compute the subject's primary group under the configured strategy.
    ///
    /// Weight ties break toward the lexicographically greatest group
    /// name, so the result is independent of membership declaration
    /// order. Returns `None` when no candidate group exists.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SubjectNotFound`] for an unknown subject.
    pub fn primary_group(&self, id: &SubjectId) -> EngineResult<Option<String>> {
        let Some(subject) = self.subjects.get(id) else {
            return Err(EngineError::SubjectNotFound { id: id.to_string() });
        };
        match self.settings.primary_group_strategy {
            PrimaryGroupStrategy::Stored => Ok(subject.primary.clone()),
            PrimaryGroupStrategy::DirectByWeight => {
                Ok(self.heaviest(subject.groups.iter().map(String::as_str)))
            }
            PrimaryGroupStrategy::InheritedByWeight => {
                let closure = self.traverse(&subject.groups);
                Ok(self.heaviest(closure.iter().map(String::as_str)))
            }
        }
    }

    /// Resolve a metadata key for a subject.
    ///
    /// Priority: the subject's own meta, then the computed primary
    /// group's meta, then the highest-weight direct group defining the
    /// key. Empty values are treated as absent.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SubjectNotFound`] for an unknown subject.
    pub fn resolved_meta(&self, id: &SubjectId, key: &str) -> EngineResult<Option<String>> {
        let Some(subject) = self.subjects.get(id) else {
            return Err(EngineError::SubjectNotFound { id: id.to_string() });
        };
        if let Some(value) = subject.meta.get(key)
            && !value.is_empty()
        {
            return Ok(Some(value.clone()));
        }
        if let Some(primary) = self.primary_group(id)?
            && let Some(group) = self.groups.get(&primary)
            && let Some(value) = group.meta.get(key)
            && !value.is_empty()
        {
            return Ok(Some(value.clone()));
        }

        let mut best: Option<(&str, i64, &str)> = None;
        for name in &subject.groups {
            let Some(group) = self.groups.get(name) else {
                continue;
            };
            let Some(value) = group.meta.get(key) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            let better = match best {
                None => true,
                Some((best_name, best_weight, _)) => {
                    group.weight > best_weight
                        || (group.weight == best_weight && name.as_str() > best_name)
                }
            };
            if better {
                best = Some((name, group.weight, value));
            }
        }
        Ok(best.map(|(_, _, value)| value.to_string()))
    }

    /// Resolved display prefix (`meta["prefix"]`).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SubjectNotFound`] for an unknown subject.
    pub fn resolved_prefix(&self, id: &SubjectId) -> EngineResult<Option<String>> {
        self.resolved_meta(id, "prefix")
    }

    /// Resolved display suffix (`meta["suffix"]`).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SubjectNotFound`] for an unknown subject.
    pub fn resolved_suffix(&self, id: &SubjectId) -> EngineResult<Option<String>> {
        self.resolved_meta(id, "suffix")
    }

    /// Highest-weight existing group among the candidates; ties break
    /// toward the lexicographically greatest name.
    fn heaviest<'a, I>(&self, candidates: I) -> Option<String>
    where
        I: Iterator<Item = &'a str>,
    {
        let mut best: Option<(&str, i64)> = None;
        for name in candidates {
            let Some(group) = self.groups.get(name) else {
                continue;
            };
            let better = match best {
                None => true,
                Some((best_name, best_weight)) => {
                    group.weight > best_weight
                        || (group.weight == best_weight && name > best_name)
                }
            };
            if better {
                best = Some((name, group.weight));
            }
        }
        best.map(|(name, _)| name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use stratum_core::SubjectId;

    use crate::config::{PrimaryGroupStrategy, Settings};
    use crate::store::PermissionStore;

    fn store_with_groups() -> (PermissionStore, SubjectId) {
        let mut store = PermissionStore::new(Settings::default());
        for (name, weight) in [("member", 1), ("mod", 5), ("admin", 10)] {
            store.create_group(name).unwrap();
            store.set_group_weight(name, weight).unwrap();
        }
        let id = SubjectId::new();
        store.create_subject(id, "alice");
        (store, id)
    }

    #[test]
    fn test_direct_by_weight() {
        let (mut store, id) = store_with_groups();
        store.add_group_membership(&id, "member").unwrap();
        store.add_group_membership(&id, "mod").unwrap();
        assert_eq!(store.primary_group(&id).unwrap().as_deref(), Some("mod"));
    }

    #[test]
    fn test_inherited_by_weight_sees_parents() {
        let (mut store, id) = store_with_groups();
        store.add_parent("member", "admin").unwrap();
        store.add_group_membership(&id, "member").unwrap();

        assert_eq!(store.primary_group(&id).unwrap().as_deref(), Some("member"));
        store.set_primary_group_strategy(PrimaryGroupStrategy::InheritedByWeight);
        assert_eq!(store.primary_group(&id).unwrap().as_deref(), Some("admin"));
    }

    #[test]
    fn test_stored_strategy_uses_pointer() {
        let (mut store, id) = store_with_groups();
        store.add_group_membership(&id, "admin").unwrap();
        store.set_primary_group(&id, "member").unwrap();
        store.set_primary_group_strategy(PrimaryGroupStrategy::Stored);
        assert_eq!(store.primary_group(&id).unwrap().as_deref(), Some("member"));
    }

    #[test]
    fn test_weight_tie_breaks_lexicographically() {
        let mut store = PermissionStore::new(Settings::default());
        store.create_group("alpha").unwrap();
        store.create_group("beta").unwrap();
        let id = SubjectId::new();
        store.create_subject(id, "bob");
        store.add_group_membership(&id, "beta").unwrap();
        store.add_group_membership(&id, "alpha").unwrap();
        assert_eq!(store.primary_group(&id).unwrap().as_deref(), Some("beta"));
    }

    #[test]
    fn test_no_groups_is_none() {
        let (store, id) = store_with_groups();
        assert_eq!(store.primary_group(&id).unwrap(), None);
    }

    #[test]
    fn test_resolved_meta_priority() {
        let (mut store, id) = store_with_groups();
        store.add_group_membership(&id, "member").unwrap();
        store.add_group_membership(&id, "mod").unwrap();
        store.set_group_meta("member", "prefix", "[M] ").unwrap();
        store.set_group_meta("mod", "prefix", "[Mod] ").unwrap();

        // Primary group (mod, heaviest) wins over other groups.
        assert_eq!(
            store.resolved_prefix(&id).unwrap().as_deref(),
            Some("[Mod] ")
        );

        // Subject meta overrides everything.
        store.set_subject_meta(&id, "prefix", "[VIP] ").unwrap();
        assert_eq!(
            store.resolved_prefix(&id).unwrap().as_deref(),
            Some("[VIP] ")
        );
    }

    #[test]
    fn test_resolved_meta_falls_back_to_heaviest_defining_group() {
        let (mut store, id) = store_with_groups();
        store.add_group_membership(&id, "member").unwrap();
        store.add_group_membership(&id, "admin").unwrap();
        // Primary is admin (weight 10) but only member defines a suffix.
        store.set_group_meta("member", "suffix", " the brave").unwrap();
        assert_eq!(
            store.resolved_suffix(&id).unwrap().as_deref(),
            Some(" the brave")
        );
    }
}
