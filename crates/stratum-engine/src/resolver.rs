//! Effective permission resolution.

use std::collections::{BTreeMap, HashSet};

use tracing::trace;

use stratum_core::{ContextCodec, ContextSet, PermissionValue, SubjectId, GROUP_NODE_PREFIX};

use crate::error::{EngineError, EngineResult};
use crate::store::PermissionStore;

/// Where a candidate value came from. Declaration order is evaluation
/// order: later sources are considered after earlier ones, which matters
/// for last-wins resolution and the user-temp preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    /// Virtual `group.<name>` node synthesized for an inherited group.
    GroupMembership,
    /// A node defined by a group in the inheritance closure.
    Group,
    /// A node defined directly on the subject.
    User,
    /// An unexpired temporary grant.
    UserTemp,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    value: bool,
    specificity: usize,
    source: Source,
}

impl PermissionStore {
    /// Resolve the effective permission map for a subject in a context.
    ///
    /// Expired temporary grants are purged first. Results are memoized
    /// per `(subject, normalized context)`; the cache is bypassed in both
    /// directions while the subject holds any active temporary grant, so
    /// expiry is observed on the next call without explicit invalidation.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SubjectNotFound`] for an unknown subject.
    pub fn resolve(
        &mut self,
        id: &SubjectId,
        context: &ContextSet,
    ) -> EngineResult<BTreeMap<String, bool>> {
        let key = self.codec.normalize(context);

        let has_temp = {
            let Some(subject) = self.subjects.get_mut(id) else {
                return Err(EngineError::SubjectNotFound { id: id.to_string() });
            };
            subject.purge_expired_grants();
            !subject.temp_grants.is_empty()
        };

        if !has_temp
            && let Some(cached) = self.cache.get(id, &key)
        {
            return Ok(cached.clone());
        }

        let Some(subject) = self.subjects.get(id) else {
            return Err(EngineError::SubjectNotFound { id: id.to_string() });
        };

        // Inheritance closure: direct memberships plus groups implied by
        // the subject's own `group.<name>` nodes resolving true.
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        for group in &subject.groups {
            self.traverse_into(group, &mut visited, &mut order);
        }
        for (node, value) in &subject.permissions {
            let Some(name) = node.strip_prefix(GROUP_NODE_PREFIX) else {
                continue;
            };
            let name = name.to_lowercase();
            if name.is_empty() || !self.groups.contains_key(&name) {
                continue;
            }
            if matches!(resolve_value(value, context), Some((true, _))) {
                self.traverse_into(&name, &mut visited, &mut order);
            }
        }

        // Gather candidates in evaluation order.
        let mut candidates: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();
        for name in &order {
            candidates
                .entry(format!("{GROUP_NODE_PREFIX}{name}"))
                .or_default()
                .push(Candidate {
                    value: true,
                    specificity: 0,
                    source: Source::GroupMembership,
                });
            let Some(group) = self.groups.get(name) else {
                continue;
            };
            for (node, value) in &group.permissions {
                if let Some((value, specificity)) = resolve_value(value, context) {
                    candidates.entry(node.clone()).or_default().push(Candidate {
                        value,
                        specificity,
                        source: Source::Group,
                    });
                }
            }
        }
        for (node, value) in &subject.permissions {
            if let Some((value, specificity)) = resolve_value(value, context) {
                candidates.entry(node.clone()).or_default().push(Candidate {
                    value,
                    specificity,
                    source: Source::User,
                });
            }
        }
        for grant in &subject.temp_grants {
            let constraints = ContextCodec::parse(&grant.context_key);
            if context.satisfies(&constraints) {
                candidates
                    .entry(grant.node.clone())
                    .or_default()
                    .push(Candidate {
                        value: grant.value,
                        specificity: constraints.len(),
                        source: Source::UserTemp,
                    });
            }
        }

        // Per node: keep the most specific candidates, prefer temporary
        // grants among them, then apply deny precedence or last-wins.
        let mut effective = BTreeMap::new();
        for (node, list) in candidates {
            let Some(best) = list.iter().map(|c| c.specificity).max() else {
                continue;
            };
            let mut top: Vec<&Candidate> =
                list.iter().filter(|c| c.specificity == best).collect();
            if top.iter().any(|c| c.source == Source::UserTemp) {
                top.retain(|c| c.source == Source::UserTemp);
            }
            let value = if self.settings.deny_precedence {
                top.iter().all(|c| c.value)
            } else {
                match top.last() {
                    Some(c) => c.value,
                    None => continue,
                }
            };
            effective.insert(node, value);
        }

        let effective = self.expand_wildcards(effective);
        trace!(subject = %id, context = %key, nodes = effective.len(), "resolved");

        if !has_temp {
            self.cache.insert(*id, key, effective.clone());
        }
        Ok(effective)
    }

    /// Expand `prefix.*` nodes against the registered permission set.
    ///
    /// Each registered name sharing the prefix is inserted with the
    /// wildcard's value unless already resolved explicitly; the wildcard
    /// node itself is removed.
    fn expand_wildcards(&self, mut perms: BTreeMap<String, bool>) -> BTreeMap<String, bool> {
        let wildcards: Vec<(String, bool)> = perms
            .iter()
            .filter(|(node, _)| node.ends_with(".*"))
            .map(|(node, value)| (node.clone(), *value))
            .collect();
        for (node, value) in wildcards {
            let Some(prefix) = node.strip_suffix('*') else {
                continue;
            };
            let additions: Vec<String> = self
                .registry
                .with_prefix(prefix)
                .filter(|name| !perms.contains_key(*name))
                .map(ToString::to_string)
                .collect();
            for name in additions {
                perms.insert(name, value);
            }
            perms.remove(&node);
        }
        perms
    }
}

/// Resolve a stored value against an evaluation context.
///
/// Returns the matched value and its specificity (number of constrained
/// dimensions), or `None` when no rule applies. Among equally specific
/// matching entries the later-declared one wins; the fallback applies at
/// specificity zero.
fn resolve_value(value: &PermissionValue, context: &ContextSet) -> Option<(bool, usize)> {
    match value {
        PermissionValue::Global(v) => Some((*v, 0)),
        PermissionValue::Contextual { entries, fallback } => {
            let mut best: Option<(bool, usize)> = None;
            for (key, v) in entries {
                let constraints = ContextCodec::parse(key);
                if !context.satisfies(&constraints) {
                    continue;
                }
                let specificity = constraints.len();
                if best.is_none_or(|(_, current)| specificity >= current) {
                    best = Some((*v, specificity));
                }
            }
            best.or_else(|| fallback.map(|v| (v, 0)))
        }
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
