//! Stored permission values.

use serde::{Deserialize, Serialize};

/// The value attached to a permission node.
///
/// A node is stored either as a single unconditional boolean or as an
/// ordered list of `(context key, bool)` entries with an optional
/// unconditional fallback. Entry order is significant: when two contextual
/// entries match an evaluation context with the same number of constrained
/// dimensions, the later-declared entry wins.
///
/// Serialized untagged, so a plain `true`/`false` in a data file is a
/// [`PermissionValue::Global`] and a mapping is a
/// [`PermissionValue::Contextual`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermissionValue {
    /// Applies in every context.
    Global(bool),
    /// Applies per context key, with an optional unconditional fallback.
    Contextual {
        /// `(context key, value)` entries in declaration order.
        entries: Vec<(String, bool)>,
        /// Value used when no contextual entry matches.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<bool>,
    },
}

impl PermissionValue {
    /// Set the value for a canonical context key.
    ///
    /// A `Global` value is promoted into the fallback slot of a
    /// `Contextual`; an existing entry for the key is updated in place,
    /// preserving its declaration position.
    pub fn set_context(&mut self, key: &str, value: bool) {
        match self {
            Self::Global(current) => {
                *self = Self::Contextual {
                    entries: vec![(key.to_string(), value)],
                    fallback: Some(*current),
                };
            }
            Self::Contextual { entries, .. } => {
                if let Some(entry) = entries.iter_mut().find(|(k, _)| k == key) {
                    entry.1 = value;
                } else {
                    entries.push((key.to_string(), value));
                }
            }
        }
    }

    /// Remove the value stored for a canonical context key.
    ///
    /// Returns `true` when nothing remains and the node must be dropped
    /// from its map. A lone surviving fallback collapses back into a
    /// `Global`.
    pub fn unset_context(&mut self, key: &str) -> bool {
        match self {
            Self::Global(_) => false,
            Self::Contextual { entries, fallback } => {
                entries.retain(|(k, _)| k != key);
                if entries.is_empty() {
                    match fallback {
                        Some(value) => {
                            *self = Self::Global(*value);
                            false
                        }
                        None => true,
                    }
                } else {
                    false
                }
            }
        }
    }

    /// Whether this value holds no entries and no fallback.
    ///
    /// Such values must never be stored; callers drop the node instead.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(
            self,
            Self::Contextual { entries, fallback: None } if entries.is_empty()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_context_promotes_global_to_fallback() {
        let mut value = PermissionValue::Global(true);
        value.set_context("world=hub", false);
        assert_eq!(
            value,
            PermissionValue::Contextual {
                entries: vec![("world=hub".to_string(), false)],
                fallback: Some(true),
            }
        );
    }

    #[test]
    fn test_set_context_updates_in_place() {
        let mut value = PermissionValue::Contextual {
            entries: vec![
                ("world=hub".to_string(), true),
                ("world=arena".to_string(), true),
            ],
            fallback: None,
        };
        value.set_context("world=hub", false);
        let PermissionValue::Contextual { entries, .. } = &value else {
            panic!("expected contextual");
        };
        assert_eq!(entries[0], ("world=hub".to_string(), false));
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_unset_context_collapses_fallback() {
        let mut value = PermissionValue::Global(true);
        value.set_context("world=hub", false);
        assert!(!value.unset_context("world=hub"));
        assert_eq!(value, PermissionValue::Global(true));
    }

    #[test]
    fn test_unset_last_entry_requests_removal() {
        let mut value = PermissionValue::Contextual {
            entries: vec![("world=hub".to_string(), true)],
            fallback: None,
        };
        assert!(value.unset_context("world=hub"));
        assert!(value.is_empty());
    }

    #[test]
    fn test_serde_untagged_shapes() {
        let global: PermissionValue = serde_json::from_str("true").unwrap();
        assert_eq!(global, PermissionValue::Global(true));

        let contextual = PermissionValue::Contextual {
            entries: vec![("world=hub".to_string(), true)],
            fallback: Some(false),
        };
        let json = serde_json::to_string(&contextual).unwrap();
        let back: PermissionValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, contextual);
    }
}
