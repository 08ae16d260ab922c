//! Registry of known concrete permission names.

use std::collections::BTreeSet;

/// The set of concrete permission names a host understands.
///
/// Wildcard nodes (`command.*`) expand against this set at resolution
/// time; the engine itself never invents permission names.
#[derive(Debug, Clone, Default)]
pub struct PermissionRegistry {
    names: BTreeSet<String>,
}

impl PermissionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single permission name.
    pub fn register(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    /// Register many permission names.
    pub fn register_all<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.register(name);
        }
    }

    /// Whether a name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Iterate registered names sharing a prefix.
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> {
        self.names
            .iter()
            .filter(move |name| name.starts_with(prefix))
            .map(String::as_str)
    }

    /// Number of registered names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
