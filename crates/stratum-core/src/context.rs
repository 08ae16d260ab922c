//! Context sets and their canonical string encoding.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Context dimensions recognized when no explicit configuration is given.
pub const DEFAULT_DIMENSIONS: [&str; 2] = ["world", "gamemode"];

/// An unordered set of `dimension = value` pairs describing where a
/// permission applies, e.g. `world=hub; gamemode=creative`.
///
/// Dimensions and values are lowercased on insertion so that lookups and
/// comparisons are case-insensitive. The empty set is the *global* context
/// and matches everywhere.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextSet {
    entries: BTreeMap<String, String>,
}

impl ContextSet {
    /// The empty (global) context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context set from `(dimension, value)` pairs.
    #[must_use]
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut ctx = Self::new();
        for (dimension, value) in pairs {
            ctx.insert(dimension, value);
        }
        ctx
    }

    /// Set the value of a dimension, lowercasing both sides.
    pub fn insert(&mut self, dimension: &str, value: &str) {
        self.entries
            .insert(dimension.to_lowercase(), value.to_lowercase());
    }

    /// Look up the value of a dimension.
    #[must_use]
    pub fn get(&self, dimension: &str) -> Option<&str> {
        self.entries.get(dimension).map(String::as_str)
    }

    /// Number of dimensions this context constrains.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether this is the global (unconstrained) context.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(dimension, value)` pairs in dimension order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether this context satisfies every constraint in `constraints`.
    ///
    /// `constraints` may cover a subset of the dimensions present here; a
    /// constrained dimension absent from `self` disqualifies the match.
    #[must_use]
    pub fn satisfies(&self, constraints: &Self) -> bool {
        constraints.iter().all(|(k, v)| self.get(k) == Some(v))
    }
}

/// Encodes context sets into canonical keys and back.
///
/// A canonical key lists recognized dimensions only, lowercased, sorted by
/// dimension name, joined as `dim=value;dim=value`. The empty key denotes
/// the global context. Two context sets that differ only in unrecognized
/// dimensions or in ordering produce the same key.
#[derive(Debug, Clone)]
pub struct ContextCodec {
    dimensions: Vec<String>,
}

impl Default for ContextCodec {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl ContextCodec {
    /// Create a codec recognizing the given dimensions.
    #[must_use]
    pub fn new<I, S>(dimensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dimensions: dimensions
                .into_iter()
                .map(|d| d.into().to_lowercase())
                .collect(),
        }
    }

    /// Whether a dimension is recognized by this codec.
    #[must_use]
    pub fn recognizes(&self, dimension: &str) -> bool {
        self.dimensions.iter().any(|d| d == dimension)
    }

    /// Normalize a context into its canonical key.
    ///
    /// Unrecognized dimensions are dropped. Returns the empty string for
    /// the global context.
    #[must_use]
    pub fn normalize(&self, context: &ContextSet) -> String {
        let parts: Vec<String> = context
            .iter()
            .filter(|(dimension, _)| self.recognizes(dimension))
            .map(|(dimension, value)| format!("{dimension}={value}"))
            .collect();
        parts.join(";")
    }

    /// Parse a stored key back into a context set.
    ///
    /// Tolerates `;` or `,` as separators and skips malformed pairs.
    /// Dimensions are not filtered, so keys written under a wider
    /// recognized set still round-trip.
    #[must_use]
    pub fn parse(key: &str) -> ContextSet {
        let mut ctx = ContextSet::new();
        for pair in key.split([';', ',']) {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let Some((dimension, value)) = pair.split_once('=') else {
                continue;
            };
            let (dimension, value) = (dimension.trim(), value.trim());
            if dimension.is_empty() || value.is_empty() {
                continue;
            }
            ctx.insert(dimension, value);
        }
        ctx
    }
}
