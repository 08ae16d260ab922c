//! Second-precision UTC timestamps.

use std::fmt;

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A UTC timestamp with second precision, serialized as unix seconds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The current time.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    /// Build from unix seconds.
    #[must_use]
    pub const fn from_unix(secs: i64) -> Self {
        Self(secs)
    }

    /// Unix seconds.
    #[must_use]
    pub const fn as_unix(self) -> i64 {
        self.0
    }

    /// Whether this timestamp is now or earlier.
    #[must_use]
    pub fn is_past(self) -> bool {
        self.0 <= Utc::now().timestamp()
    }

    /// Seconds remaining until this timestamp, zero if already past.
    #[must_use]
    pub fn remaining_secs(self) -> i64 {
        self.0.saturating_sub(Utc::now().timestamp()).max(0)
    }

    /// This timestamp shifted forward by `secs` seconds.
    #[must_use]
    pub fn plus_secs(self, secs: i64) -> Self {
        Self(self.0.saturating_add(secs))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Utc.timestamp_opt(self.0, 0).single() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_past_and_remaining() {
        let past = Timestamp::now().plus_secs(-60);
        assert!(past.is_past());
        assert_eq!(past.remaining_secs(), 0);

        let future = Timestamp::now().plus_secs(3600);
        assert!(!future.is_past());
        assert!(future.remaining_secs() > 3500);
    }

    #[test]
    fn test_serde_as_unix_seconds() {
        let ts = Timestamp::from_unix(1_700_000_000);
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "1700000000");
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }
}
