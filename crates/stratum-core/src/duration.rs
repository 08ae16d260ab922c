//! Parsing of human-readable duration tokens.

use crate::time::Timestamp;

/// Bare integers at or above this value are treated as absolute unix
/// expiries rather than durations in seconds.
const UNIX_EPOCH_THRESHOLD: i64 = 1_000_000_000;

/// Parse a duration token into seconds.
///
/// Accepts a bare number of seconds (`"90"`), compound unit forms
/// (`"10m"`, `"1h30m"`, `"1d2h30m15s"`, `"2w"`, case-insensitive), or a
/// unix timestamp (>= 1,000,000,000) interpreted as an absolute expiry and
/// converted to the duration remaining from now.
///
/// Returns `None` for empty, malformed, non-positive, or already-elapsed
/// inputs.
#[must_use]
pub fn parse_duration(token: &str) -> Option<i64> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    if token.bytes().all(|b| b.is_ascii_digit()) {
        let value: i64 = token.parse().ok()?;
        if value <= 0 {
            return None;
        }
        if value >= UNIX_EPOCH_THRESHOLD {
            let remaining = value.saturating_sub(Timestamp::now().as_unix());
            return (remaining > 0).then_some(remaining);
        }
        return Some(value);
    }

    let mut total: i64 = 0;
    let mut digits = String::new();
    let mut saw_unit = false;
    for ch in token.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        let multiplier = match ch.to_ascii_lowercase() {
            's' => 1,
            'm' => 60,
            'h' => 3_600,
            'd' => 86_400,
            'w' => 604_800,
            _ => return None,
        };
        if digits.is_empty() {
            return None;
        }
        let count: i64 = digits.parse().ok()?;
        total = total.saturating_add(count.saturating_mul(multiplier));
        digits.clear();
        saw_unit = true;
    }
    if !digits.is_empty() || !saw_unit {
        return None;
    }
    (total > 0).then_some(total)
}
