//! Small helpers shared across the mqlink crates.
//!
//! The main export is human-readable duration parsing, used by the client
//! configuration so intervals can be written as `"5s"` or `"1h30m"` instead
//! of raw integers.
//!
//! ```rust
//! use mqlink_utils::to_duration;
//!
//! let duration = to_duration("1h30m15s");
//! assert_eq!(duration.as_secs(), 5415);
//! ```

#![deny(unsafe_code)]

use std::time::Duration;

use serde::de::Deserializer;
use serde::Deserialize;

/// Deserialize a [`Duration`] from a human-readable string.
#[inline]
pub fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let v = String::deserialize(deserializer)?;
    Ok(to_duration(&v))
}

/// Deserialize an optional [`Duration`], treating the empty string as `None`.
#[inline]
pub fn deserialize_duration_option<'de, D>(deserializer: D) -> std::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = String::deserialize(deserializer)?;
    if v.is_empty() {
        Ok(None)
    } else {
        Ok(Some(to_duration(&v)))
    }
}

/// Convert a human-readable duration string to a [`Duration`].
///
/// # Supported units:
/// - ms: milliseconds
/// - s: seconds
/// - m: minutes
/// - h: hours
/// - d: days
/// - w: weeks
///
/// Unrecognized pieces contribute zero, so `to_duration("abc")` is
/// `Duration::ZERO` rather than an error.
///
/// # Example:
/// ```
/// let duration = mqlink_utils::to_duration("1h30m15s");
/// assert_eq!(duration.as_secs(), 5415);
///
/// let short = mqlink_utils::to_duration("250ms");
/// assert_eq!(short.as_millis(), 250);
/// ```
#[inline]
pub fn to_duration(text: &str) -> Duration {
    let text = text.to_lowercase().replace("ms", "Y");
    let ms: u64 = text
        .split_inclusive(['s', 'm', 'h', 'd', 'w', 'Y'])
        .map(|x| {
            let mut chars = x.chars();
            let u = match chars.nth_back(0) {
                None => return 0,
                Some(u) => u,
            };
            let v = match chars.as_str().parse::<u64>() {
                Err(_e) => return 0,
                Ok(v) => v,
            };
            match u {
                'Y' => v,
                's' => v * 1000,
                'm' => v * 60000,
                'h' => v * 3600000,
                'd' => v * 86400000,
                'w' => v * 604800000,
                _ => 0,
            }
        })
        .sum();
    Duration::from_millis(ms)
}
