//! Human-readable durations for configuration values ("500ms", "15s", "2m").

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{de, Deserialize, Deserializer, Serializer};

const UNITS: [(&str, u64); 5] = [
    ("ms", 1),
    ("s", 1_000),
    ("m", 60 * 1_000),
    ("h", 60 * 60 * 1_000),
    ("d", 24 * 60 * 60 * 1_000),
];

/// Parse a duration made of a whole number followed by `ms`, `s`, `m`, `h`
/// or `d`. Case-insensitive, surrounding whitespace ignored.
///
/// ```
/// use walletfolio::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("15s").unwrap(), Duration::from_secs(15));
/// assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
/// assert_eq!(parse_duration("2M").unwrap(), Duration::from_secs(120));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .with_context(|| format!("Duration {s:?} is missing a unit (ms, s, m, h or d)"))?;
    let (num, unit) = s.split_at(split);
    if num.is_empty() {
        bail!("Duration {s:?} is missing a number");
    }

    let millis_per_unit = UNITS
        .iter()
        .find(|(name, _)| *name == unit)
        .map(|(_, millis)| *millis)
        .with_context(|| format!("Unknown duration unit {unit:?}"))?;

    let num: u64 = num
        .parse()
        .with_context(|| format!("Invalid number in duration {s:?}"))?;
    let millis = num
        .checked_mul(millis_per_unit)
        .context("Duration is too large")?;

    Ok(Duration::from_millis(millis))
}

/// Render a duration with the largest unit that divides it evenly.
///
/// ```
/// use walletfolio::duration::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(90)), "90s");
/// assert_eq!(format_duration(Duration::from_secs(120)), "2m");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
/// ```
pub fn format_duration(d: Duration) -> String {
    let millis = d.as_millis() as u64;
    if millis == 0 {
        return "0s".to_string();
    }
    UNITS
        .iter()
        .rev()
        .find(|(_, per)| millis % per == 0)
        .map(|(name, per)| format!("{}{name}", millis / per))
        .unwrap_or_else(|| format!("{millis}ms"))
}

/// Use with `#[serde(deserialize_with = "deserialize_duration")]`.
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(de::Error::custom)
}

/// Use with `#[serde(serialize_with = "serialize_duration")]`.
pub fn serialize_duration<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_duration(*d))
}
