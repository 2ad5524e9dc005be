//! Fixed-precision RFC 3339 timestamps.
//!
//! Stored timestamps double as lexicographic sort keys (the reverse index
//! orders on the serialized `createdAt` string), so every value is written
//! with exactly millisecond precision. Variable-precision RFC 3339 would
//! sort whole seconds after fractional ones within the same second.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serializer, de};

/// Format a timestamp the way it is stored.
pub fn to_sortable(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&to_sortable(ts))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(de::Error::custom)
}
