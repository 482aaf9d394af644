//! Serde adapter for optional message timestamps.
//!
//! Timestamps are written as RFC 3339 strings in UTC with full sub-second
//! precision, so a decoded message compares equal to the one that was encoded.
//! On input both RFC 3339 strings and integer Unix-epoch milliseconds are
//! accepted; `null` and the empty string mean "not set".
//!
//! Used through `#[serde(default, with = "crate::protocol::timestamp")]`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(String),
    EpochMillis(i64),
}

pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(ts) => serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        None => serializer.serialize_none(),
    }
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawTimestamp>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawTimestamp::Text(text)) if text.is_empty() => Ok(None),
        Some(RawTimestamp::Text(text)) => DateTime::parse_from_rfc3339(&text)
            .map(|ts| Some(ts.with_timezone(&Utc)))
            .map_err(|e| D::Error::custom(format!("invalid timestamp {text:?}: {e}"))),
        Some(RawTimestamp::EpochMillis(ms)) => DateTime::<Utc>::from_timestamp_millis(ms)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("epoch milliseconds out of range: {ms}"))),
    }
}
