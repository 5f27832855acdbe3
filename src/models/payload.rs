//! JSON payload helpers shared by the event types.
//!
//! Producers are not consistent about field casing (`userId`, `UserId`,
//! `user_id`), so payload keys are folded to a canonical form before
//! deserializing: lowercase with `_` and `-` removed. Two keys in the same
//! object that fold to one name are rejected rather than silently merged.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Decode a raw payload into `T`, matching field names case-insensitively
pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T, serde_json::Error> {
    let value: Value = serde_json::from_slice(payload)?;
    serde_json::from_value(canonicalize_keys(value)?)
}

pub(crate) fn canonicalize_keys(value: Value) -> Result<Value, serde_json::Error> {
    match value {
        Value::Object(map) => {
            let mut folded = Map::with_capacity(map.len());
            let mut originals: HashMap<String, String> = HashMap::with_capacity(map.len());
            for (key, val) in map {
                let canonical = canonical_key(&key);
                if let Some(previous) = originals.get(&canonical) {
                    return Err(de::Error::custom(format!(
                        "fields `{previous}` and `{key}` both map to `{canonical}`"
                    )));
                }
                folded.insert(canonical.clone(), canonicalize_keys(val)?);
                originals.insert(canonical, key);
            }
            Ok(Value::Object(folded))
        }
        Value::Array(items) => items
            .into_iter()
            .map(canonicalize_keys)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other),
    }
}

fn canonical_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Identifier that may arrive as a JSON string or number
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "expected string or number, found {other}"
        ))),
    }
}

pub(crate) fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(de::Error::custom(format!(
            "expected string or number, found {other}"
        ))),
    }
}

/// Device token list: non-string and blank entries are dropped, `null` is empty
pub(crate) fn token_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s),
                _ => None,
            })
            .collect()),
        other => Err(de::Error::custom(format!(
            "expected an array of device tokens, found {other}"
        ))),
    }
}

/// Timestamp accepted as RFC 3339 or as a naive ISO datetime taken to be UTC.
/// Unparseable values become `None` rather than failing the whole event.
pub(crate) fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        _ => return Ok(None),
    };

    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    Ok(NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc()))
}
