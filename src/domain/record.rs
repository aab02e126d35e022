//! Feed Record - Decoded Market/Weather Sample
//!
//! A `FeedRecord` is one decoded frame from the streaming feed: a
//! timestamp plus an opaque map of numeric fields (price, prediction,
//! weather-impact score, ...). The core never interprets the field names.
//!
//! Wire format: a JSON object with a `timestamp` (or short `t`) key and at
//! least one numeric field, e.g. `{"timestamp": 1700000000000, "price": 10.5}`.
//!
//! The timestamp is kept twice: verbatim as the display `label`, and as
//! an ordering key in `timestamp`:
//! - integers pass through unchanged,
//! - fractional numbers are epoch seconds and become milliseconds,
//! - RFC 3339, `YYYY-MM-DD HH:MM:SS` and `YYYY-MM-DD` strings become
//!   Unix milliseconds (naive forms read as UTC),
//! - any other string is a pure label keyed by the receive time.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Keys accepted as the record timestamp, in lookup order.
const TIMESTAMP_KEYS: [&str; 2] = ["timestamp", "t"];

/// Errors raised while decoding a single inbound frame.
///
/// All variants are non-fatal for the connection: the frame is discarded
/// and the error surfaces as a human-readable `DecodeError` status.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Frame is not valid JSON.
    #[error("malformed JSON frame: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame is valid JSON but not an object.
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// No `timestamp`/`t` key present.
    #[error("frame has no timestamp")]
    MissingTimestamp,

    /// Timestamp present but neither a number nor a string.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Object carried no numeric field besides the timestamp.
    #[error("frame has no numeric fields")]
    NoNumericFields,
}

/// One decoded record from the external feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedRecord {
    /// Ordering key: Unix ms, the raw integer the feed sent, or the
    /// receive time for free-form labels.
    pub timestamp: i64,
    /// Timestamp exactly as the feed sent it, for display.
    pub label: String,
    /// Numeric fields, passed through verbatim.
    pub fields: BTreeMap<String, f64>,
}

impl FeedRecord {
    /// Build a record from a timestamp and field pairs.
    pub fn new<K, I>(timestamp: i64, fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, f64)>,
    {
        Self {
            timestamp,
            label: timestamp.to_string(),
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Look up a single field.
    pub fn field(&self, key: &str) -> Option<f64> {
        self.fields.get(key).copied()
    }

    /// Decode one text frame into a record.
    ///
    /// # Errors
    /// Returns `FeedError` when the frame is not a JSON object, has no
    /// usable timestamp, or carries no numeric fields.
    pub fn decode(text: &str) -> Result<Self, FeedError> {
        Self::decode_at(text, Utc::now().timestamp_millis())
    }

    /// Decode with an explicit receive time (Unix ms) for label-only
    /// timestamps.
    ///
    /// # Errors
    /// See [`FeedRecord::decode`].
    pub fn decode_at(text: &str, received_ms: i64) -> Result<Self, FeedError> {
        let value: Value = serde_json::from_str(text)?;

        let map = match value {
            Value::Object(map) => map,
            other => return Err(FeedError::NotAnObject(json_kind(&other))),
        };

        let (ts_key, ts_value) = TIMESTAMP_KEYS
            .iter()
            .find_map(|key| map.get(*key).map(|v| (*key, v)))
            .ok_or(FeedError::MissingTimestamp)?;

        let (timestamp, label) = parse_timestamp(ts_value, received_ms)?;

        let fields: BTreeMap<String, f64> = map
            .iter()
            .filter(|(key, _)| key.as_str() != ts_key)
            .filter_map(|(key, v)| {
                v.as_f64()
                    .filter(|n| n.is_finite())
                    .map(|n| (key.clone(), n))
            })
            .collect();

        if fields.is_empty() {
            return Err(FeedError::NoNumericFields);
        }

        Ok(Self {
            timestamp,
            label,
            fields,
        })
    }
}

/// Ordering key and display label for a timestamp value.
fn parse_timestamp(value: &Value, received_ms: i64) -> Result<(i64, String), FeedError> {
    match value {
        Value::Number(n) => {
            let key = match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => i,
                (None, Some(secs)) if secs.is_finite() => (secs * 1000.0).round() as i64,
                _ => return Err(FeedError::InvalidTimestamp(n.to_string())),
            };
            Ok((key, n.to_string()))
        }
        Value::String(s) => Ok((parse_date_label(s).unwrap_or(received_ms), s.clone())),
        other => Err(FeedError::InvalidTimestamp(json_kind(other).to_string())),
    }
}

/// Unix ms for the date formats the feed is known to send.
fn parse_date_label(label: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(label) {
        return Some(dt.timestamp_millis());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(label, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(label, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
