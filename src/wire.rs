//! Serde helpers, timestamp utilities and JSON file writes for the API's
//! JSON shapes.
//!
//! The mock API hands out identifiers as strings in some collections and as
//! numbers in others, so every id or reference is read as either and kept
//! as text.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error;

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Text(String),
    Int(i64),
    Float(f64),
}

impl TextOrNumber {
    fn into_text(self) -> String {
        match self {
            TextOrNumber::Text(s) => s,
            TextOrNumber::Int(n) => n.to_string(),
            TextOrNumber::Float(f) => f.to_string(),
        }
    }
}

/// Deserialize a JSON string or number into a `String`.
pub fn id_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    TextOrNumber::deserialize(d).map(TextOrNumber::into_text)
}

/// Optional variant of [`id_text`]; `null` and missing both give `None`.
pub fn opt_id_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Option::<TextOrNumber>::deserialize(d).map(|v| v.map(TextOrNumber::into_text))
}

/// Sequence variant of [`id_text`]; `null` gives an empty list.
pub fn id_text_vec<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Option::<Vec<TextOrNumber>>::deserialize(d)
        .map(|v| v.unwrap_or_default().into_iter().map(TextOrNumber::into_text).collect())
}

/// `null` tolerant list of plain strings.
pub fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Option::<Vec<String>>::deserialize(d).map(Option::unwrap_or_default)
}

/// Render a JSON scalar as the text the API would compare it by.
pub fn value_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Current time as an ISO-8601 UTC string with millisecond precision.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an API timestamp. Accepts full RFC 3339, local date-times without
/// an offset (read as UTC) and bare dates.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Write `value` as pretty JSON through a sibling `.json.tmp` file and a
/// rename, creating missing parent directories. On error the target file is
/// left as it was.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> error::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let body = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    let mut f = File::create(&tmp)?;
    f.write_all(body.as_bytes())?;
    f.flush()?;
    fs::rename(tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Row {
        #[serde(deserialize_with = "id_text")]
        id: String,
        #[serde(default, deserialize_with = "opt_id_text")]
        owner: Option<String>,
    }

    #[test]
    fn test_numeric_and_text_ids_read_as_text() {
        let a: Row = serde_json::from_str(r#"{"id": 7, "owner": "3"}"#).unwrap();
        let b: Row = serde_json::from_str(r#"{"id": "7", "owner": 3}"#).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.owner, b.owner);
        let c: Row = serde_json::from_str(r#"{"id": "x"}"#).unwrap();
        assert_eq!(c.owner, None);
    }

    #[test]
    fn test_parse_timestamp_forms() {
        let full = parse_timestamp("2024-02-01T10:30:00.000Z").unwrap();
        let day = parse_timestamp("2024-02-01").unwrap();
        assert!(full > day);
        assert!(parse_timestamp("yesterday-ish").is_none());

        let morning = parse_timestamp("2024-02-01T09:00:00").unwrap();
        let evening = parse_timestamp("2024-02-01T18:00:00.250").unwrap();
        assert!(evening > morning);
        assert!(morning > day);
    }

    #[test]
    fn test_write_json_atomic_leaves_target_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        write_json_atomic(&path, &serde_json::json!({"a": 1})).unwrap();
        fs::create_dir(path.with_extension("json.tmp")).unwrap();

        assert!(write_json_atomic(&path, &serde_json::json!({"a": 2})).is_err());
        let on_disk: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["a"], 1);
    }

    #[test]
    fn test_now_iso_is_sortable() {
        let ts = now_iso();
        assert!(ts.ends_with('Z'));
        assert!(parse_timestamp(&ts).is_some());
    }
}
