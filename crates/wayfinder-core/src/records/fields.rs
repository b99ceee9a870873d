//! Field access helpers for schemaless records.
//!
//! Source tables are not uniform: the same concept may be stored as
//! `title`, `name`, or `Title`. Lookups take a list of candidate keys and
//! return the first non-empty value.

use serde_json::Value;
use wayfinder_types::record::Record;

/// First non-empty string among `keys`. Numbers are rendered as text.
pub fn first_text(record: &Record, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match record.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Integer id from `Id` or `id`, accepting numeric strings.
pub fn record_id(record: &Record) -> Option<i64> {
    ["Id", "id"].iter().find_map(|key| as_i64(record.get(*key)?))
}

/// Interpret a JSON value as an integer.
pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_first_text_skips_empty() {
        let r = record(json!({"title": "", "name": "Han Market", "Title": "ignored"}));
        assert_eq!(first_text(&r, &["title", "name", "Title"]).as_deref(), Some("Han Market"));
        assert_eq!(first_text(&r, &["missing"]), None);
    }

    #[test]
    fn test_record_id_variants() {
        assert_eq!(record_id(&record(json!({"Id": 4}))), Some(4));
        assert_eq!(record_id(&record(json!({"id": "17"}))), Some(17));
        assert_eq!(record_id(&record(json!({"Id": null, "id": 3}))), Some(3));
        assert_eq!(record_id(&record(json!({"Id": "abc"}))), None);
        assert_eq!(record_id(&record(json!({}))), None);
    }
}
