//! Open-ended record trees
//!
//! A record is an ordered mapping from field name to a value that is a
//! scalar, a nested record, or a sequence of records. Nothing here fixes a
//! schema: unknown fields pass through every engine untouched, and any
//! array-valued field counts as a child sequence.

use serde_json::Value;

/// A single record: ordered field map over JSON values.
pub type Record = serde_json::Map<String, Value>;

/// String form of a scalar value, used as the lookup key into the
/// identifier map. Identifiers arrive as strings in well-formed logs, but
/// legacy exports sometimes carry them as bare numbers.
pub fn scalar_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Whether a field value counts as present-and-non-empty for aliasing
/// purposes. Null, empty strings, zero, false, and empty containers all
/// count as empty.
pub fn non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Compact single-line preview of a record, for diagnostics.
pub fn preview(record: &Record) -> String {
    let rendered = Value::Object(record.clone()).to_string();
    truncate(&rendered, 200)
}

/// Truncate a line to `max` characters, appending an ellipsis when cut.
pub fn truncate(line: &str, max: usize) -> String {
    if line.chars().count() <= max {
        return line.to_string();
    }
    let head: String = line.chars().take(max).collect();
    format!("{}...", head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_key_strings_and_numbers() {
        assert_eq!(scalar_key(&json!("abc")), Some("abc".to_string()));
        assert_eq!(scalar_key(&json!(42)), Some("42".to_string()));
        assert_eq!(scalar_key(&json!(null)), None);
        assert_eq!(scalar_key(&json!([1])), None);
    }

    #[test]
    fn test_non_empty() {
        assert!(!non_empty(&json!(null)));
        assert!(!non_empty(&json!("")));
        assert!(!non_empty(&json!(0)));
        assert!(!non_empty(&json!(false)));
        assert!(!non_empty(&json!([])));
        assert!(non_empty(&json!("x")));
        assert!(non_empty(&json!(7)));
        assert!(non_empty(&json!(["a"])));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("0123456789abc", 10), "0123456789...");
    }
}
