//! Order-independent normalization of structured values (spec §4.A).
//!
//! Canonicalization sorts mapping keys lexicographically, recurses into
//! sequences without reordering them (reordering is the tolerance engine's
//! job, §4.C), and opportunistically parses JSON-looking response-body
//! strings. It never fails: every [`serde_json::Value`] has a canonical form.

use serde_json::{Map, Value};

/// Canonicalize a structured value for hashing or diffing.
///
/// Idempotent: `canonicalize(&canonicalize(x))` equals `canonicalize(x)`.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                // `Map` insertion order is preserved on serialization; sorting
                // keys before insertion is what makes the encoding stable.
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::String(s) => canonicalize_string(s),
        Value::Number(n) => canonicalize_number(n),
        other => other.clone(),
    }
}

/// Normalize a whole-valued float to its integer representation, so `1` and
/// `1.0` canonicalize identically. `serde_json::Number`'s `PartialEq` is
/// representation-sensitive (an int-backed and a float-backed `Number` never
/// compare equal even when numerically equal), which would otherwise surface
/// as a spurious `Modified` diff for any field that happens to round-trip
/// through a float-producing encoder.
fn canonicalize_number(n: &serde_json::Number) -> Value {
    if n.is_i64() || n.is_u64() {
        return Value::Number(n.clone());
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Value::from(f as i64),
        _ => Value::Number(n.clone()),
    }
}

/// Parse a response body string as JSON when it looks like one, otherwise
/// keep it as a plain string.
///
/// Only strings whose first non-space character is `{` or `[` are attempted,
/// so a string like `"[redacted]"` stays opaque while `"[1,2,3]"` parses.
fn canonicalize_string(s: &str) -> Value {
    let trimmed = s.trim_start();
    let starts_structured = matches!(trimmed.chars().next(), Some('{') | Some('['));
    if starts_structured {
        if let Ok(parsed) = serde_json::from_str::<Value>(trimmed) {
            return canonicalize(&parsed);
        }
    }
    Value::String(s.to_string())
}

/// Runtime type category used to detect [`super::differ::DiffKind::TypeChanged`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    /// A JSON object.
    Object,
    /// A JSON array.
    Sequence,
    /// A JSON string.
    String,
    /// A JSON number.
    Number,
    /// A JSON boolean.
    Boolean,
    /// JSON `null`.
    Null,
}

impl TypeCategory {
    /// Classify a value's runtime type category.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Object(_) => Self::Object,
            Value::Array(_) => Self::Sequence,
            Value::String(_) => Self::String,
            Value::Number(_) => Self::Number,
            Value::Bool(_) => Self::Boolean,
            Value::Null => Self::Null,
        }
    }
}

impl std::fmt::Display for TypeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Object => "object",
            Self::Sequence => "array",
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Null => "null",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_object_keys() {
        let value = json!({"b": 1, "a": 2});
        let canon = canonicalize(&value);
        let keys: Vec<&String> = canon.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn preserves_array_order() {
        let value = json!([3, 1, 2]);
        assert_eq!(canonicalize(&value), json!([3, 1, 2]));
    }

    #[test]
    fn is_idempotent_on_permuted_keys() {
        let a = json!({"x": {"b": 1, "a": 2}, "y": [1, 2]});
        let b = json!({"y": [1, 2], "x": {"a": 2, "b": 1}});
        assert_eq!(canonicalize(&a), canonicalize(&b));
        assert_eq!(canonicalize(&canonicalize(&a)), canonicalize(&a));
    }

    #[test]
    fn parses_json_looking_body_strings() {
        let value = json!("{\"a\":1}");
        assert_eq!(canonicalize(&value), json!({"a": 1}));
    }

    #[test]
    fn leaves_non_json_strings_alone() {
        let value = json!("[redacted]");
        assert_eq!(canonicalize(&value), json!("[redacted]"));
    }

    #[test]
    fn distinguishes_null_from_missing() {
        let a = json!({"a": null});
        let b = json!({});
        assert_ne!(canonicalize(&a), canonicalize(&b));
    }

    #[test]
    fn numbers_compare_by_value_not_text() {
        assert_eq!(canonicalize(&json!(1.0)), canonicalize(&json!(1)));
        assert_eq!(canonicalize(&json!(2.5)), json!(2.5));
        assert_eq!(canonicalize(&json!(-3.0)), json!(-3));
    }
}
