//! Tolerance rules applied before diffing (spec §4.C).
//!
//! A pure, stateless predicate layer: given a `(path, key, value)` triple it
//! decides whether a field is a timestamp, a UUID, should have its array
//! sorted before comparison, or should be ignored outright.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tolerance configuration (spec §3 `ToleranceConfig`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToleranceConfig {
    /// Maximum allowed timestamp drift, in seconds.
    pub timestamp_drift_seconds: f64,
    /// Whether two UUID-shaped values are always considered equivalent.
    pub ignore_uuids: bool,
    /// Whether arrays are sorted before comparison when `array_fields` is empty.
    pub sort_arrays: bool,
    /// Exact or path-prefix fields whose arrays should be sorted.
    pub array_fields: Vec<String>,
    /// Name fragments (case-insensitive) that mark a key as timestamp-like.
    pub timestamp_fields: Vec<String>,
    /// Name fragments (case-insensitive) that mark a key as UUID-like.
    pub uuid_fields: Vec<String>,
    /// Path patterns or regexes for fields to ignore entirely.
    pub ignore_fields: Vec<String>,
    /// Lowercased header names to ignore when diffing headers.
    pub ignore_headers: Vec<String>,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            timestamp_drift_seconds: 0.0,
            ignore_uuids: false,
            sort_arrays: false,
            array_fields: Vec::new(),
            timestamp_fields: vec!["time".into(), "date".into(), "created".into(), "updated".into()],
            uuid_fields: vec!["id".into(), "uuid".into(), "guid".into()],
            ignore_fields: Vec::new(),
            ignore_headers: vec!["date".into(), "set-cookie".into(), "x-request-id".into()],
        }
    }
}

impl ToleranceConfig {
    /// `strict` comparison mode: every tolerance is zeroed out (spec §4.E).
    pub fn strict() -> Self {
        Self {
            timestamp_drift_seconds: 0.0,
            ignore_uuids: false,
            sort_arrays: false,
            array_fields: Vec::new(),
            timestamp_fields: Vec::new(),
            uuid_fields: Vec::new(),
            ignore_fields: Vec::new(),
            ignore_headers: Vec::new(),
        }
    }

    /// `tolerant` comparison mode: force-enable every tolerance with sane defaults.
    pub fn tolerant() -> Self {
        Self {
            timestamp_drift_seconds: 5.0,
            ignore_uuids: true,
            sort_arrays: true,
            ..Self::default()
        }
    }
}

const MS_PLAUSIBLE_FLOOR: f64 = 946_684_800_000.0; // 2000-01-01T00:00:00Z
const SECONDS_UPPER_BOUND: f64 = 4_102_444_800.0; // 2100-01-01T00:00:00Z

static ISO_TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:?\d{2})?$").unwrap()
});

static UUID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-?[0-9a-f]{4}-?[0-9a-f]{4}-?[0-9a-f]{4}-?[0-9a-f]{12}$").unwrap()
});

/// Stateless classifier over `(path, key, value)` triples.
pub struct ToleranceClassifier<'a> {
    config: &'a ToleranceConfig,
}

impl<'a> ToleranceClassifier<'a> {
    /// Build a classifier bound to a tolerance configuration.
    pub fn new(config: &'a ToleranceConfig) -> Self {
        Self { config }
    }

    /// Detect whether a value at `key` looks like a timestamp.
    pub fn is_timestamp(&self, key: &str, value: &Value) -> bool {
        let key_lower = key.to_lowercase();
        let name_matches = self
            .config
            .timestamp_fields
            .iter()
            .any(|fragment| key_lower.contains(&fragment.to_lowercase()));
        if name_matches {
            return true;
        }
        match value {
            Value::String(s) => ISO_TIMESTAMP.is_match(s),
            Value::Number(n) => n.as_f64().is_some_and(Self::plausible_epoch),
            _ => false,
        }
    }

    fn plausible_epoch(n: f64) -> bool {
        let ms = if n < SECONDS_UPPER_BOUND { n * 1000.0 } else { n };
        let now_ms = Utc::now().timestamp_millis() as f64;
        (MS_PLAUSIBLE_FLOOR..=now_ms).contains(&ms)
    }

    /// Detect whether a value at `key` looks like a UUID.
    pub fn is_uuid(&self, key: &str, value: &Value) -> bool {
        let key_lower = key.to_lowercase();
        let name_matches = self
            .config
            .uuid_fields
            .iter()
            .any(|fragment| key_lower.contains(&fragment.to_lowercase()));
        if !name_matches {
            return false;
        }
        matches!(value, Value::String(s) if UUID_PATTERN.is_match(s))
    }

    /// Whether arrays at `path` should be sorted before comparison.
    pub fn should_sort_array(&self, path: &str) -> bool {
        if self.config.array_fields.is_empty() {
            return self.config.sort_arrays;
        }
        self.config
            .array_fields
            .iter()
            .any(|field| path == field || path.starts_with(&format!("{field}.")))
    }

    /// Whether `path` is masked out of diffing entirely.
    pub fn is_ignored(&self, path: &str) -> bool {
        self.config.ignore_fields.iter().any(|pattern| {
            path == pattern
                || path.starts_with(&format!("{pattern}."))
                || Regex::new(pattern).is_ok_and(|re| re.is_match(path))
        })
    }

    /// Whether two timestamp values fall within the configured drift.
    ///
    /// An ISO-8601 string and an epoch-millisecond integer encoding the same
    /// instant compare equal here, as both are normalized to milliseconds
    /// first.
    pub fn timestamps_equivalent(&self, a: &Value, b: &Value) -> bool {
        let (Some(ms_a), Some(ms_b)) = (to_epoch_millis(a), to_epoch_millis(b)) else {
            return false;
        };
        (ms_a - ms_b).abs() <= self.config.timestamp_drift_seconds * 1000.0
    }

    /// Whether UUID tolerance makes any two UUID-shaped values equivalent.
    pub fn uuids_equivalent(&self) -> bool {
        self.config.ignore_uuids
    }
}

fn to_epoch_millis(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.timestamp_millis() as f64),
        Value::Number(n) => n.as_f64().map(|n| if n < SECONDS_UPPER_BOUND { n * 1000.0 } else { n }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_timestamp_by_field_name() {
        let config = ToleranceConfig::default();
        let classifier = ToleranceClassifier::new(&config);
        assert!(classifier.is_timestamp("createdAt", &json!("not a date")));
    }

    #[test]
    fn detects_timestamp_by_iso_format() {
        let config = ToleranceConfig::strict();
        let classifier = ToleranceClassifier::new(&config);
        assert!(classifier.is_timestamp("whatever", &json!("2023-01-01T12:00:00Z")));
        assert!(!classifier.is_timestamp("whatever", &json!("hello")));
    }

    #[test]
    fn detects_timestamp_by_plausible_millis() {
        let config = ToleranceConfig::strict();
        let classifier = ToleranceClassifier::new(&config);
        assert!(classifier.is_timestamp("x", &json!(1_700_000_000_000i64)));
        assert!(classifier.is_timestamp("x", &json!(1_700_000_000i64))); // seconds, scaled up
        assert!(!classifier.is_timestamp("x", &json!(5)));
    }

    #[test]
    fn uuid_requires_both_name_and_shape() {
        let config = ToleranceConfig::default();
        let classifier = ToleranceClassifier::new(&config);
        assert!(classifier.is_uuid("id", &json!("550e8400-e29b-41d4-a716-446655440000")));
        assert!(!classifier.is_uuid("id", &json!("not-a-uuid")));
        assert!(!classifier.is_uuid("name", &json!("550e8400-e29b-41d4-a716-446655440000")));
    }

    #[test]
    fn zero_drift_rejects_any_difference() {
        let config = ToleranceConfig {
            timestamp_drift_seconds: 0.0,
            ..ToleranceConfig::default()
        };
        let classifier = ToleranceClassifier::new(&config);
        assert!(!classifier.timestamps_equivalent(&json!("2023-01-01T12:00:00Z"), &json!("2023-01-01T12:00:01Z")));
    }

    #[test]
    fn iso_and_epoch_millis_compare_equal() {
        let config = ToleranceConfig {
            timestamp_drift_seconds: 1.0,
            ..ToleranceConfig::default()
        };
        let classifier = ToleranceClassifier::new(&config);
        let iso = json!("2023-01-01T00:00:00Z");
        let millis = json!(1_672_531_200_000i64);
        assert!(classifier.timestamps_equivalent(&iso, &millis));
    }

    #[test]
    fn array_sort_decision_respects_field_list() {
        let config = ToleranceConfig {
            sort_arrays: true,
            array_fields: vec!["items".into()],
            ..ToleranceConfig::default()
        };
        let classifier = ToleranceClassifier::new(&config);
        assert!(classifier.should_sort_array("items"));
        assert!(classifier.should_sort_array("items.tags"));
        assert!(!classifier.should_sort_array("other"));
    }

    #[test]
    fn empty_field_list_with_sort_enabled_sorts_everything() {
        let config = ToleranceConfig {
            sort_arrays: true,
            array_fields: Vec::new(),
            ..ToleranceConfig::default()
        };
        let classifier = ToleranceClassifier::new(&config);
        assert!(classifier.should_sort_array("anything"));
    }

    #[test]
    fn ignore_field_matches_exact_prefix_and_regex() {
        let config = ToleranceConfig {
            ignore_fields: vec!["secret".into(), r"^debug\..*$".into()],
            ..ToleranceConfig::default()
        };
        let classifier = ToleranceClassifier::new(&config);
        assert!(classifier.is_ignored("secret"));
        assert!(classifier.is_ignored("secret.nested"));
        assert!(classifier.is_ignored("debug.trace"));
        assert!(!classifier.is_ignored("visible"));
    }
}
