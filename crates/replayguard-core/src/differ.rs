//! Structural diffing between two canonicalized trees (spec §4.D).
//!
//! Grounded on the teacher's `schema_diff.rs::walk`, generalized from a flat
//! `Vec<FieldError>` with a string `error_type` tag into a proper sum type
//! per design note §9 ("ad-hoc tagged-object diffs become a tagged variant").

use crate::canonical::{canonicalize, TypeCategory};
use crate::tolerance::ToleranceClassifier;
use serde_json::Value;

/// The kind of structural difference observed at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    /// Key present only on the replayed side.
    Added,
    /// Key present only on the recorded side. Always an incompatibility.
    Removed,
    /// Differing leaf values at the same path and same type category.
    Modified,
    /// Differing leaf values whose type categories differ. Always an incompatibility.
    TypeChanged,
}

/// One structural difference between a recorded and replayed value.
#[derive(Debug, Clone)]
pub struct Diff {
    /// Dotted/indexed path to the differing field (e.g. `products[0].inStock`).
    pub path: String,
    /// The kind of difference.
    pub kind: DiffKind,
    /// Human-readable explanation, set for `Removed` and `TypeChanged`.
    pub reason: Option<String>,
    /// Whether a tolerance rule judged this difference semantically equivalent.
    pub tolerated: bool,
}

impl Diff {
    /// Whether this difference, on its own, is a breaking incompatibility
    /// (spec §4.D: removals and type changes are always promoted).
    pub fn is_incompatibility(&self) -> bool {
        !self.tolerated && matches!(self.kind, DiffKind::Removed | DiffKind::TypeChanged)
    }
}

/// Walk two canonicalized trees in parallel, emitting every non-ignored
/// difference in depth-first, sorted-key order (spec §4.D determinism
/// requirement).
pub fn diff(recorded: &Value, replayed: &Value, classifier: &ToleranceClassifier<'_>) -> Vec<Diff> {
    let mut out = Vec::new();
    walk(&canonicalize(recorded), &canonicalize(replayed), "", classifier, &mut out);
    out
}

fn walk(recorded: &Value, replayed: &Value, path: &str, classifier: &ToleranceClassifier<'_>, out: &mut Vec<Diff>) {
    match (recorded, replayed) {
        (Value::Object(ro), Value::Object(po)) => {
            let mut keys: Vec<&String> = ro.keys().chain(po.keys()).collect();
            keys.sort();
            keys.dedup();

            for key in keys {
                let child_path = if path.is_empty() { key.clone() } else { format!("{path}.{key}") };
                if classifier.is_ignored(&child_path) {
                    continue;
                }

                match (ro.get(key), po.get(key)) {
                    (Some(rv), Some(pv)) => walk(rv, pv, &child_path, classifier, out),
                    (Some(_), None) => out.push(Diff {
                        path: child_path,
                        kind: DiffKind::Removed,
                        reason: Some("Field was removed".to_string()),
                        tolerated: false,
                    }),
                    (None, Some(_)) => out.push(Diff {
                        path: child_path,
                        kind: DiffKind::Added,
                        reason: None,
                        tolerated: false,
                    }),
                    (None, None) => unreachable!("key came from the union of both maps"),
                }
            }
        }
        (Value::Array(ra), Value::Array(pa)) => {
            let (ra, pa) = sort_if_tolerated(ra, pa, path, classifier);
            walk_array(&ra, &pa, path, classifier, out);
        }
        (r, p) => walk_leaf(r, p, path, classifier, out),
    }
}

fn sort_if_tolerated(
    recorded: &[Value],
    replayed: &[Value],
    path: &str,
    classifier: &ToleranceClassifier<'_>,
) -> (Vec<Value>, Vec<Value>) {
    if !classifier.should_sort_array(path) {
        return (recorded.to_vec(), replayed.to_vec());
    }
    let mut r = recorded.to_vec();
    let mut p = replayed.to_vec();
    r.sort_by_key(sort_key);
    p.sort_by_key(sort_key);
    (r, p)
}

/// Stable per-element sort key for tolerant array comparison.
///
/// The teacher's design notes call out deep JSON-stringify as a correct but
/// O(n log n · |elem|) approach and suggest a canonical per-element hash for
/// large payloads as a follow-up (see DESIGN.md); this keeps the simple,
/// correct version.
fn sort_key(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

fn walk_array(recorded: &[Value], replayed: &[Value], path: &str, classifier: &ToleranceClassifier<'_>, out: &mut Vec<Diff>) {
    let max_len = recorded.len().max(replayed.len());
    for i in 0..max_len {
        let child_path = format!("{path}[{i}]");
        match (recorded.get(i), replayed.get(i)) {
            (Some(rv), Some(pv)) => walk(rv, pv, &child_path, classifier, out),
            (Some(_), None) => out.push(Diff {
                path: child_path,
                kind: DiffKind::Removed,
                reason: Some("Field was removed".to_string()),
                tolerated: false,
            }),
            (None, Some(_)) => out.push(Diff {
                path: child_path,
                kind: DiffKind::Added,
                reason: None,
                tolerated: false,
            }),
            (None, None) => unreachable!("i is bounded by max_len"),
        }
    }
}

fn walk_leaf(recorded: &Value, replayed: &Value, path: &str, classifier: &ToleranceClassifier<'_>, out: &mut Vec<Diff>) {
    let recorded_type = TypeCategory::of(recorded);
    let replayed_type = TypeCategory::of(replayed);

    if recorded_type != replayed_type {
        out.push(Diff {
            path: path.to_string(),
            kind: DiffKind::TypeChanged,
            reason: Some(format!("Type changed from {recorded_type} to {replayed_type}")),
            tolerated: false,
        });
        return;
    }

    if recorded == replayed {
        return;
    }

    let key = last_segment(path);
    if classifier.is_timestamp(key, recorded) && classifier.is_timestamp(key, replayed) {
        if classifier.timestamps_equivalent(recorded, replayed) {
            out.push(Diff { path: path.to_string(), kind: DiffKind::Modified, reason: None, tolerated: true });
            return;
        }
    } else if classifier.is_uuid(key, recorded) && classifier.is_uuid(key, replayed) && classifier.uuids_equivalent() {
        out.push(Diff { path: path.to_string(), kind: DiffKind::Modified, reason: None, tolerated: true });
        return;
    }

    out.push(Diff { path: path.to_string(), kind: DiffKind::Modified, reason: None, tolerated: false });
}

fn last_segment(path: &str) -> &str {
    path.rsplit(['.', '[']).next().unwrap_or(path).trim_end_matches(']')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tolerance::ToleranceConfig;
    use serde_json::json;

    fn run(recorded: Value, replayed: Value, config: &ToleranceConfig) -> Vec<Diff> {
        let classifier = ToleranceClassifier::new(config);
        diff(&recorded, &replayed, &classifier)
    }

    #[test]
    fn scenario_s1_removed_field_and_added_field() {
        let recorded = json!({"products": [{"id": 1}], "count": 1});
        let replayed = json!({"products": [{"id": 1, "inStock": true}]});
        let config = ToleranceConfig::default();
        let diffs = run(recorded, replayed, &config);

        assert!(diffs.iter().any(|d| d.path == "count" && d.kind == DiffKind::Removed));
        assert!(diffs.iter().any(|d| d.path == "products[0].inStock" && d.kind == DiffKind::Added));
    }

    #[test]
    fn scenario_s3_type_change() {
        let recorded = json!({"description": "x"});
        let replayed = json!({"description": {"short": "x"}});
        let config = ToleranceConfig::default();
        let diffs = run(recorded, replayed, &config);

        let d = diffs.iter().find(|d| d.path == "description").unwrap();
        assert_eq!(d.kind, DiffKind::TypeChanged);
        assert_eq!(d.reason.as_deref(), Some("Type changed from string to object"));
        assert!(d.is_incompatibility());
    }

    #[test]
    fn scenario_s4_uuid_tolerated() {
        let recorded = json!({"id": "550e8400-e29b-41d4-a716-446655440000"});
        let replayed = json!({"id": "123e4567-e89b-12d3-a456-426614174000"});
        let config = ToleranceConfig::tolerant();
        let diffs = run(recorded, replayed, &config);

        let d = diffs.iter().find(|d| d.path == "id").unwrap();
        assert!(d.tolerated);
        assert!(!d.is_incompatibility());
    }

    #[test]
    fn additions_are_not_incompatibilities() {
        let recorded = json!({"a": 1});
        let replayed = json!({"a": 1, "b": 2});
        let config = ToleranceConfig::default();
        let diffs = run(recorded, replayed, &config);
        let d = diffs.iter().find(|d| d.path == "b").unwrap();
        assert_eq!(d.kind, DiffKind::Added);
        assert!(!d.is_incompatibility());
    }

    #[test]
    fn removed_field_with_ignore_is_not_emitted() {
        let recorded = json!({"secret": "x", "a": 1});
        let replayed = json!({"a": 1});
        let config = ToleranceConfig {
            ignore_fields: vec!["secret".to_string()],
            ..ToleranceConfig::default()
        };
        let diffs = run(recorded, replayed, &config);
        assert!(diffs.is_empty());
    }

    #[test]
    fn array_reordering_tolerated_when_sort_enabled() {
        let recorded = json!({"items": [1, 2, 3]});
        let replayed = json!({"items": [3, 2, 1]});
        let config = ToleranceConfig {
            sort_arrays: true,
            ..ToleranceConfig::default()
        };
        let diffs = run(recorded, replayed, &config);
        assert!(diffs.is_empty());
    }

    #[test]
    fn array_reordering_not_tolerated_by_default() {
        let recorded = json!({"items": [1, 2, 3]});
        let replayed = json!({"items": [3, 2, 1]});
        let config = ToleranceConfig::default();
        let diffs = run(recorded, replayed, &config);
        assert!(!diffs.is_empty());
    }

    #[test]
    fn diff_is_deterministic() {
        let recorded = json!({"b": 1, "a": {"z": 1, "y": 2}});
        let replayed = json!({"a": {"y": 3, "z": 1}, "b": 2});
        let config = ToleranceConfig::default();
        let d1 = run(recorded.clone(), replayed.clone(), &config);
        let d2 = run(recorded, replayed, &config);
        let paths1: Vec<&str> = d1.iter().map(|d| d.path.as_str()).collect();
        let paths2: Vec<&str> = d2.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths1, paths2);
    }
}
