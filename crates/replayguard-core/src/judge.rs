//! Aggregates diffs into per-interaction verdicts and per-session scores
//! (spec §4.E).

use crate::differ::{diff, Diff, DiffKind};
use crate::session::Response;
use crate::tolerance::{ToleranceClassifier, ToleranceConfig};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Selects which [`ToleranceConfig`] backs a comparison (spec §4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonMode {
    /// Tolerance is zeroed out; any non-zero total fails the run.
    Strict,
    /// Every tolerance feature is force-enabled with defaults.
    Tolerant,
    /// Whatever [`ToleranceConfig`] was supplied.
    Default,
}

impl ComparisonMode {
    /// Resolve the effective tolerance configuration for this mode.
    pub fn resolve(self, supplied: &ToleranceConfig) -> ToleranceConfig {
        match self {
            Self::Strict => ToleranceConfig::strict(),
            Self::Tolerant => ToleranceConfig::tolerant(),
            Self::Default => supplied.clone(),
        }
    }
}

/// Counts of header-level differences for one interaction.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HeaderDiffCounts {
    /// Headers present only in the replayed response.
    pub added: Vec<String>,
    /// Headers present only in the recorded response.
    pub removed: Vec<String>,
    /// Headers present in both but with different values.
    pub modified: Vec<String>,
    /// `added.len() + removed.len() + modified.len()`.
    pub total: usize,
}

/// Counts of body-level differences for one interaction.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BodyDiffCounts {
    /// Fields present only in the replayed body.
    pub added: Vec<String>,
    /// Fields present only in the recorded body. Always breaking.
    pub removed: Vec<String>,
    /// Fields with differing leaf values of the same type.
    pub modified: Vec<String>,
    /// Fields whose runtime type category changed. Always breaking.
    pub type_changed: Vec<TypeChange>,
    /// Differences judged semantically equivalent by the tolerance engine.
    pub tolerated: Vec<String>,
    /// Sum of added/removed/modified/type_changed (tolerated diffs are excluded).
    pub total: usize,
}

/// A single type-change difference, with the human-readable reason.
#[derive(Debug, Clone, Serialize)]
pub struct TypeChange {
    /// Path of the field that changed type.
    pub path: String,
    /// e.g. `"Type changed from string to object"`.
    pub reason: String,
}

/// Verdict for one interaction (spec §3 `ComparisonResult`).
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonResult {
    /// Whether recorded and replayed status codes matched.
    pub status_match: bool,
    /// Header-level diff breakdown.
    pub header_diffs: HeaderDiffCounts,
    /// Body-level diff breakdown.
    pub body_diffs: BodyDiffCounts,
    /// `status_match ∧ no header adds/removes ∧ no body removes/type-changes/modifications`.
    pub is_compatible: bool,
    /// `is_compatible ∨ effective_changes == 0`.
    pub is_effectively_compatible: bool,
}

impl ComparisonResult {
    /// `total_changes - tolerated_changes` for this interaction.
    pub fn effective_changes(&self) -> usize {
        self.header_diffs.total + self.body_diffs.total
    }

    /// Total changes including tolerated ones, for session-level tallies.
    pub fn total_changes(&self) -> usize {
        self.effective_changes() + self.body_diffs.tolerated.len()
    }
}

/// Judge one interaction by diffing its recorded and replayed responses.
pub fn judge_interaction(recorded: &Response, replayed: &Response, tolerance: &ToleranceConfig) -> ComparisonResult {
    let status_match = recorded.status_code == replayed.status_code;

    let header_diffs = diff_headers(&recorded.headers, &replayed.headers, tolerance);
    let body_diffs = diff_bodies(recorded.body.as_ref(), replayed.body.as_ref(), tolerance);

    let is_compatible = status_match
        && header_diffs.added.is_empty()
        && header_diffs.removed.is_empty()
        && body_diffs.removed.is_empty()
        && body_diffs.type_changed.is_empty()
        && body_diffs.modified.is_empty();

    let mut result = ComparisonResult {
        status_match,
        header_diffs,
        body_diffs,
        is_compatible,
        is_effectively_compatible: false,
    };
    result.is_effectively_compatible = result.is_compatible || result.effective_changes() == 0;
    result
}

fn diff_headers(recorded: &BTreeMap<String, String>, replayed: &BTreeMap<String, String>, tolerance: &ToleranceConfig) -> HeaderDiffCounts {
    let ignore: Vec<String> = tolerance.ignore_headers.iter().map(|h| h.to_lowercase()).collect();
    let keep = |k: &&String| !ignore.contains(&k.to_lowercase());

    let mut added = Vec::new();
    let mut removed = Vec::new();
    let mut modified = Vec::new();

    let mut keys: Vec<&String> = recorded.keys().chain(replayed.keys()).filter(keep).collect();
    keys.sort();
    keys.dedup();

    for key in keys {
        match (recorded.get(key), replayed.get(key)) {
            (Some(r), Some(p)) if r != p => modified.push(key.clone()),
            (Some(_), Some(_)) => {}
            (Some(_), None) => removed.push(key.clone()),
            (None, Some(_)) => added.push(key.clone()),
            (None, None) => unreachable!("key came from the union of both maps"),
        }
    }

    let total = added.len() + removed.len() + modified.len();
    HeaderDiffCounts { added, removed, modified, total }
}

fn diff_bodies(recorded: Option<&Value>, replayed: Option<&Value>, tolerance: &ToleranceConfig) -> BodyDiffCounts {
    let recorded = recorded.cloned().unwrap_or(Value::Null);
    let replayed = replayed.cloned().unwrap_or(Value::Null);
    let classifier = ToleranceClassifier::new(tolerance);
    let diffs = diff(&recorded, &replayed, &classifier);

    let mut counts = BodyDiffCounts::default();
    for d in &diffs {
        if d.tolerated {
            counts.tolerated.push(d.path.clone());
            continue;
        }
        match d.kind {
            DiffKind::Added => counts.added.push(d.path.clone()),
            DiffKind::Removed => counts.removed.push(d.path.clone()),
            DiffKind::Modified => counts.modified.push(d.path.clone()),
            DiffKind::TypeChanged => counts.type_changed.push(TypeChange {
                path: d.path.clone(),
                reason: d.reason.clone().unwrap_or_default(),
            }),
        }
    }
    counts.total = counts.added.len() + counts.removed.len() + counts.modified.len() + counts.type_changed.len();
    counts
}

/// Aggregate summary over an entire session (spec §3 `SessionResult.summary`).
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionSummary {
    /// Total interactions considered.
    pub total: usize,
    /// Interactions judged compatible.
    pub compatible: usize,
    /// Interactions judged incompatible.
    pub incompatible: usize,
    /// Interactions that errored during replay.
    pub errors: usize,
    /// Sum of `total_changes()` across interactions.
    pub total_changes: usize,
    /// Sum of tolerated differences across interactions.
    pub tolerated_changes: usize,
    /// `total_changes - tolerated_changes`.
    pub effective_changes: usize,
    /// `100 * compatible / total` (0 when total is 0).
    pub compatibility_score: f64,
    /// `100 * effective_compatible / total` (0 when total is 0).
    pub effective_compatibility_score: f64,
}

/// Fold a sequence of per-interaction verdicts into a [`SessionSummary`].
///
/// `errored` marks interactions that failed before a [`ComparisonResult`]
/// could be produced (spec §4.I failure semantics).
pub fn summarize<'a>(results: impl Iterator<Item = Option<&'a ComparisonResult>>) -> SessionSummary {
    let mut summary = SessionSummary::default();
    let mut effective_compatible = 0usize;

    for result in results {
        summary.total += 1;
        match result {
            None => summary.errors += 1,
            Some(r) => {
                if r.is_compatible {
                    summary.compatible += 1;
                } else {
                    summary.incompatible += 1;
                }
                if r.is_effectively_compatible {
                    effective_compatible += 1;
                }
                summary.total_changes += r.total_changes();
                summary.tolerated_changes += r.body_diffs.tolerated.len();
                summary.effective_changes += r.effective_changes();
            }
        }
    }

    summary.compatibility_score = if summary.total == 0 {
        0.0
    } else {
        100.0 * summary.compatible as f64 / summary.total as f64
    };
    summary.effective_compatibility_score = if summary.total == 0 {
        0.0
    } else {
        100.0 * effective_compatible as f64 / summary.total as f64
    };

    summary
}

/// Build a canonical JSON body keyed by interaction index, for tests that
/// need a stable ordering guarantee distinct from a `BTreeMap`.
pub fn ordered_object(pairs: impl IntoIterator<Item = (String, Value)>) -> Value {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert(k, v);
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Response;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn response(status: u16, body: Value) -> Response {
        Response {
            status_code: status,
            status_message: None,
            headers: BTreeMap::new(),
            body: Some(body),
        }
    }

    #[test]
    fn scenario_s1_single_interaction_session_scores_zero() {
        let recorded = response(200, json!({"products": [{"id": 1}], "count": 1}));
        let replayed = response(200, json!({"products": [{"id": 1, "inStock": true}]}));
        let result = judge_interaction(&recorded, &replayed, &ToleranceConfig::default());

        assert!(!result.is_compatible);
        assert!(result.body_diffs.removed.contains(&"count".to_string()));
        assert!(result.body_diffs.added.contains(&"products[0].inStock".to_string()));

        let summary = summarize(std::iter::once(Some(&result)));
        assert_eq!(summary.compatibility_score, 0.0);
    }

    #[test]
    fn header_additions_are_breaking() {
        let mut replayed_headers = BTreeMap::new();
        replayed_headers.insert("x-new".to_string(), "1".to_string());
        let recorded = Response { status_code: 200, status_message: None, headers: BTreeMap::new(), body: None };
        let replayed = Response { status_code: 200, status_message: None, headers: replayed_headers, body: None };
        let result = judge_interaction(&recorded, &replayed, &ToleranceConfig::default());
        assert!(!result.is_compatible);
    }

    #[test]
    fn strict_mode_zeroes_tolerance() {
        let recorded = response(200, json!({"created": "2023-01-01T12:00:00Z"}));
        let replayed = response(200, json!({"created": "2023-01-01T12:00:03Z"}));
        let strict = ComparisonMode::Strict.resolve(&ToleranceConfig::tolerant());
        let result = judge_interaction(&recorded, &replayed, &strict);
        assert!(result.body_diffs.tolerated.is_empty());
        let summary = summarize(std::iter::once(Some(&result)));
        assert_eq!(summary.tolerated_changes, 0);
        assert_eq!(summary.effective_compatibility_score, summary.compatibility_score);
    }

    #[test]
    fn scenario_s4_uuid_normalization_effective_compat() {
        let recorded = response(200, json!({"id": "550e8400-e29b-41d4-a716-446655440000"}));
        let replayed = response(200, json!({"id": "123e4567-e89b-12d3-a456-426614174000"}));
        let tolerant = ToleranceConfig::tolerant();
        let result = judge_interaction(&recorded, &replayed, &tolerant);
        assert!(result.body_diffs.tolerated.len() >= 1);
        assert_eq!(result.effective_changes(), 0);
        assert!(result.is_effectively_compatible);
    }

    #[test]
    fn monotonicity_enabling_tolerance_never_lowers_effective_score() {
        let recorded = response(200, json!({"created": "2023-01-01T12:00:00Z"}));
        let replayed = response(200, json!({"created": "2023-01-01T12:00:03Z"}));

        let off = ToleranceConfig { timestamp_drift_seconds: 0.0, ..ToleranceConfig::default() };
        let on = ToleranceConfig { timestamp_drift_seconds: 5.0, ..ToleranceConfig::default() };

        let r_off = judge_interaction(&recorded, &replayed, &off);
        let r_on = judge_interaction(&recorded, &replayed, &on);

        let s_off = summarize(std::iter::once(Some(&r_off)));
        let s_on = summarize(std::iter::once(Some(&r_on)));

        assert!(s_on.effective_compatibility_score >= s_off.effective_compatibility_score);
    }

    #[test]
    fn invariant_total_equals_sum_of_buckets() {
        let results = vec![
            Some(judge_interaction(&response(200, json!({})), &response(200, json!({})), &ToleranceConfig::default())),
            None,
        ];
        let summary = summarize(results.iter().map(|r| r.as_ref()));
        assert_eq!(summary.total, summary.compatible + summary.incompatible + summary.errors);
    }
}
