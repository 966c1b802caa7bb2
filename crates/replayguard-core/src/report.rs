//! Machine-readable result structures (spec §3 `SessionResult`, §6.4).
//!
//! Text/table rendering is an external concern (spec §1); this module only
//! produces the structure the reporter boundary consumes.

use crate::judge::{ComparisonMode, ComparisonResult, SessionSummary};
use crate::routing::ResolverMetrics;
use serde::Serialize;

/// Outcome of replaying a single interaction.
#[derive(Debug, Clone, Serialize)]
pub struct InteractionReport {
    /// Position within the session (0-based).
    pub index: usize,
    /// The interaction's recorded timestamp.
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// The interaction's request fingerprint.
    pub request_hash: String,
    /// Method and path, for quick identification in reports.
    pub endpoint: String,
    /// Tags carried over from the interaction.
    pub tags: Vec<String>,
    /// The verdict, if replay succeeded.
    pub comparison: Option<ComparisonResult>,
    /// The error, if replay failed for this interaction (spec §4.I).
    pub error: Option<String>,
}

/// One entry in the human-facing `incompatibilities[]` list (spec §7).
#[derive(Debug, Clone, Serialize)]
pub struct Incompatibility {
    /// The offending endpoint.
    pub endpoint: String,
    /// Fields removed from the body.
    pub removed_fields: Vec<String>,
    /// Fields whose type changed, with reasons.
    pub type_changes: Vec<String>,
    /// Whether the status code itself changed.
    pub status_changed: bool,
}

/// One entry in the human-facing `toleratedChanges[]` list (spec §7).
#[derive(Debug, Clone, Serialize)]
pub struct ToleratedChange {
    /// The endpoint the tolerated difference occurred on.
    pub endpoint: String,
    /// Paths that were tolerated (timestamp drift, UUID normalization, …).
    pub paths: Vec<String>,
}

/// Optional cache/render performance block (spec §6.4, §4.G metrics).
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    /// Route-resolution cache and template metrics.
    pub resolver: ResolverMetrics,
}

/// An optional replay filter's echoed-back description (spec §4.I).
#[derive(Debug, Clone, Default, Serialize)]
pub struct FilterDescription {
    /// HTTP methods the filter restricted to.
    pub methods: Vec<String>,
    /// Route patterns the filter restricted to.
    pub routes: Vec<String>,
    /// Interaction tags the filter restricted to.
    pub interaction_tags: Vec<String>,
    /// Session tags the filter restricted to.
    pub session_tags: Vec<String>,
}

/// Interaction counts before and after filtering (spec §4.I).
#[derive(Debug, Clone, Serialize)]
pub struct FilteredStats {
    /// Interactions present in the original session.
    pub original_count: usize,
    /// Interactions that survived the filter.
    pub filtered_count: usize,
}

/// The full result of replaying one session (spec §3 `SessionResult`, §6.4).
#[derive(Debug, Clone, Serialize)]
pub struct SessionResult {
    /// The session's stable identifier.
    pub session_id: String,
    /// When the report was produced.
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Which comparison mode produced this report.
    pub comparison_mode: ComparisonModeName,
    /// The contract file used for synthesis, if any.
    pub contract_file: Option<String>,
    /// Aggregate scores and counts.
    pub summary: SessionSummary,
    /// Per-interaction outcomes, in recording order.
    pub interaction_results: Vec<InteractionReport>,
    /// The filter applied before replay, if any.
    pub filter: Option<FilterDescription>,
    /// Interaction counts before/after the filter.
    pub filtered_stats: Option<FilteredStats>,
    /// Cache/render metrics, when `--performance` was requested.
    pub performance: Option<PerformanceReport>,
}

/// Serializable mirror of [`ComparisonMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonModeName {
    /// See [`ComparisonMode::Strict`].
    Strict,
    /// See [`ComparisonMode::Tolerant`].
    Tolerant,
    /// See [`ComparisonMode::Default`].
    Default,
}

impl From<ComparisonMode> for ComparisonModeName {
    fn from(mode: ComparisonMode) -> Self {
        match mode {
            ComparisonMode::Strict => Self::Strict,
            ComparisonMode::Tolerant => Self::Tolerant,
            ComparisonMode::Default => Self::Default,
        }
    }
}

impl SessionResult {
    /// Build the `incompatibilities[]` list described in spec §7.
    pub fn incompatibilities(&self) -> Vec<Incompatibility> {
        self.interaction_results
            .iter()
            .filter_map(|r| {
                let comparison = r.comparison.as_ref()?;
                if comparison.is_compatible {
                    return None;
                }
                Some(Incompatibility {
                    endpoint: r.endpoint.clone(),
                    removed_fields: comparison.body_diffs.removed.clone(),
                    type_changes: comparison
                        .body_diffs
                        .type_changed
                        .iter()
                        .map(|t| format!("{}: {}", t.path, t.reason))
                        .collect(),
                    status_changed: !comparison.status_match,
                })
            })
            .collect()
    }

    /// Build the `toleratedChanges[]` list described in spec §7.
    pub fn tolerated_changes(&self) -> Vec<ToleratedChange> {
        self.interaction_results
            .iter()
            .filter_map(|r| {
                let comparison = r.comparison.as_ref()?;
                if comparison.body_diffs.tolerated.is_empty() {
                    return None;
                }
                Some(ToleratedChange {
                    endpoint: r.endpoint.clone(),
                    paths: comparison.body_diffs.tolerated.clone(),
                })
            })
            .collect()
    }
}
