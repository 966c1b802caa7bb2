//! The replay engine: orchestrates per-interaction replay, judging, and
//! result accumulation (spec §4.I).
//!
//! Single-threaded and cooperative, matching the teacher's
//! `record_replay.rs` handler style: interactions are replayed one at a
//! time, in recording order, so behavior stays deterministic and easy to
//! reason about under `--filter-*` flags.

use crate::config::ReplayConfig;
use crate::context::ContextBuilder;
use crate::error::{Error, Result};
use crate::judge::{judge_interaction, summarize, ComparisonMode, ComparisonResult};
use crate::report::{FilterDescription, FilteredStats, InteractionReport, PerformanceReport, SessionResult};
use crate::routing::{RouteMatch, RouteResolver};
use crate::session::{Interaction, Request, Response, Session};
use crate::template::HelperRegistry;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Which interactions a replay run should consider (spec §4.I).
#[derive(Debug, Clone, Default)]
pub struct ReplayFilter {
    /// Restrict to these HTTP methods, case-insensitive. Empty means "all".
    pub methods: Vec<String>,
    /// Restrict to interactions whose path matches one of these route
    /// globs/substrings. Empty means "all".
    pub routes: Vec<String>,
    /// Restrict to interactions carrying at least one of these tags. Empty means "all".
    pub interaction_tags: Vec<String>,
    /// Restrict to sessions carrying at least one of these tags. Empty means "all".
    pub session_tags: Vec<String>,
}

impl ReplayFilter {
    fn is_empty(&self) -> bool {
        self.methods.is_empty() && self.routes.is_empty() && self.interaction_tags.is_empty() && self.session_tags.is_empty()
    }

    fn session_matches(&self, session: &Session) -> bool {
        self.session_tags.is_empty() || self.session_tags.iter().any(|t| session.metadata.tags.contains(t))
    }

    /// Whether `interaction` survives this filter (AND across dimensions,
    /// spec §4.I: "a filter is the conjunction of whichever facets are set").
    fn interaction_matches(&self, interaction: &Interaction) -> bool {
        let method_ok = self.methods.is_empty()
            || self.methods.iter().any(|m| m.eq_ignore_ascii_case(&interaction.request.method));
        let route_ok = self.routes.is_empty()
            || self.routes.iter().any(|pattern| route_matches(pattern, &interaction.request.path));
        let tags_ok = self.interaction_tags.is_empty()
            || self.interaction_tags.iter().any(|t| interaction.tags.contains(t));
        method_ok && route_ok && tags_ok
    }

    fn describe(&self) -> Option<FilterDescription> {
        if self.is_empty() {
            return None;
        }
        Some(FilterDescription {
            methods: self.methods.clone(),
            routes: self.routes.clone(),
            interaction_tags: self.interaction_tags.clone(),
            session_tags: self.session_tags.clone(),
        })
    }
}

/// Substring-or-glob match against a recorded path. A pattern containing `*`
/// matches any run of characters; anything else is a plain substring check.
fn route_matches(pattern: &str, path: &str) -> bool {
    if !pattern.contains('*') {
        return path.contains(pattern);
    }
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    regex::Regex::new(&format!("^{escaped}$")).is_ok_and(|re| re.is_match(path))
}

/// Orchestrates replay of a session against either compiled templates or a
/// live target (spec §4.I).
pub struct ReplayEngine {
    config: ReplayConfig,
    comparison_mode: ComparisonMode,
    resolver: RouteResolver,
    context_builder: ContextBuilder,
    helpers: HelperRegistry,
    http_client: Option<reqwest::Client>,
}

impl ReplayEngine {
    /// Build an engine. `resolver` should already carry every route the
    /// session needs (from a contract import, a preloaded set, or both).
    pub fn new(config: ReplayConfig, comparison_mode: ComparisonMode, resolver: RouteResolver) -> Result<Self> {
        // Built regardless of `use_dynamic_responses`: a dynamic run still
        // falls back to live HTTP for any interaction whose route doesn't
        // resolve (spec §4.I step 1).
        let http_client = Some(
            reqwest::Client::builder()
                .timeout(Duration::from_secs(config.request_timeout_seconds))
                .build()
                .map_err(Error::from)?,
        );

        if config.preload_templates {
            resolver.preload();
        }

        Ok(Self {
            config,
            comparison_mode,
            resolver,
            context_builder: ContextBuilder::new(),
            helpers: HelperRegistry::with_builtins(),
            http_client,
        })
    }

    /// Register an additional context-building step (spec §4.F).
    pub fn register_context_step(&mut self, step: impl crate::context::ContextFn + 'static) {
        self.context_builder.register(step);
    }

    /// Register a custom template helper (spec §4.F).
    pub fn register_helper(&mut self, name: impl Into<String>, helper: impl crate::template::Helper + 'static) {
        self.helpers.register(name, helper);
    }

    /// Replay every interaction in `session` that survives `filter`,
    /// producing a full [`SessionResult`] (spec §4.I, §6.4).
    pub async fn replay(&self, session: &Session, filter: &ReplayFilter, want_performance: bool) -> SessionResult {
        let tolerance = self.comparison_mode.resolve(&self.config.tolerance);
        let original_count = session.interactions.len();

        let session_passes_filter = filter.session_matches(session);
        let mut interaction_results = Vec::with_capacity(original_count);
        let mut comparisons: Vec<Option<ComparisonResult>> = Vec::with_capacity(original_count);

        for (index, interaction) in session.interactions.iter().enumerate() {
            if !session_passes_filter || !filter.interaction_matches(interaction) {
                continue;
            }

            let (comparison, error) = match self.replay_one(interaction, &tolerance).await {
                Ok(replayed) => {
                    let result = judge_interaction(&interaction.response, &replayed, &tolerance);
                    (Some(result), None)
                }
                Err(err) => {
                    warn!(index, error = %err, "interaction replay failed, containing failure to this interaction");
                    (None, Some(err.to_string()))
                }
            };

            comparisons.push(comparison.clone());
            interaction_results.push(InteractionReport {
                index,
                timestamp: interaction.timestamp,
                request_hash: interaction.request_hash.clone(),
                endpoint: format!("{} {}", interaction.request.method, interaction.request.path),
                tags: interaction.tags.clone(),
                comparison,
                error,
            });
        }

        let summary = summarize(comparisons.iter().map(|c| c.as_ref()));
        info!(
            session_id = %session.session_id,
            total = summary.total,
            compatible = summary.compatible,
            "replay finished"
        );

        SessionResult {
            session_id: session.session_id.clone(),
            timestamp: chrono::Utc::now(),
            comparison_mode: self.comparison_mode.into(),
            contract_file: None,
            summary,
            interaction_results,
            filter: filter.describe(),
            filtered_stats: if filter.is_empty() {
                None
            } else {
                Some(FilteredStats { original_count, filtered_count: comparisons.len() })
            },
            performance: if want_performance {
                Some(PerformanceReport { resolver: self.resolver.metrics() })
            } else {
                None
            },
        }
    }

    /// Produce the replayed response for one interaction. Dynamic mode
    /// synthesizes from a matching template route when one resolves;
    /// otherwise (dynamic mode with no matching route, or dynamic mode
    /// disabled) the request is replayed live against `targetBaseUrl`
    /// (spec §4.I step 1: "useDynamicResponses AND a matching route exists").
    async fn replay_one(&self, interaction: &Interaction, tolerance: &crate::tolerance::ToleranceConfig) -> Result<Response> {
        if self.config.use_dynamic_responses {
            if let Some(route_match) = self.resolver.resolve(&interaction.request.method, &interaction.request.path) {
                return self.render_route(&interaction.request, &route_match);
            }
        }
        self.replay_via_http(&interaction.request, tolerance).await
    }

    fn render_route(&self, request: &Request, route_match: &RouteMatch) -> Result<Response> {
        let route = &self.resolver.routes()[route_match.route_index];
        let ctx = self.context_builder.build(request, route_match);

        let start = Instant::now();
        let body = self.resolver.template_for(route_match.route_index).render(&ctx, &self.helpers)?;
        self.resolver.record_render(start.elapsed());

        Ok(Response {
            status_code: route.status_code,
            status_message: None,
            headers: route.headers.clone(),
            body: Some(body),
        })
    }

    /// Issue a live HTTP request and translate the result into a `Response`.
    /// A transport failure (connection refused, timeout, DNS, ...) is not
    /// propagated as a hard error: spec §4.I step 2 requires it to surface
    /// as a synthetic `replayError: true` response with status 500, so the
    /// interaction still flows through canonicalize/diff/judge like any
    /// other.
    async fn replay_via_http(&self, request: &Request, _tolerance: &crate::tolerance::ToleranceConfig) -> Result<Response> {
        let client = self.http_client.as_ref().ok_or_else(|| Error::invariant("http client missing in live-replay mode"))?;
        let base = self
            .config
            .target_base_url
            .as_deref()
            .ok_or_else(|| Error::input("targetBaseUrl is required for live HTTP replay"))?;

        let mut url = format!("{}{}", base.trim_end_matches('/'), request.path);
        if !request.query.is_empty() {
            let pairs: Vec<String> = request
                .query
                .iter()
                .map(|(k, v)| format!("{k}={}", query_value_string(v)))
                .collect();
            url.push('?');
            url.push_str(&pairs.join("&"));
        }

        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|e| Error::input(e.to_string()))?;
        let mut builder = client.request(method, &url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let sent: std::result::Result<(u16, std::collections::BTreeMap<String, String>, String), reqwest::Error> = async {
            let response = builder.send().await?;
            let status_code = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
                .collect();
            let text = response.text().await?;
            Ok((status_code, headers, text))
        }
        .await;

        match sent {
            Ok((status_code, headers, text)) => {
                let body =
                    if text.is_empty() { None } else { serde_json::from_str::<Value>(&text).ok().or(Some(Value::String(text))) };
                Ok(Response { status_code, status_message: None, headers, body })
            }
            Err(err) => {
                warn!(error = %err, "live replay transport error, synthesizing a replayError response");
                Ok(Response {
                    status_code: 500,
                    status_message: None,
                    headers: Default::default(),
                    body: Some(serde_json::json!({"replayError": true, "error": err.to_string()})),
                })
            }
        }
    }
}

fn query_value_string(value: &crate::session::QueryValue) -> String {
    match value.to_value() {
        Value::String(s) => s,
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}
