//! Route registration and request-to-route resolution with caching
//! (spec §4.G).
//!
//! Path-parameter extraction is grounded on the teacher's
//! `openapi/route.rs::extract_path_parameters` (which walks `{name}`
//! OpenAPI templates); replayguard routes use `:name` segments instead
//! (spec §3 `Route`), so the walker below is adapted to colon syntax and
//! paired with a segment matcher in the style of the teacher's
//! `routing.rs::RouteRegistry::matches_path`.

use crate::template::Template;
use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// A registered route: pattern, method, and the JSON skeleton it synthesizes
/// from (spec §3 `Route`). The skeleton compiles into a [`Template`] lazily,
/// on first render, unless the resolver preloads it eagerly (spec §5:
/// "compiled lazily on first use, or eagerly via preload").
#[derive(Debug)]
pub struct Route {
    /// Path pattern using `:name` segments (e.g. `/api/products/:id`).
    pub pattern: String,
    /// HTTP method, or `"*"` to match any method.
    pub method: String,
    /// Status code the synthesized response carries.
    pub status_code: u16,
    /// Extra headers the synthesized response carries.
    pub headers: BTreeMap<String, String>,
    skeleton: Value,
    compiled: OnceCell<Template>,
}

impl Clone for Route {
    fn clone(&self) -> Self {
        let compiled = OnceCell::new();
        if let Some(template) = self.compiled.get() {
            let _ = compiled.set(template.clone());
        }
        Self {
            pattern: self.pattern.clone(),
            method: self.method.clone(),
            status_code: self.status_code,
            headers: self.headers.clone(),
            skeleton: self.skeleton.clone(),
            compiled,
        }
    }
}

impl Route {
    /// A route whose template isn't compiled until it's first needed.
    pub fn new(pattern: impl Into<String>, method: impl Into<String>, status_code: u16, headers: BTreeMap<String, String>, skeleton: Value) -> Self {
        Self { pattern: pattern.into(), method: method.into(), status_code, headers, skeleton, compiled: OnceCell::new() }
    }

    /// This route's compiled template, compiling it now (and counting the
    /// compilation) if it hasn't run yet.
    fn ensure_compiled(&self, metrics: &AtomicResolverMetrics) -> &Template {
        self.compiled.get_or_init(|| {
            metrics.template_compilations.fetch_add(1, Ordering::Relaxed);
            Template::from_value(self.skeleton.clone())
        })
    }
}

/// A route match: the matched route's index and its extracted path parameters.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// Index into [`RouteResolver`]'s route table.
    pub route_index: usize,
    /// Extracted `:name` path parameters.
    pub params: BTreeMap<String, String>,
}

/// Counters tracked by the resolver (spec §4.G).
#[derive(Debug, Default, Serialize)]
pub struct ResolverMetrics {
    /// Cache hits on [`RouteResolver::resolve`].
    pub cache_hits: u64,
    /// Cache misses that required a full route scan.
    pub cache_misses: u64,
    /// Number of templates compiled.
    pub template_compilations: u64,
    /// Number of template renders performed.
    pub template_renders: u64,
    /// Total render time across all renders, in microseconds.
    pub total_render_time_micros: u64,
}

impl ResolverMetrics {
    /// Average render time in microseconds, or 0 if no renders happened.
    pub fn average_render_time_micros(&self) -> u64 {
        if self.template_renders == 0 {
            0
        } else {
            self.total_render_time_micros / self.template_renders
        }
    }
}

#[derive(Debug, Default)]
struct AtomicResolverMetrics {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    template_compilations: AtomicU64,
    template_renders: AtomicU64,
    total_render_time_micros: AtomicU64,
}

impl AtomicResolverMetrics {
    fn snapshot(&self) -> ResolverMetrics {
        ResolverMetrics {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            template_compilations: self.template_compilations.load(Ordering::Relaxed),
            template_renders: self.template_renders.load(Ordering::Relaxed),
            total_render_time_micros: self.total_render_time_micros.load(Ordering::Relaxed),
        }
    }
}

/// Insertion-ordered route table with a positive/negative match cache
/// (spec §4.G).
#[derive(Debug, Default)]
pub struct RouteResolver {
    routes: Vec<Route>,
    cache: Mutex<std::collections::HashMap<String, Option<RouteMatch>>>,
    metrics: AtomicResolverMetrics,
}

impl RouteResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route. Invalidates the cache, since a new route may now
    /// match requests that previously missed.
    pub fn register(&mut self, route: Route) {
        self.routes.push(route);
        self.clear_caches();
    }

    /// All registered routes, in insertion order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Invalidate every cache entry (spec §4.G.5).
    pub fn clear_caches(&self) {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// A snapshot of the resolver's metrics counters.
    pub fn metrics(&self) -> ResolverMetrics {
        self.metrics.snapshot()
    }

    /// Resolve a request to the first matching route, caching both hits and
    /// misses (spec §4.G).
    pub fn resolve(&self, method: &str, path: &str) -> Option<RouteMatch> {
        let key = format!("{}-{}", method.to_uppercase(), path);

        if let Some(cached) = self.cache.lock().unwrap_or_else(|e| e.into_inner()).get(&key) {
            self.metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
            return cached.clone();
        }

        self.metrics.cache_misses.fetch_add(1, Ordering::Relaxed);
        let result = self.scan(method, path);
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, result.clone());
        result
    }

    fn scan(&self, method: &str, path: &str) -> Option<RouteMatch> {
        let method_upper = method.to_uppercase();
        for (index, route) in self.routes.iter().enumerate() {
            let method_matches = route.method == "*" || route.method.eq_ignore_ascii_case(&method_upper);
            if !method_matches {
                continue;
            }
            if let Some(params) = match_pattern(&route.pattern, path) {
                return Some(RouteMatch { route_index: index, params });
            }
        }
        None
    }

    /// This route's compiled template, compiling it lazily on first call.
    pub fn template_for(&self, route_index: usize) -> &Template {
        self.routes[route_index].ensure_compiled(&self.metrics)
    }

    /// Compile every registered route's template up front (spec §5, §6.3
    /// `--preload-templates`), instead of leaving each to compile lazily on
    /// its first render.
    pub fn preload(&self) {
        for route in &self.routes {
            route.ensure_compiled(&self.metrics);
        }
    }

    /// Record one template render and its duration.
    pub fn record_render(&self, duration: std::time::Duration) {
        self.metrics.template_renders.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .total_render_time_micros
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }
}

/// Match `path` against a `:name`-segmented `pattern`, returning the
/// extracted parameters on success.
fn match_pattern(pattern: &str, path: &str) -> Option<BTreeMap<String, String>> {
    let pattern_parts: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path_parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if pattern_parts.len() != path_parts.len() {
        return None;
    }

    let mut params = BTreeMap::new();
    for (pattern_part, path_part) in pattern_parts.iter().zip(path_parts.iter()) {
        if let Some(name) = pattern_part.strip_prefix(':') {
            params.insert(name.to_string(), (*path_part).to_string());
        } else if pattern_part != path_part {
            return None;
        }
    }
    Some(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(method: &str, pattern: &str) -> Route {
        Route::new(pattern, method, 200, BTreeMap::new(), serde_json::json!({}))
    }

    #[test]
    fn matches_static_path() {
        assert_eq!(match_pattern("/api/products", "/api/products"), Some(BTreeMap::new()));
        assert_eq!(match_pattern("/api/products", "/api/other"), None);
    }

    #[test]
    fn extracts_path_parameters() {
        let params = match_pattern("/api/products/:id", "/api/products/42").unwrap();
        assert_eq!(params.get("id"), Some(&"42".to_string()));
    }

    #[test]
    fn first_registered_route_wins() {
        let mut resolver = RouteResolver::new();
        resolver.register(route("GET", "/api/products/:id"));
        resolver.register(route("*", "/api/products/:id"));

        let m = resolver.resolve("GET", "/api/products/42").unwrap();
        assert_eq!(m.route_index, 0);
    }

    #[test]
    fn wildcard_method_matches_anything() {
        let mut resolver = RouteResolver::new();
        resolver.register(route("*", "/api/products/:id"));
        assert!(resolver.resolve("POST", "/api/products/1").is_some());
    }

    #[test]
    fn caches_hits_and_misses() {
        let mut resolver = RouteResolver::new();
        resolver.register(route("GET", "/api/products/:id"));

        assert!(resolver.resolve("GET", "/api/products/1").is_some());
        assert!(resolver.resolve("GET", "/api/products/1").is_some());
        assert!(resolver.resolve("GET", "/nope").is_none());
        assert!(resolver.resolve("GET", "/nope").is_none());

        let metrics = resolver.metrics();
        assert_eq!(metrics.cache_misses, 2);
        assert_eq!(metrics.cache_hits, 2);
    }

    #[test]
    fn clear_caches_forces_rescan() {
        let mut resolver = RouteResolver::new();
        resolver.register(route("GET", "/api/products/:id"));
        resolver.resolve("GET", "/api/products/1");
        resolver.clear_caches();
        resolver.resolve("GET", "/api/products/1");
        assert_eq!(resolver.metrics().cache_misses, 2);
    }

    #[test]
    fn resolution_is_deterministic_across_runs() {
        let mut resolver = RouteResolver::new();
        resolver.register(route("GET", "/a/:id"));
        resolver.register(route("GET", "/a/:id"));
        let first = resolver.resolve("GET", "/a/1").unwrap().route_index;
        resolver.clear_caches();
        let second = resolver.resolve("GET", "/a/1").unwrap().route_index;
        assert_eq!(first, second);
    }

    #[test]
    fn template_compiles_lazily_on_first_use() {
        let mut resolver = RouteResolver::new();
        resolver.register(route("GET", "/a/:id"));
        resolver.register(route("GET", "/b/:id"));
        assert_eq!(resolver.metrics().template_compilations, 0);

        resolver.template_for(0);
        assert_eq!(resolver.metrics().template_compilations, 1);
        resolver.template_for(0);
        assert_eq!(resolver.metrics().template_compilations, 1, "second call reuses the compiled template");
    }

    #[test]
    fn preload_compiles_every_route_up_front() {
        let mut resolver = RouteResolver::new();
        resolver.register(route("GET", "/a/:id"));
        resolver.register(route("GET", "/b/:id"));

        resolver.preload();
        assert_eq!(resolver.metrics().template_compilations, 2);

        resolver.template_for(0);
        resolver.template_for(1);
        assert_eq!(resolver.metrics().template_compilations, 2, "preloaded templates aren't recompiled on use");
    }
}
