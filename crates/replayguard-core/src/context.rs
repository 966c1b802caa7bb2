//! Template render-context construction (spec §4.F context builders).
//!
//! Grounded on the teacher's `templating.rs::TemplatingContext`, generalized
//! from a fixed struct into a default context plus a chain of registered
//! builder closures, each shallow-merged over the previous result.

use crate::routing::RouteMatch;
use crate::session::Request;
use serde_json::{Map, Value};
use tracing::warn;

/// A context-building step: given the in-flight request and route match,
/// returns a JSON object to shallow-merge into the context. Errors are
/// logged and the step's contribution is dropped, per spec §4.F ("a builder
/// that fails doesn't fail the whole render").
pub trait ContextFn: Send + Sync {
    /// Produce this step's contribution to the render context.
    fn build(&self, request: &Request, route_match: &RouteMatch) -> crate::error::Result<Value>;
}

impl<F> ContextFn for F
where
    F: Fn(&Request, &RouteMatch) -> crate::error::Result<Value> + Send + Sync,
{
    fn build(&self, request: &Request, route_match: &RouteMatch) -> crate::error::Result<Value> {
        self(request, route_match)
    }
}

/// Builds the render context for a request: a default shape, overridden in
/// registration order by any additional builder steps.
#[derive(Default)]
pub struct ContextBuilder {
    steps: Vec<Box<dyn ContextFn>>,
}

impl ContextBuilder {
    /// A builder with no extra steps; `build` still produces the default context.
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Register an additional context-building step. Later registrations
    /// override earlier ones on key conflicts (shallow merge).
    pub fn register(&mut self, step: impl ContextFn + 'static) {
        self.steps.push(Box::new(step));
    }

    /// Build the context for one request: `{request: {method, path, query,
    /// params, body}, timestamp, random: {uuid, number}}`, shallow-merged
    /// with each registered step's contribution in order.
    pub fn build(&self, request: &Request, route_match: &RouteMatch) -> Value {
        let mut ctx = default_context(request, route_match);

        for step in &self.steps {
            match step.build(request, route_match) {
                Ok(Value::Object(extra)) => merge_shallow(&mut ctx, extra),
                Ok(_) => warn!("context builder step returned a non-object value, ignoring"),
                Err(err) => warn!(error = %err, "context builder step failed, skipping its contribution"),
            }
        }

        ctx
    }
}

fn default_context(request: &Request, route_match: &RouteMatch) -> Value {
    let params: Map<String, Value> = route_match
        .params
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();

    let query: Map<String, Value> = request
        .query
        .iter()
        .map(|(k, v)| (k.clone(), v.to_value()))
        .collect();

    serde_json::json!({
        "request": {
            "method": request.method,
            "path": request.path,
            "query": query,
            "params": params,
            "body": request.body.clone().unwrap_or(Value::Null),
        },
        "timestamp": Value::from(chrono::Utc::now().timestamp_millis()),
        "random": {
            "uuid": uuid::Uuid::new_v4().to_string(),
            "number": rand::random_range(0..1000u32),
        },
    })
}

fn merge_shallow(base: &mut Value, extra: Map<String, Value>) {
    let Value::Object(base_map) = base else {
        return;
    };
    for (key, value) in extra {
        base_map.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Request;
    use std::collections::BTreeMap;

    fn sample_request() -> Request {
        Request {
            method: "GET".to_string(),
            path: "/api/products/42".to_string(),
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    fn sample_match() -> RouteMatch {
        let mut params = BTreeMap::new();
        params.insert("id".to_string(), "42".to_string());
        RouteMatch { route_index: 0, params }
    }

    #[test]
    fn default_context_exposes_request_and_params() {
        let builder = ContextBuilder::new();
        let ctx = builder.build(&sample_request(), &sample_match());
        assert_eq!(ctx["request"]["method"], "GET");
        assert_eq!(ctx["request"]["params"]["id"], "42");
    }

    #[test]
    fn default_timestamp_is_an_epoch_millis_integer() {
        let builder = ContextBuilder::new();
        let ctx = builder.build(&sample_request(), &sample_match());
        assert!(ctx["timestamp"].is_i64(), "expected an integer, got {:?}", ctx["timestamp"]);
    }

    #[test]
    fn default_random_number_is_bounded_below_1000() {
        let builder = ContextBuilder::new();
        for _ in 0..50 {
            let ctx = builder.build(&sample_request(), &sample_match());
            let n = ctx["random"]["number"].as_u64().unwrap();
            assert!(n < 1000, "random.number {n} out of the documented 0..1000 range");
        }
    }

    #[test]
    fn registered_step_overrides_default_keys() {
        let mut builder = ContextBuilder::new();
        builder.register(|_req: &Request, _m: &RouteMatch| Ok(serde_json::json!({"timestamp": "frozen"})));
        let ctx = builder.build(&sample_request(), &sample_match());
        assert_eq!(ctx["timestamp"], "frozen");
    }

    #[test]
    fn failing_step_is_swallowed_without_affecting_context() {
        let mut builder = ContextBuilder::new();
        builder.register(|_req: &Request, _m: &RouteMatch| Err(crate::error::Error::generic("boom")));
        let ctx = builder.build(&sample_request(), &sample_match());
        assert_eq!(ctx["request"]["method"], "GET");
    }

    #[test]
    fn later_step_overrides_earlier_step() {
        let mut builder = ContextBuilder::new();
        builder.register(|_req: &Request, _m: &RouteMatch| Ok(serde_json::json!({"env": "first"})));
        builder.register(|_req: &Request, _m: &RouteMatch| Ok(serde_json::json!({"env": "second"})));
        let ctx = builder.build(&sample_request(), &sample_match());
        assert_eq!(ctx["env"], "second");
    }
}
