//! OpenAPI-subset contract import (spec §4.H).
//!
//! Synthesizes [`Route`]s directly from an OpenAPI document's 2xx response
//! examples, so a contract file alone is enough to drive dynamic replay with
//! no recorded session at all. Grounded on the teacher's
//! `openapi/route.rs::extract_path_parameters` for path-template handling;
//! the `openapiv3` document walk itself has no direct teacher analogue and
//! follows the crate's own documented shape (`Paths` → `PathItem` →
//! `Operation` → `Responses`).

use crate::config::{ContractExampleSelection, ContractImportConfig};
use crate::error::{Error, Result};
use crate::routing::{Route, RouteResolver};
use openapiv3::{OpenAPI, Operation, ReferenceOr, StatusCode};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

const JSON_CONTENT_TYPE: &str = "application/json";

/// Imports an OpenAPI document's 2xx examples as dynamic-response routes
/// (spec §4.H).
pub struct ContractImporter<'a> {
    config: &'a ContractImportConfig,
}

impl<'a> ContractImporter<'a> {
    /// Build an importer bound to a contract-import configuration.
    pub fn new(config: &'a ContractImportConfig) -> Self {
        Self { config }
    }

    /// Walk every path/method/response in `document`, registering one
    /// route per operation that carries a usable JSON example. Returns the
    /// number of routes registered.
    pub fn import(&self, document: &OpenAPI, resolver: &mut RouteResolver) -> Result<usize> {
        let mut registered = 0;

        for (path, item) in &document.paths.paths {
            let ReferenceOr::Item(item) = item else {
                warn!(path, "skipping external path-item reference");
                continue;
            };

            let pattern = to_colon_pattern(path);

            for (method, operation) in [
                ("GET", &item.get),
                ("POST", &item.post),
                ("PUT", &item.put),
                ("DELETE", &item.delete),
                ("PATCH", &item.patch),
                ("OPTIONS", &item.options),
                ("HEAD", &item.head),
            ] {
                let Some(operation) = operation else { continue };
                match self.route_for_operation(&pattern, method, operation) {
                    Some(route) => {
                        resolver.register(route);
                        registered += 1;
                    }
                    None => debug!(path, method, "no usable JSON example, skipping"),
                }
            }
        }

        Ok(registered)
    }

    fn route_for_operation(&self, pattern: &str, method: &str, operation: &Operation) -> Option<Route> {
        let (status, example) = self.select_example(operation)?;
        Some(Route::new(
            pattern,
            method,
            status,
            BTreeMap::from([("content-type".to_string(), JSON_CONTENT_TYPE.to_string())]),
            example,
        ))
    }

    /// Choose which 2xx response's JSON example backs this route, per
    /// `ContractImportConfig::example_selection` (spec §9 open question).
    fn select_example(&self, operation: &Operation) -> Option<(u16, Value)> {
        let mut success_codes: Vec<(u16, &ReferenceOr<openapiv3::Response>)> = operation
            .responses
            .responses
            .iter()
            .filter_map(|(code, resp)| match code {
                StatusCode::Code(n) if (200..300).contains(n) => Some((*n, resp)),
                _ => None,
            })
            .collect();
        success_codes.sort_by_key(|(code, _)| *code);

        let chosen = match self.config.example_selection {
            ContractExampleSelection::PreferStatus => {
                let preferred = self.config.preferred_status;
                success_codes
                    .iter()
                    .find(|(code, _)| Some(*code) == preferred)
                    .or_else(|| success_codes.first())
            }
            ContractExampleSelection::FirstSuccess => success_codes.first(),
        };

        let (status, response) = chosen?;
        let ReferenceOr::Item(response) = response else {
            return None;
        };
        let example = extract_json_example(response)?;
        Some((*status, example))
    }
}

/// Extract a JSON example from a response object, trying in order (spec
/// §4.J): a flat `examples` map on the response itself, then
/// `content["application/json"].example`, then
/// `content["application/json"].examples`.
///
/// `openapiv3::Response` doesn't model a top-level `examples` field (OpenAPI
/// 3.0 only defines `examples` nested under a media type), but its generic
/// `extensions` catch-all flattens *any* unrecognized property on the
/// response object, named or not — so a document that does carry a
/// top-level `examples` map still surfaces it there.
fn extract_json_example(response: &openapiv3::Response) -> Option<Value> {
    if let Some(first) = response.extensions.get("examples").and_then(|v| v.as_object()).and_then(|m| m.values().next()) {
        return Some(unwrap_flat_example(first));
    }

    let media = response.content.get(JSON_CONTENT_TYPE)?;
    if let Some(example) = &media.example {
        return Some(example.clone());
    }
    media.examples.values().find_map(|ex| match ex {
        ReferenceOr::Item(example) => example.value.clone(),
        ReferenceOr::Reference { .. } => None,
    })
}

/// Resolve one value from a top-level `response.examples` map: used as-is
/// when it's already structured, JSON-parsed when it's a string, falling
/// back to `{value: <s>}` when the string isn't JSON.
fn unwrap_flat_example(value: &Value) -> Value {
    match value {
        Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| serde_json::json!({ "value": s })),
        other => other.clone(),
    }
}

/// Convert an OpenAPI `{name}` path template to replayguard's `:name` syntax.
fn to_colon_pattern(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                format!(":{name}")
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Parse an OpenAPI document from JSON or YAML text, dispatching on
/// extension (mirrors [`crate::config::ReplayConfig::from_file`]).
pub fn load_document(path: &std::path::Path) -> Result<OpenAPI> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::input(format!("failed to read contract {}: {e}", path.display())))?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(serde_json::from_str(&content)?),
        Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
        other => Err(Error::input(format!(
            "unsupported contract extension {:?}, expected .json, .yaml, or .yml",
            other.unwrap_or("")
        ))),
    }
}
