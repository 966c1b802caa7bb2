//! Mustache-like template compilation and rendering (spec §4.F).
//!
//! Grounded on the teacher's `templating.rs::expand_str_with_context` token
//! chain, reshaped per design note §9: templates are parsed once into a
//! small AST (`Compiled`) instead of re-scanned on every render, and the
//! helper registry is instance-scoped rather than the teacher's global
//! `OnceCell<FakerProvider>`.

use crate::error::{Error, Result};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;

/// A single dotted-path segment list, e.g. `request.body.id` → `["request", "body", "id"]`.
type Path = Vec<String>;

/// An argument to a helper call: either a literal JSON value or a context lookup.
#[derive(Debug, Clone)]
enum Arg {
    Literal(Value),
    Path(Path),
}

impl Arg {
    fn resolve(&self, ctx: &Value) -> Value {
        match self {
            Arg::Literal(v) => v.clone(),
            Arg::Path(path) => lookup(ctx, path).cloned().unwrap_or(Value::Null),
        }
    }
}

/// A fragment of a parsed template string.
#[derive(Debug, Clone)]
enum Seg {
    Text(String),
    Lookup(Path),
    Call { name: String, args: Vec<Arg> },
    Block { name: String, args: Vec<Arg>, then: Vec<Seg>, else_branch: Vec<Seg> },
}

/// A compiled template, parsed once from a JSON skeleton (spec §4.F).
#[derive(Debug, Clone)]
pub struct Template {
    compiled: Compiled,
}

#[derive(Debug, Clone)]
enum Compiled {
    Literal(Value),
    Object(Vec<(String, Compiled)>),
    Array(Vec<Compiled>),
    Str(Vec<Seg>),
}

impl Template {
    /// Compile a JSON skeleton into a template. Parse failures in an
    /// individual string leaf degrade to a literal (the string renders
    /// unchanged) rather than failing the whole template.
    pub fn from_value(value: Value) -> Self {
        Self { compiled: compile(&value) }
    }

    /// Render this template against a context, using `registry` for helper
    /// calls.
    pub fn render(&self, ctx: &Value, registry: &HelperRegistry) -> Result<Value> {
        render_compiled(&self.compiled, ctx, registry)
    }
}

fn compile(value: &Value) -> Compiled {
    match value {
        Value::String(s) => match parse(s) {
            Ok(segs) => Compiled::Str(segs),
            Err(_) => Compiled::Literal(Value::String(s.clone())),
        },
        Value::Object(map) => {
            Compiled::Object(map.iter().map(|(k, v)| (k.clone(), compile(v))).collect())
        }
        Value::Array(items) => Compiled::Array(items.iter().map(compile).collect()),
        other => Compiled::Literal(other.clone()),
    }
}

fn render_compiled(compiled: &Compiled, ctx: &Value, registry: &HelperRegistry) -> Result<Value> {
    match compiled {
        Compiled::Literal(v) => Ok(v.clone()),
        Compiled::Object(fields) => {
            let mut map = serde_json::Map::new();
            for (key, value) in fields {
                map.insert(key.clone(), render_compiled(value, ctx, registry)?);
            }
            Ok(Value::Object(map))
        }
        Compiled::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(render_compiled(item, ctx, registry)?);
            }
            Ok(Value::Array(out))
        }
        Compiled::Str(segs) => render_segs(segs, ctx, registry),
    }
}

/// Render a segment list to a string, coercing every placeholder's value to
/// text (spec §4.F: `{{random 10 100}}` renders as a numeric-looking
/// *string*, not a native JSON number — the surrounding quotes in the JSON
/// skeleton are what the author wrote and rendering preserves that).
fn render_segs(segs: &[Seg], ctx: &Value, registry: &HelperRegistry) -> Result<Value> {
    let mut out = String::new();
    for seg in segs {
        out.push_str(&to_display_string(&render_seg(seg, ctx, registry)?));
    }
    Ok(Value::String(out))
}

fn render_seg(seg: &Seg, ctx: &Value, registry: &HelperRegistry) -> Result<Value> {
    match seg {
        Seg::Text(s) => Ok(Value::String(s.clone())),
        Seg::Lookup(path) => Ok(lookup(ctx, path).cloned().unwrap_or(Value::Null)),
        Seg::Call { name, args } => {
            let resolved: Vec<Value> = args.iter().map(|a| a.resolve(ctx)).collect();
            registry.call(name, &resolved, ctx)
        }
        Seg::Block { name, args, then, else_branch } => {
            if name == "if_eq" {
                let resolved: Vec<Value> = args.iter().map(|a| a.resolve(ctx)).collect();
                let branch = if resolved.first() == resolved.get(1) { then } else { else_branch };
                render_segs(branch, ctx, registry)
            } else {
                Err(Error::render(format!("unknown block helper `{name}`")))
            }
        }
    }
}

fn to_display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn lookup<'a>(ctx: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = ctx;
    for segment in path {
        current = current.get(segment)?;
    }
    Some(current)
}

/// A helper callable from `{{name arg1 arg2}}` expressions.
pub trait Helper: Send + Sync {
    /// Invoke the helper with its resolved arguments and the render context.
    fn call(&self, args: &[Value], ctx: &Value) -> Result<Value>;
}

impl<F> Helper for F
where
    F: Fn(&[Value], &Value) -> Result<Value> + Send + Sync,
{
    fn call(&self, args: &[Value], ctx: &Value) -> Result<Value> {
        self(args, ctx)
    }
}

/// Instance-scoped registry of template helpers (spec §4.F built-ins, plus
/// whatever callers register).
pub struct HelperRegistry {
    helpers: HashMap<String, Box<dyn Helper>>,
}

impl Default for HelperRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl HelperRegistry {
    /// An empty registry with no helpers at all.
    pub fn empty() -> Self {
        Self { helpers: HashMap::new() }
    }

    /// The registry pre-populated with the built-in helpers (spec §4.F):
    /// `uuid`, `now`, `timestamp`, `random`, `concat`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("uuid", |_args: &[Value], _ctx: &Value| Ok(Value::String(uuid::Uuid::new_v4().to_string())));
        registry.register("now", |args: &[Value], _ctx: &Value| {
            let now = Utc::now();
            match args.first().and_then(Value::as_str) {
                Some("epoch_ms") => Ok(Value::from(now.timestamp_millis())),
                Some("epoch") => Ok(Value::from(now.timestamp())),
                _ => Ok(Value::String(now.to_rfc3339())),
            }
        });
        registry.register("timestamp", |_args: &[Value], _ctx: &Value| Ok(Value::from(Utc::now().timestamp_millis())));
        registry.register("random", |args: &[Value], _ctx: &Value| {
            let min = args.first().and_then(Value::as_i64).unwrap_or(0);
            let max = args.get(1).and_then(Value::as_i64).unwrap_or(100);
            if max < min {
                return Err(Error::render("random: max must be >= min"));
            }
            Ok(Value::from(rand::random_range(min..=max)))
        });
        registry.register("concat", |args: &[Value], _ctx: &Value| {
            Ok(Value::String(args.iter().map(to_display_string).collect()))
        });
        registry
    }

    /// Register a custom helper, overriding any built-in of the same name.
    pub fn register(&mut self, name: impl Into<String>, helper: impl Helper + 'static) {
        self.helpers.insert(name.into(), Box::new(helper));
    }

    fn call(&self, name: &str, args: &[Value], ctx: &Value) -> Result<Value> {
        self.helpers
            .get(name)
            .ok_or_else(|| Error::render(format!("unknown helper `{name}`")))?
            .call(args, ctx)
    }
}

// --- Parsing ---------------------------------------------------------------

#[derive(Debug, Clone)]
enum RawTok {
    Text(String),
    Tag(String),
}

fn tokenize(input: &str) -> Vec<RawTok> {
    let mut toks = Vec::new();
    let mut rest = input;
    loop {
        match rest.find("{{") {
            None => {
                if !rest.is_empty() {
                    toks.push(RawTok::Text(rest.to_string()));
                }
                break;
            }
            Some(start) => {
                if start > 0 {
                    toks.push(RawTok::Text(rest[..start].to_string()));
                }
                let after_open = &rest[start + 2..];
                match after_open.find("}}") {
                    None => {
                        toks.push(RawTok::Text(rest[start..].to_string()));
                        break;
                    }
                    Some(end) => {
                        toks.push(RawTok::Tag(after_open[..end].trim().to_string()));
                        rest = &after_open[end + 2..];
                    }
                }
            }
        }
    }
    toks
}

/// Parse a template string into a segment tree. Returns `Err` only on
/// malformed block nesting (unmatched `#`/`/`).
fn parse(input: &str) -> std::result::Result<Vec<Seg>, ()> {
    let toks = tokenize(input);
    let mut pos = 0;
    let (segs, _) = parse_segs(&toks, &mut pos, None)?;
    if pos != toks.len() {
        return Err(());
    }
    Ok(segs)
}

/// What ended a [`parse_segs`] run: the token stream ran out, an `{{else}}`
/// marker was hit, or the matching `{{/name}}` was hit (and consumed).
enum Terminator {
    EndOfInput,
    Else,
    Close,
}

fn parse_segs(toks: &[RawTok], pos: &mut usize, closing: Option<&str>) -> std::result::Result<(Vec<Seg>, Terminator), ()> {
    let mut out = Vec::new();
    while *pos < toks.len() {
        match &toks[*pos] {
            RawTok::Text(s) => {
                out.push(Seg::Text(s.clone()));
                *pos += 1;
            }
            RawTok::Tag(tag) => {
                if let Some(name) = tag.strip_prefix('/') {
                    let name = name.trim();
                    return match closing {
                        Some(expected) if expected == name => {
                            *pos += 1;
                            Ok((out, Terminator::Close))
                        }
                        _ => Err(()),
                    };
                }
                if tag == "else" {
                    return if closing.is_some() {
                        *pos += 1;
                        Ok((out, Terminator::Else))
                    } else {
                        Err(())
                    };
                }
                if let Some(rest) = tag.strip_prefix('#') {
                    let mut parts = rest.split_whitespace();
                    let name = parts.next().ok_or(())?.to_string();
                    let args = parts.map(parse_arg).collect();
                    *pos += 1;
                    let (then, terminator) = parse_segs(toks, pos, Some(&name))?;
                    let else_branch = match terminator {
                        Terminator::Else => {
                            let (else_body, terminator) = parse_segs(toks, pos, Some(&name))?;
                            if !matches!(terminator, Terminator::Close) {
                                return Err(());
                            }
                            else_body
                        }
                        Terminator::Close => Vec::new(),
                        Terminator::EndOfInput => return Err(()),
                    };
                    out.push(Seg::Block { name, args, then, else_branch });
                    continue;
                }
                let mut parts = tag.split_whitespace();
                let name = parts.next().ok_or(())?.to_string();
                let args: Vec<Arg> = parts.map(parse_arg).collect();
                out.push(if args.is_empty() && is_path(&name) {
                    Seg::Lookup(name.split('.').map(str::to_string).collect())
                } else {
                    Seg::Call { name, args }
                });
                *pos += 1;
            }
        }
    }
    match closing {
        None => Ok((out, Terminator::EndOfInput)),
        Some(_) => Err(()),
    }
}

fn is_path(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn parse_arg(token: &str) -> Arg {
    if let Ok(n) = token.parse::<i64>() {
        return Arg::Literal(Value::from(n));
    }
    if let Ok(f) = token.parse::<f64>() {
        return Arg::Literal(Value::from(f));
    }
    if token == "true" || token == "false" {
        return Arg::Literal(Value::from(token == "true"));
    }
    if let Some(inner) = token.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        return Arg::Literal(Value::String(inner.to_string()));
    }
    Arg::Path(token.split('.').map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(tpl: &str, ctx: Value) -> Value {
        let template = Template::from_value(json!(tpl));
        template.render(&ctx, &HelperRegistry::with_builtins()).unwrap()
    }

    #[test]
    fn renders_plain_text_unchanged() {
        assert_eq!(render("hello", json!({})), json!("hello"));
    }

    #[test]
    fn renders_dotted_lookup() {
        assert_eq!(render("{{request.params.id}}", json!({"request": {"params": {"id": "42"}}})), json!("42"));
    }

    #[test]
    fn scenario_s6_numeric_helper_renders_as_numeric_string() {
        let result = render("{{random 10 10}}", json!({}));
        let s = result.as_str().unwrap();
        assert_eq!(s.parse::<i64>().unwrap(), 10);
    }

    #[test]
    fn random_with_no_args_defaults_to_0_100() {
        for _ in 0..50 {
            let result = render("{{random}}", json!({}));
            let n: i64 = result.as_str().unwrap().parse().unwrap();
            assert!((0..=100).contains(&n), "random with no args produced {n}, outside the default 0..=100 range");
        }
    }

    #[test]
    fn concatenation_coerces_to_string() {
        let result = render("id-{{request.params.id}}", json!({"request": {"params": {"id": 7}}}));
        assert_eq!(result, json!("id-7"));
    }

    #[test]
    fn uuid_helper_produces_canonical_uuid() {
        let result = render("{{uuid}}", json!({}));
        let s = result.as_str().unwrap();
        assert_eq!(s.len(), 36);
        assert!(uuid::Uuid::parse_str(s).is_ok());
    }

    #[test]
    fn concat_helper_joins_arguments() {
        let result = render(r#"{{concat "a" "b" "c"}}"#, json!({}));
        assert_eq!(result, json!("abc"));
    }

    #[test]
    fn if_eq_block_selects_then_branch() {
        let result = render("{{#if_eq request.method \"GET\"}}yes{{else}}no{{/if_eq}}", json!({"request": {"method": "GET"}}));
        assert_eq!(result, json!("yes"));
    }

    #[test]
    fn if_eq_block_selects_else_branch() {
        let result = render("{{#if_eq request.method \"GET\"}}yes{{else}}no{{/if_eq}}", json!({"request": {"method": "POST"}}));
        assert_eq!(result, json!("no"));
    }

    #[test]
    fn object_and_array_leaves_render_recursively() {
        let template = Template::from_value(json!({"id": "{{request.params.id}}", "tags": ["a", "{{request.params.id}}"]}));
        let ctx = json!({"request": {"params": {"id": "9"}}});
        let rendered = template.render(&ctx, &HelperRegistry::with_builtins()).unwrap();
        assert_eq!(rendered, json!({"id": "9", "tags": ["a", "9"]}));
    }

    #[test]
    fn unknown_helper_errors() {
        let template = Template::from_value(json!("{{nope}}"));
        assert!(template.render(&json!({}), &HelperRegistry::with_builtins()).is_err());
    }
}
