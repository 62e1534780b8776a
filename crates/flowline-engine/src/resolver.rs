//! Placeholder resolution for block inputs.
//!
//! Resolves `{{expression}}` placeholders against the [`RunContext`].
//!
//! # Template Syntax
//!
//! - `{{$params.field}}`: trigger payload
//! - `{{$vars.name}}` / `{{$credentials.name}}` / `{{$session.userId}}`
//! - `{{fetch.body.title}}`: output of the block whose `variableName` is `fetch`
//! - `{{fetch.output}}` / `{{fetch.error}}`: the block entry itself
//! - `{{fetch.items[0].name}}` or `{{fetch.items.0.name}}`: array index
//! - `{{iterator.item}}`: current element inside an iterator body
//!
//! Whitespace inside the braces is ignored. An unclosed `{{` is left as-is.

use std::sync::Arc;

use flowline_config::ResolverKind;
use serde_json::{Map, Value};

use crate::context::{RunContext, is_reserved};
use crate::error::{EngineError, Result};

/// Substitutes placeholders in a block's input map.
pub trait TemplateResolver: Send + Sync {
    fn resolve_input(&self, input: &Map<String, Value>, ctx: &RunContext)
    -> Result<Map<String, Value>>;
}

/// Build the resolver selected by `engine.resolver`.
pub fn for_kind(kind: ResolverKind) -> Arc<dyn TemplateResolver> {
    match kind {
        ResolverKind::Serialized => Arc::new(SerializedResolver),
        ResolverKind::Structural => Arc::new(StructuralResolver),
    }
}

// ---------------------------------------------------------------------------
// Serialized resolver
// ---------------------------------------------------------------------------

/// One textual pass over the JSON text of the whole input.
///
/// Inserted text is JSON-escaped, so the result always parses back. Every
/// substituted value becomes (part of) a string.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerializedResolver;

impl TemplateResolver for SerializedResolver {
    fn resolve_input(
        &self,
        input: &Map<String, Value>,
        ctx: &RunContext,
    ) -> Result<Map<String, Value>> {
        let text = serde_json::to_string(input)?;
        let resolved = substitute(&text, |path| {
            let value = lookup(ctx, path)?;
            Ok(escape_json_fragment(&value_to_string(&value)))
        })?;
        Ok(serde_json::from_str(&resolved)?)
    }
}

/// Escape text for insertion between the quotes of a JSON string.
fn escape_json_fragment(s: &str) -> String {
    let quoted = Value::String(s.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

// ---------------------------------------------------------------------------
// Structural resolver
// ---------------------------------------------------------------------------

/// Walks the JSON tree and resolves each string on its own.
///
/// A string that is exactly one placeholder keeps the JSON type of the
/// value it names; mixed strings are stringified.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralResolver;

impl StructuralResolver {
    fn resolve_value(&self, value: &Value, ctx: &RunContext) -> Result<Value> {
        match value {
            Value::String(s) => resolve_template_value(s, ctx),
            Value::Object(map) => {
                let mut resolved = Map::new();
                for (k, v) in map {
                    resolved.insert(k.clone(), self.resolve_value(v, ctx)?);
                }
                Ok(Value::Object(resolved))
            }
            Value::Array(arr) => {
                let resolved: Result<Vec<Value>> =
                    arr.iter().map(|v| self.resolve_value(v, ctx)).collect();
                Ok(Value::Array(resolved?))
            }
            other => Ok(other.clone()),
        }
    }
}

impl TemplateResolver for StructuralResolver {
    fn resolve_input(
        &self,
        input: &Map<String, Value>,
        ctx: &RunContext,
    ) -> Result<Map<String, Value>> {
        let mut resolved = Map::new();
        for (k, v) in input {
            resolved.insert(k.clone(), self.resolve_value(v, ctx)?);
        }
        Ok(resolved)
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Resolve one template string.
///
/// A string that is exactly one placeholder yields the referenced value with
/// its JSON type; anything else yields a string.
pub fn resolve_template_value(template: &str, ctx: &RunContext) -> Result<Value> {
    if let Some(path) = single_placeholder(template) {
        return lookup(ctx, path);
    }
    let resolved = substitute(template, |path| Ok(value_to_string(&lookup(ctx, path)?)))?;
    Ok(Value::String(resolved))
}

/// The inner path when `template` is exactly one `{{...}}`.
pub fn single_placeholder(template: &str) -> Option<&str> {
    let inner = template.trim().strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.contains("{{") || inner.contains("}}") {
        return None;
    }
    let inner = inner.trim();
    (!inner.is_empty()).then_some(inner)
}

/// Replace every `{{path}}` in `s` using `replace`, in one left-to-right pass.
///
/// Replacement text is never rescanned. Empty `{{}}` and an unclosed `{{`
/// are copied through verbatim.
fn substitute<F>(s: &str, mut replace: F) -> Result<String>
where
    F: FnMut(&str) -> Result<String>,
{
    let mut out = String::with_capacity(s.len());
    let mut remaining = s;

    while let Some(start) = remaining.find("{{") {
        let Some(end) = remaining[start..].find("}}") else {
            break;
        };
        let full_end = start + end + 2;
        let inner = remaining[start + 2..start + end].trim();

        // Paths never contain quotes; a quote means the braces span JSON structure.
        if inner.is_empty() || inner.contains('"') {
            out.push_str(&remaining[..start + 2]);
            remaining = &remaining[start + 2..];
            continue;
        }

        out.push_str(&remaining[..start]);
        out.push_str(&replace(inner)?);
        remaining = &remaining[full_end..];
    }

    out.push_str(remaining);
    Ok(out)
}

/// Resolve a dotted path against the context.
///
/// For block entries, a second segment other than `output`/`error` reads
/// through to the block's output, and a bare block name is its output.
pub fn lookup(ctx: &RunContext, path: &str) -> Result<Value> {
    let segments = parse_path_segments(path);
    let Some(root) = segments.first() else {
        return Err(EngineError::Template("empty placeholder".into()));
    };

    let entry = ctx.get(&root.name).ok_or_else(|| {
        EngineError::Template(format!(
            "'{{{{{}}}}}': unknown context key '{}'",
            path, root.name
        ))
    })?;

    let mut current = entry;
    let mut rest = &segments[1..];

    if !is_reserved(&root.name) {
        let addresses_wrapper = rest
            .first()
            .is_some_and(|s| s.name == "output" || s.name == "error");
        if !addresses_wrapper {
            current = entry.get("output").unwrap_or(&Value::Null);
        }
    }
    if let Some(i) = root.index {
        current = current.get(i).ok_or_else(|| unresolved(path, root))?;
    }

    while let Some((segment, tail)) = rest.split_first() {
        current = navigate_segment(current, segment).ok_or_else(|| unresolved(path, segment))?;
        rest = tail;
    }

    Ok(current.clone())
}

fn unresolved(path: &str, segment: &PathSegment) -> EngineError {
    EngineError::Template(format!(
        "'{{{{{}}}}}': cannot resolve segment '{}'",
        path, segment
    ))
}

/// A segment of a dot-separated path, optionally with an array index.
#[derive(Debug)]
struct PathSegment {
    name: String,
    index: Option<usize>,
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.index {
            Some(i) => write!(f, "{}[{}]", self.name, i),
            None => write!(f, "{}", self.name),
        }
    }
}

/// `"fetch.items[0].name"` → `fetch`, `items[0]`, `name`
fn parse_path_segments(path: &str) -> Vec<PathSegment> {
    path.split('.')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            if let Some(bracket_start) = part.find('[')
                && let Some(bracket_end) = part.find(']')
                && bracket_end > bracket_start
            {
                return PathSegment {
                    name: part[..bracket_start].to_string(),
                    index: part[bracket_start + 1..bracket_end].parse().ok(),
                };
            }
            PathSegment {
                name: part.to_string(),
                index: None,
            }
        })
        .collect()
}

fn navigate_segment<'a>(value: &'a Value, segment: &PathSegment) -> Option<&'a Value> {
    let field = if segment.name.is_empty() {
        value
    } else {
        match value {
            Value::Array(items) => items.get(segment.name.parse::<usize>().ok()?)?,
            _ => value.get(&segment.name)?,
        }
    };

    match segment.index {
        Some(i) => field.get(i),
        None => Some(field),
    }
}

/// Stringify a value for interpolation. Objects and arrays become compact JSON.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
