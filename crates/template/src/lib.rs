//! `{{path.to.value}}` substitution over a context map.
//!
//! Deliberately narrower than a general templating language: no loops, no
//! conditionals, no filters. One expression form (`{{` dotted-path `}}`)
//! that may appear anywhere inside a string, or stand alone to preserve the
//! referenced value's JSON type rather than its textual form.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unterminated template expression in {0:?}")]
    Unterminated(String),
    #[error("empty template path in {0:?}")]
    EmptyPath(String),
    #[error("missing context key: {0}")]
    MissingKey(String),
    #[error("cannot index into {0} with key {1:?}")]
    NotIndexable(&'static str, String),
}

/// One `{{...}}` span found in a template string.
struct Expr<'a> {
    path: &'a str,
    /// Byte range in the source string, including the delimiters.
    span: std::ops::Range<usize>,
}

fn find_next_expr(source: &str, from: usize) -> Result<Option<Expr<'_>>, TemplateError> {
    let Some(rel_start) = source[from..].find("{{") else {
        return Ok(None);
    };
    let start = from + rel_start;
    let Some(rel_end) = source[start..].find("}}") else {
        return Err(TemplateError::Unterminated(source.to_string()));
    };
    let end = start + rel_end + 2;
    let path = source[start + 2..start + rel_end].trim();
    if path.is_empty() {
        return Err(TemplateError::EmptyPath(source.to_string()));
    }
    Ok(Some(Expr { path, span: start..end }))
}

/// Resolves a dotted path against a context value.
///
/// `a.b.c` looks up key `a`, then key/index `b`, then `c`. Missing
/// intermediate keys are an error; a missing *leaf* key is also an error
/// (the engine never silently substitutes an empty string for an unknown
/// path).
pub fn resolve_path<'v>(context: &'v Value, path: &str) -> Result<&'v Value, TemplateError> {
    let mut current = context;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map
                .get(segment)
                .ok_or_else(|| TemplateError::MissingKey(path.to_string()))?,
            Value::Array(items) => {
                let index: usize = segment
                    .parse()
                    .map_err(|_| TemplateError::NotIndexable("array", segment.to_string()))?;
                items
                    .get(index)
                    .ok_or_else(|| TemplateError::MissingKey(path.to_string()))?
            }
            other => {
                return Err(TemplateError::NotIndexable(type_name(other), segment.to_string()));
            }
        };
    }
    Ok(current)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => if *b { "True" } else { "False" }.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Renders a string template against a context.
///
/// If `source` is exactly one `{{path}}` expression with no surrounding
/// text, the resolved value's native JSON type is returned (preserving
/// numbers, booleans, objects, and lists instead of stringifying them).
/// Otherwise every expression found is stringified and substituted into the
/// surrounding text, and the whole thing is returned as a string.
pub fn render(source: &str, context: &Value) -> Result<Value, TemplateError> {
    let Some(first) = find_next_expr(source, 0)? else {
        return Ok(Value::String(source.to_string()));
    };

    if first.span.start == 0 && first.span.end == source.len() {
        let resolved = resolve_path(context, first.path)?;
        return Ok(resolved.clone());
    }

    render_str(source, context).map(Value::String)
}

/// Renders a string template, always producing a `String`.
pub fn render_str(source: &str, context: &Value) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    while let Some(expr) = find_next_expr(source, cursor)? {
        out.push_str(&source[cursor..expr.span.start]);
        let resolved = resolve_path(context, expr.path)?;
        out.push_str(&value_to_text(resolved));
        cursor = expr.span.end;
    }
    out.push_str(&source[cursor..]);
    Ok(out)
}

/// Recursively renders every string leaf of a JSON value against a context,
/// returning a new value. Non-string leaves (numbers, booleans, null) are
/// left untouched; maps and lists are walked structurally.
pub fn render_value(source: &Value, context: &Value) -> Result<Value, TemplateError> {
    match source {
        Value::String(s) => render(s, context),
        Value::Array(items) => {
            let mut rendered = Vec::with_capacity(items.len());
            for item in items {
                rendered.push(render_value(item, context)?);
            }
            Ok(Value::Array(rendered))
        }
        Value::Object(map) => {
            let mut rendered = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                rendered.insert(key.clone(), render_value(value, context)?);
            }
            Ok(Value::Object(rendered))
        }
        other => Ok(other.clone()),
    }
}

/// Renders every string leaf of a map, as `render_value` does for a
/// top-level object. Input is not mutated; a new map is returned.
pub fn render_map(
    source: &std::collections::HashMap<String, String>,
    context: &Value,
) -> Result<std::collections::HashMap<String, String>, TemplateError> {
    let mut rendered = std::collections::HashMap::with_capacity(source.len());
    for (key, value) in source {
        rendered.insert(key.clone(), render_str(value, context)?);
    }
    Ok(rendered)
}
