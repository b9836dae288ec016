use serde_json::Value as JsonValue;
use turbulence_template::{render_str, TemplateError};

use crate::error::ExpressionError;
use crate::eval::{eval, Bindings};
use crate::parser::parse;
use crate::value::Value;

/// Composes the template engine with the sandbox: renders `condition` as a
/// template against `context`, then evaluates the rendered string as a
/// boolean expression.
///
/// `""` and the literal rendered strings `"true"`/`"1"` short-circuit to
/// `true`; `"false"`/`"0"` short-circuit to `false`, without ever reaching
/// the sandbox parser.
pub fn evaluate(condition: &str, context: &JsonValue) -> Result<(bool, String), ExpressionError> {
    let rendered = render_str(condition, context).map_err(|e| ExpressionError::Type(e.to_string()))?;
    let trimmed = rendered.trim();
    if trimmed.is_empty() || trimmed == "true" || trimmed == "1" {
        return Ok((true, rendered));
    }
    if trimmed == "false" || trimmed == "0" {
        return Ok((false, rendered));
    }

    let body = context.get("last_response").and_then(|r| r.get("body")).cloned().unwrap_or(JsonValue::Null);
    let headers = context
        .get("last_response")
        .and_then(|r| r.get("headers"))
        .cloned()
        .unwrap_or_else(|| JsonValue::Object(serde_json::Map::new()));

    let bindings = Bindings::new(Value::from_json(context), Value::from_json(&body), Value::from_json(&headers));
    let expr = parse(trimmed)?;
    let result = eval(&expr, &bindings)?;
    Ok((result.is_truthy(), rendered))
}

/// As [`evaluate`], but any template or expression error falls back to
/// `default` instead of propagating, returning the raw (unrendered)
/// condition string as the diagnostic when rendering itself failed.
#[must_use]
pub fn evaluate_safe(condition: &str, context: &JsonValue, default: bool) -> (bool, String) {
    match evaluate(condition, context) {
        Ok(result) => result,
        Err(_) => (default, condition.to_string()),
    }
}

/// Exposed so callers that only need the template half (no boolean
/// evaluation) can distinguish a template error from an expression error.
pub fn render_only(condition: &str, context: &JsonValue) -> Result<String, TemplateError> {
    render_str(condition, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_condition_is_true() {
        let (ok, _) = evaluate("", &json!({})).unwrap();
        assert!(ok);
    }

    #[test]
    fn literal_true_short_circuits() {
        let (ok, _) = evaluate("true", &json!({})).unwrap();
        assert!(ok);
    }

    #[test]
    fn literal_false_short_circuits() {
        let (ok, _) = evaluate("false", &json!({})).unwrap();
        assert!(!ok);
    }

    #[test]
    fn renders_then_evaluates_template_substitution() {
        let ctx = json!({"should_run": "true"});
        let (ok, rendered) = evaluate("{{should_run}}", &ctx).unwrap();
        assert!(ok);
        assert_eq!(rendered, "true");
    }

    #[test]
    fn evaluates_against_last_response_body() {
        let ctx = json!({"last_response": {"body": {"status": "declined"}, "headers": {}}});
        let (ok, _) = evaluate(r#"body.status == "declined""#, &ctx).unwrap();
        assert!(ok);
    }

    #[test]
    fn evaluate_safe_falls_back_on_parse_error() {
        let (ok, _) = evaluate_safe("not a valid $$ expr", &json!({}), true);
        assert!(ok);
        let (ok, _) = evaluate_safe("not a valid $$ expr", &json!({}), false);
        assert!(!ok);
    }
}
