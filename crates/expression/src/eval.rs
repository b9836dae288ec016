use std::collections::HashMap;

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::ExpressionError;
use crate::value::Value;

/// The fixed set of names an expression may reference.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    pub context: Value,
    pub body: Value,
    pub headers: Value,
}

impl Bindings {
    #[must_use]
    pub fn new(context: Value, body: Value, headers: Value) -> Self {
        Self { context, body, headers }
    }

    fn resolve(&self, name: &str) -> Option<&Value> {
        match name {
            "context" => Some(&self.context),
            "body" => Some(&self.body),
            "headers" => Some(&self.headers),
            _ => None,
        }
    }
}

/// Evaluates a parsed expression against a fixed set of bindings.
///
/// Recursive by construction (one call per `Expr` node); no node performs
/// I/O or unbounded iteration, so evaluation always terminates in time
/// linear in the expression's size.
pub fn eval(expr: &Expr, bindings: &Bindings) -> Result<Value, ExpressionError> {
    match expr {
        Expr::Null => Ok(Value::Null),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Int(i) => Ok(Value::Int(*i)),
        Expr::Float(f) => Ok(Value::Float(*f)),
        Expr::Str(s) => Ok(Value::String(s.clone())),
        Expr::Ident(name) => bindings
            .resolve(name)
            .cloned()
            .ok_or_else(|| ExpressionError::Type(format!("unbound identifier {name:?}"))),
        Expr::Attr(base, name) => eval(base, bindings)?.field(name),
        Expr::Index(base, index) => {
            let base = eval(base, bindings)?;
            let index = eval(index, bindings)?;
            base.index(&index)
        }
        Expr::MethodCall(base, name, args) => {
            let base = eval(base, bindings)?;
            let args = args.iter().map(|a| eval(a, bindings)).collect::<Result<Vec<_>, _>>()?;
            call_method(&base, name, &args)
        }
        Expr::Call(name, args) => {
            let args = args.iter().map(|a| eval(a, bindings)).collect::<Result<Vec<_>, _>>()?;
            call_builtin(name, &args)
        }
        Expr::Unary(UnaryOp::Not, inner) => Ok(Value::Bool(!eval(inner, bindings)?.is_truthy())),
        Expr::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, bindings),
    }
}

fn eval_binary(op: BinaryOp, lhs: &Expr, rhs: &Expr, bindings: &Bindings) -> Result<Value, ExpressionError> {
    // `and`/`or` short-circuit; every other operator evaluates both sides.
    match op {
        BinaryOp::And => {
            let lhs = eval(lhs, bindings)?;
            if !lhs.is_truthy() {
                return Ok(lhs);
            }
            eval(rhs, bindings)
        }
        BinaryOp::Or => {
            let lhs = eval(lhs, bindings)?;
            if lhs.is_truthy() {
                return Ok(lhs);
            }
            eval(rhs, bindings)
        }
        BinaryOp::Eq => Ok(Value::Bool(eval(lhs, bindings)? == eval(rhs, bindings)?)),
        BinaryOp::Ne => Ok(Value::Bool(eval(lhs, bindings)? != eval(rhs, bindings)?)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let lhs = eval(lhs, bindings)?;
            let rhs = eval(rhs, bindings)?;
            let ordering = lhs.partial_cmp(&rhs).ok_or_else(|| {
                ExpressionError::Type(format!("cannot compare {} and {}", lhs.type_name(), rhs.type_name()))
            })?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                BinaryOp::Ge => ordering.is_ge(),
                BinaryOp::And | BinaryOp::Or | BinaryOp::Eq | BinaryOp::Ne | BinaryOp::In | BinaryOp::NotIn => {
                    unreachable!()
                }
            }))
        }
        BinaryOp::In | BinaryOp::NotIn => {
            let needle = eval(lhs, bindings)?;
            let haystack = eval(rhs, bindings)?;
            let found = match &haystack {
                Value::List(items) => items.contains(&needle),
                Value::Map(map) => matches!(&needle, Value::String(key) if map.contains_key(key)),
                Value::String(s) => matches!(&needle, Value::String(sub) if s.contains(sub.as_str())),
                other => {
                    return Err(ExpressionError::Type(format!("cannot test membership in {}", other.type_name())));
                }
            };
            Ok(Value::Bool(if matches!(op, BinaryOp::In) { found } else { !found }))
        }
    }
}

fn call_method(base: &Value, name: &str, args: &[Value]) -> Result<Value, ExpressionError> {
    match name {
        "get" => {
            let Value::Map(map) = base else {
                return Err(ExpressionError::Type(format!("get() is not defined on {}", base.type_name())));
            };
            let key = match args.first() {
                Some(Value::String(key)) => key,
                _ => return Err(ExpressionError::Arity("get", 1, args.len())),
            };
            let default = args.get(1).cloned().unwrap_or(Value::Null);
            Ok(map.get(key).cloned().unwrap_or(default))
        }
        other => Err(ExpressionError::Type(format!("unknown method {other:?}"))),
    }
}

fn call_builtin(name: &str, args: &[Value]) -> Result<Value, ExpressionError> {
    match name {
        "len" => match args {
            [Value::List(items)] => Ok(Value::Int(i64::try_from(items.len()).unwrap_or(i64::MAX))),
            [Value::Map(map)] => Ok(Value::Int(i64::try_from(map.len()).unwrap_or(i64::MAX))),
            [Value::String(s)] => Ok(Value::Int(i64::try_from(s.chars().count()).unwrap_or(i64::MAX))),
            [other] => Err(ExpressionError::Type(format!("len() is not defined on {}", other.type_name()))),
            _ => Err(ExpressionError::Arity("len", 1, args.len())),
        },
        "str" => match args {
            [value] => Ok(Value::String(value.display_string())),
            _ => Err(ExpressionError::Arity("str", 1, args.len())),
        },
        "int" => match args {
            [Value::Int(i)] => Ok(Value::Int(*i)),
            [Value::Float(f)] => Ok(Value::Int(*f as i64)),
            [Value::String(s)] => s
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| ExpressionError::Type(format!("cannot convert {s:?} to int"))),
            [Value::Bool(b)] => Ok(Value::Int(i64::from(*b))),
            _ => Err(ExpressionError::Arity("int", 1, args.len())),
        },
        "float" => match args {
            [Value::Int(i)] => Ok(Value::Float(*i as f64)),
            [Value::Float(f)] => Ok(Value::Float(*f)),
            [Value::String(s)] => s
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| ExpressionError::Type(format!("cannot convert {s:?} to float"))),
            _ => Err(ExpressionError::Arity("float", 1, args.len())),
        },
        other => Err(ExpressionError::Type(format!("unknown function {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use serde_json::json;

    fn bindings(context: serde_json::Value, body: serde_json::Value) -> Bindings {
        Bindings::new(Value::from_json(&context), Value::from_json(&body), Value::Map(HashMap::new()))
    }

    #[test]
    fn evaluates_equality() {
        let expr = parse(r#"body.status == "ok""#).unwrap();
        let b = bindings(json!({}), json!({"status": "ok"}));
        assert_eq!(eval(&expr, &b).unwrap(), Value::Bool(true));
    }

    #[test]
    fn evaluates_boolean_composition() {
        let expr = parse("context.a and not context.b").unwrap();
        let b = bindings(json!({"a": true, "b": false}), json!({}));
        assert_eq!(eval(&expr, &b).unwrap(), Value::Bool(true));
    }

    #[test]
    fn evaluates_membership() {
        let expr = parse(r#""x" in body.tags"#).unwrap();
        let b = bindings(json!({}), json!({"tags": ["x", "y"]}));
        assert_eq!(eval(&expr, &b).unwrap(), Value::Bool(true));
    }

    #[test]
    fn evaluates_get_with_default() {
        let expr = parse(r#"context.get("missing", "fallback")"#).unwrap();
        let b = bindings(json!({}), json!({}));
        assert_eq!(eval(&expr, &b).unwrap(), Value::String("fallback".to_string()));
    }

    #[test]
    fn evaluates_len_builtin() {
        let expr = parse("len(body.items) > 1").unwrap();
        let b = bindings(json!({}), json!({"items": [1, 2, 3]}));
        assert_eq!(eval(&expr, &b).unwrap(), Value::Bool(true));
    }

    #[test]
    fn and_short_circuits_without_evaluating_rhs_error() {
        // `context.missing` would error on field access if `context` were a
        // non-map, but `false and ...` must short-circuit before touching it.
        let expr = parse("false and context.anything").unwrap();
        let b = bindings(json!("not-a-map"), json!({}));
        assert_eq!(eval(&expr, &b).unwrap(), Value::Bool(false));
    }

    #[test]
    fn comparison_across_int_and_float_succeeds() {
        let expr = parse("context.n > 1").unwrap();
        let b = bindings(json!({"n": 1.5}), json!({}));
        assert_eq!(eval(&expr, &b).unwrap(), Value::Bool(true));
    }
}
