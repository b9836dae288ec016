use std::collections::HashMap;

use serde_json::Value as JsonValue;

use crate::error::ExpressionError;

/// The runtime representation the sandbox evaluates expressions into.
///
/// A thin wrapper over the JSON value space, kept as its own type (rather
/// than evaluating directly over `serde_json::Value`) so arithmetic and
/// comparison rules can differ from JSON's — e.g. integers and floats
/// compare across variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl Value {
    #[must_use]
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            JsonValue::String(s) => Self::String(s.clone()),
            JsonValue::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            JsonValue::Object(map) => {
                Self::Map(map.iter().map(|(k, v)| (k.clone(), Self::from_json(v))).collect())
            }
        }
    }

    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Map(map) => !map.is_empty(),
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    #[must_use]
    pub fn display_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => s.clone(),
            Self::List(_) | Self::Map(_) => self.to_json().to_string(),
        }
    }

    pub fn field(&self, name: &str) -> Result<Value, ExpressionError> {
        match self {
            Self::Map(map) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
            other => Err(ExpressionError::Type(format!(
                "cannot access field {name:?} on {}",
                other.type_name()
            ))),
        }
    }

    pub fn index(&self, index: &Value) -> Result<Value, ExpressionError> {
        match (self, index) {
            (Self::List(items), Self::Int(i)) => {
                let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
                let resolved = if *i < 0 { i + len } else { *i };
                usize::try_from(resolved)
                    .ok()
                    .and_then(|idx| items.get(idx))
                    .cloned()
                    .ok_or_else(|| ExpressionError::Type(format!("index {i} out of range")))
            }
            (Self::Map(map), Self::String(key)) => Ok(map.get(key).cloned().unwrap_or(Value::Null)),
            (other, _) => Err(ExpressionError::Type(format!("cannot index into {}", other.type_name()))),
        }
    }

    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(i) => JsonValue::Number((*i).into()),
            Self::Float(f) => serde_json::Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
            Self::String(s) => JsonValue::String(s.clone()),
            Self::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Self::Map(map) => JsonValue::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()),
        }
    }

    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a.partial_cmp(b),
            _ => self.as_f64()?.partial_cmp(&other.as_f64()?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_preserves_int_vs_float() {
        assert_eq!(Value::from_json(&json!(3)), Value::Int(3));
        assert!(matches!(Value::from_json(&json!(3.5)), Value::Float(_)));
    }

    #[test]
    fn truthiness_matches_python_style_rules() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::String(String::new()).is_truthy());
        assert!(Value::Int(1).is_truthy());
        assert!(!Value::List(Vec::new()).is_truthy());
    }

    #[test]
    fn field_access_on_non_map_errors() {
        assert!(Value::Int(1).field("x").is_err());
    }

    #[test]
    fn negative_index_wraps_from_end() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(list.index(&Value::Int(-1)).unwrap(), Value::Int(3));
    }

    #[test]
    fn numeric_ordering_compares_int_and_float() {
        assert!(Value::Int(1) < Value::Float(1.5));
    }
}
