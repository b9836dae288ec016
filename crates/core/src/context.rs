use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved key under which the most recent HTTP or wait response is kept.
pub const LAST_RESPONSE_KEY: &str = "last_response";

/// The mutable mapping threaded through one instance's execution.
///
/// Backed by a plain [`serde_json::Map`] rather than a typed struct: most of
/// its keys are user-defined (via `extract` maps and `decide` output
/// variables), so the context is a bag of JSON values, not a fixed schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowContext {
    values: serde_json::Map<String, Value>,
}

impl WorkflowContext {
    #[must_use]
    pub fn new(instance_id: impl Into<String>, run_id: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        let mut values = serde_json::Map::new();
        values.insert("instance_id".to_string(), Value::String(instance_id.into()));
        values.insert("run_id".to_string(), Value::String(run_id.into()));
        values.insert("correlation_id".to_string(), Value::String(correlation_id.into()));
        Self { values }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn set_entry(&mut self, entry: Value) {
        self.values.insert("entry".to_string(), entry);
    }

    pub fn set_last_response(&mut self, status_code: u16, headers: HashMap<String, String>, body: Value) {
        let response = serde_json::json!({
            "status_code": status_code,
            "headers": headers,
            "body": body,
        });
        self.values.insert(LAST_RESPONSE_KEY.to_string(), response);
    }

    #[must_use]
    pub fn last_response(&self) -> Value {
        self.values.get(LAST_RESPONSE_KEY).cloned().unwrap_or(Value::Null)
    }

    #[must_use]
    pub fn last_response_body(&self) -> Value {
        self.last_response().get("body").cloned().unwrap_or(Value::Null)
    }

    #[must_use]
    pub fn instance_id(&self) -> &str {
        self.values.get("instance_id").and_then(Value::as_str).unwrap_or_default()
    }

    #[must_use]
    pub fn as_value(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_carries_ids() {
        let ctx = WorkflowContext::new("inst-1", "run-1", "corr-1");
        assert_eq!(ctx.instance_id(), "inst-1");
        assert_eq!(ctx.get("run_id").unwrap(), "run-1");
    }

    #[test]
    fn last_response_starts_null() {
        let ctx = WorkflowContext::new("i", "r", "c");
        assert_eq!(ctx.last_response(), Value::Null);
        assert_eq!(ctx.last_response_body(), Value::Null);
    }

    #[test]
    fn set_last_response_updates_body() {
        let mut ctx = WorkflowContext::new("i", "r", "c");
        ctx.set_last_response(200, HashMap::new(), serde_json::json!({"ok": true}));
        assert_eq!(ctx.last_response_body(), serde_json::json!({"ok": true}));
    }

    #[test]
    fn decide_and_assert_do_not_need_last_response_to_mutate_other_keys() {
        let mut ctx = WorkflowContext::new("i", "r", "c");
        ctx.set("decision_result", Value::String("a".to_string()));
        assert_eq!(ctx.get("decision_result").unwrap(), "a");
        assert_eq!(ctx.last_response(), Value::Null);
    }
}
