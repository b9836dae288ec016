use std::collections::HashMap;

use serde_json::Value;
use serde_json_path::JsonPath;
use turbulence_core::{Action, AssertAction, Expectation, Observation, WorkflowContext};

use crate::error::RunnerError;
use crate::runner_trait::ActionRunner;

/// One checkable condition inside an [`Expectation`], as evaluated against
/// `last_response`. The scenario runner turns each of these into an
/// `AssertionRecord`; [`AssertRunner`] itself only needs their conjunction.
#[derive(Debug, Clone)]
pub struct AssertionOutcome {
    pub name: String,
    pub passed: bool,
    pub expected: Option<Value>,
    pub actual: Option<Value>,
    pub message: Option<String>,
}

/// Evaluates every check declared in an [`Expectation`] against the current
/// `last_response`, without mutating context (§4.9).
#[must_use]
pub fn evaluate_expectation(expectation: &Expectation, last_response: &Value) -> Vec<AssertionOutcome> {
    let mut outcomes = Vec::new();
    let status = last_response.get("status_code").and_then(Value::as_u64);
    let headers = last_response.get("headers").cloned().unwrap_or(Value::Object(serde_json::Map::new()));
    let body = last_response.get("body").cloned().unwrap_or(Value::Null);

    if let Some(expected_status) = expectation.status_code {
        let actual = status.map(|s| Value::from(s));
        outcomes.push(AssertionOutcome {
            name: "status_code".to_string(),
            passed: status == Some(u64::from(expected_status)),
            expected: Some(Value::from(expected_status)),
            actual,
            message: None,
        });
    }

    for (key, expected_value) in &expectation.headers_contain {
        let actual_value = headers.get(key).cloned();
        outcomes.push(AssertionOutcome {
            name: format!("headers_contain.{key}"),
            passed: actual_value.as_ref().and_then(Value::as_str) == Some(expected_value.as_str()),
            expected: Some(Value::String(expected_value.clone())),
            actual: actual_value,
            message: None,
        });
    }

    for (path, expected_value) in &expectation.body_matches {
        let actual_value = match JsonPath::parse(path) {
            Ok(jsonpath) => jsonpath.query(&body).exactly_one().ok().cloned(),
            Err(err) => {
                outcomes.push(AssertionOutcome {
                    name: format!("body_matches.{path}"),
                    passed: false,
                    expected: Some(expected_value.clone()),
                    actual: None,
                    message: Some(format!("invalid jsonpath {path:?}: {err}")),
                });
                continue;
            }
        };
        outcomes.push(AssertionOutcome {
            name: format!("body_matches.{path}"),
            passed: actual_value.as_ref() == Some(expected_value),
            expected: Some(expected_value.clone()),
            actual: actual_value,
            message: None,
        });
    }

    if let Some(schema) = &expectation.json_schema {
        match jsonschema::validator_for(schema) {
            Ok(validator) => {
                let passed = validator.is_valid(&body);
                outcomes.push(AssertionOutcome {
                    name: "json_schema".to_string(),
                    passed,
                    expected: Some(schema.clone()),
                    actual: Some(body.clone()),
                    message: None,
                });
            }
            Err(err) => {
                outcomes.push(AssertionOutcome {
                    name: "json_schema".to_string(),
                    passed: false,
                    expected: Some(schema.clone()),
                    actual: Some(body.clone()),
                    message: Some(format!("invalid json schema: {err}")),
                });
            }
        }
    }

    outcomes
}

/// Checks `last_response` against an [`AssertAction`]'s expectation.
/// Produces no I/O and does not mutate context.
pub struct AssertRunner;

impl AssertRunner {
    fn run_assert(&self, name: &str, action: &AssertAction, context: WorkflowContext) -> (Observation, WorkflowContext) {
        let last_response = context.last_response();
        let outcomes = evaluate_expectation(&action.expect, &last_response);
        let ok = outcomes.iter().all(|o| o.passed);
        let errors = outcomes.iter().filter(|o| !o.passed).map(|o| o.name.clone()).collect();

        let observation = Observation {
            ok,
            protocol: "assert".to_string(),
            action_name: name.to_string(),
            service: None,
            status_code: None,
            latency_ms: 0.0,
            headers: HashMap::new(),
            body: Value::Null,
            errors,
            metadata: HashMap::new(),
            attempts: Vec::new(),
            branch_condition: None,
            branch_result: None,
            branch_taken: None,
            condition_skipped: false,
        };

        (observation, context)
    }
}

impl ActionRunner for AssertRunner {
    async fn run(&self, action: &Action, context: WorkflowContext) -> Result<(Observation, WorkflowContext), RunnerError> {
        match action {
            Action::Assert { name, action, .. } => Ok(self.run_assert(name, action, context)),
            other => Err(RunnerError::UnknownKind(other.kind().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_code_match_passes() {
        let expectation = Expectation { status_code: Some(200), headers_contain: HashMap::new(), body_matches: HashMap::new(), json_schema: None };
        let last_response = json!({"status_code": 200, "headers": {}, "body": {}});
        let outcomes = evaluate_expectation(&expectation, &last_response);
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].passed);
    }

    #[test]
    fn body_matches_jsonpath_value() {
        let mut body_matches = HashMap::new();
        body_matches.insert("$.user.id".to_string(), json!(42));
        let expectation = Expectation { status_code: None, headers_contain: HashMap::new(), body_matches, json_schema: None };
        let last_response = json!({"status_code": 200, "headers": {}, "body": {"user": {"id": 42}}});
        let outcomes = evaluate_expectation(&expectation, &last_response);
        assert!(outcomes[0].passed);
    }

    #[test]
    fn mismatched_header_fails() {
        let mut headers_contain = HashMap::new();
        headers_contain.insert("content-type".to_string(), "application/json".to_string());
        let expectation = Expectation { status_code: None, headers_contain, body_matches: HashMap::new(), json_schema: None };
        let last_response = json!({"status_code": 200, "headers": {"content-type": "text/plain"}, "body": {}});
        let outcomes = evaluate_expectation(&expectation, &last_response);
        assert!(!outcomes[0].passed);
    }

    #[test]
    fn json_schema_match_passes_and_mismatch_fails() {
        let schema = json!({
            "type": "object",
            "required": ["id"],
            "properties": {"id": {"type": "integer"}},
        });
        let expectation = Expectation { status_code: None, headers_contain: HashMap::new(), body_matches: HashMap::new(), json_schema: Some(schema.clone()) };

        let matching = json!({"status_code": 200, "headers": {}, "body": {"id": 42}});
        let outcomes = evaluate_expectation(&expectation, &matching);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].name, "json_schema");
        assert!(outcomes[0].passed);

        let mismatched = json!({"status_code": 200, "headers": {}, "body": {"id": "not-a-number"}});
        let outcomes = evaluate_expectation(&expectation, &mismatched);
        assert!(!outcomes[0].passed);
    }

    #[tokio::test]
    async fn assert_runner_does_not_mutate_context() {
        let mut context = WorkflowContext::new("i1", "r1", "c1");
        context.set_last_response(200, HashMap::new(), json!({}));
        let before = context.as_value();
        let action = Action::Assert {
            name: "check-status".to_string(),
            condition: None,
            action: AssertAction { expect: Expectation { status_code: Some(200), headers_contain: HashMap::new(), body_matches: HashMap::new(), json_schema: None } },
        };
        let (observation, context) = AssertRunner.run(&action, context).await.unwrap();
        assert!(observation.ok);
        assert_eq!(context.as_value(), before);
    }
}
