use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One attempt within a retried HTTP action, or one poll within a wait
/// action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub error: Option<String>,
    pub latency_ms: f64,
}

/// Which branch of a [`crate::action::BranchAction`] was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchTaken {
    IfTrue,
    IfFalse,
}

/// The structured result of executing one action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub ok: bool,
    pub protocol: String,
    pub action_name: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub status_code: Option<u16>,
    pub latency_ms: f64,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    #[serde(default)]
    pub attempts: Vec<AttemptRecord>,
    #[serde(default)]
    pub branch_condition: Option<String>,
    #[serde(default)]
    pub branch_result: Option<bool>,
    #[serde(default)]
    pub branch_taken: Option<BranchTaken>,
    #[serde(default)]
    pub condition_skipped: bool,
}

impl Observation {
    #[must_use]
    pub fn skipped(action_name: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            ok: true,
            protocol: protocol.into(),
            action_name: action_name.into(),
            service: None,
            status_code: None,
            latency_ms: 0.0,
            headers: HashMap::new(),
            body: Value::Null,
            errors: Vec::new(),
            metadata: HashMap::new(),
            attempts: Vec::new(),
            branch_condition: None,
            branch_result: None,
            branch_taken: None,
            condition_skipped: true,
        }
    }

    #[must_use]
    pub fn branch_decision(
        action_name: impl Into<String>,
        condition: impl Into<String>,
        result: bool,
        taken: BranchTaken,
    ) -> Self {
        Self {
            ok: true,
            protocol: "branch".to_string(),
            action_name: action_name.into(),
            service: None,
            status_code: None,
            latency_ms: 0.0,
            headers: HashMap::new(),
            body: Value::Null,
            errors: Vec::new(),
            metadata: HashMap::new(),
            attempts: Vec::new(),
            branch_condition: Some(condition.into()),
            branch_result: Some(result),
            branch_taken: Some(taken),
            condition_skipped: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_observation_has_zero_latency_and_no_io() {
        let obs = Observation::skipped("b-step", "http");
        assert!(obs.ok);
        assert!(obs.condition_skipped);
        assert_eq!(obs.latency_ms, 0.0);
        assert!(obs.attempts.is_empty());
    }

    #[test]
    fn branch_decision_records_taken_path() {
        let obs = Observation::branch_decision("pick-path", "x == 1", false, BranchTaken::IfFalse);
        assert_eq!(obs.branch_taken, Some(BranchTaken::IfFalse));
        assert_eq!(obs.branch_result, Some(false));
    }
}
