use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::observation::Observation;

/// Emitted once per instance, after the scenario runner finishes (or is
/// cancelled).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub instance_id: String,
    pub run_id: String,
    pub scenario_id: String,
    pub correlation_id: String,
    pub passed: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub entry_data: Value,
    #[serde(default)]
    pub error: Option<String>,
}

/// Emitted once per visited action node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub instance_id: String,
    pub run_id: String,
    pub correlation_id: String,
    pub step_index: u32,
    pub step_name: String,
    pub step_type: String,
    pub timestamp: DateTime<Utc>,
    pub observation: Observation,
}

/// Emitted once per checkable condition inside an assert action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionRecord {
    pub instance_id: String,
    pub run_id: String,
    pub correlation_id: String,
    pub step_index: u32,
    pub assertion_name: String,
    pub passed: bool,
    #[serde(default)]
    pub expected: Option<Value>,
    #[serde(default)]
    pub actual: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}
