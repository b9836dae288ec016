use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Backoff policy for an [`HttpAction`]'s retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffPolicy {
    Fixed,
    Exponential,
}

/// Retry configuration embedded in an [`HttpAction`].
///
/// Mirrors the retry state machine's declared fields; see the executor
/// crate for the state machine itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "RetryConfig::default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub on_status: Vec<u16>,
    #[serde(default)]
    pub on_timeout: bool,
    #[serde(default)]
    pub on_connection_error: bool,
    #[serde(default = "RetryConfig::default_backoff")]
    pub backoff: BackoffPolicy,
    #[serde(default = "RetryConfig::default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "RetryConfig::default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl RetryConfig {
    const fn default_max_attempts() -> u32 {
        1
    }

    const fn default_backoff() -> BackoffPolicy {
        BackoffPolicy::Fixed
    }

    const fn default_delay_ms() -> u64 {
        0
    }

    const fn default_base_delay_ms() -> u64 {
        0
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            on_status: Vec::new(),
            on_timeout: false,
            on_connection_error: false,
            backoff: Self::default_backoff(),
            delay_ms: Self::default_delay_ms(),
            base_delay_ms: Self::default_base_delay_ms(),
        }
    }
}

/// A single HTTP call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpAction {
    pub service: String,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub query: HashMap<String, String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub extract: HashMap<String, String>,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Polls a service until a predicate holds or a timeout elapses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitAction {
    pub service: String,
    pub path: String,
    pub interval_ms: u64,
    pub timeout_ms: u64,
    pub success_predicate: String,
}

/// One checkable condition inside an [`AssertAction`]'s expectation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expectation {
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub headers_contain: HashMap<String, String>,
    #[serde(default)]
    pub body_matches: HashMap<String, Value>,
    #[serde(default)]
    pub json_schema: Option<Value>,
}

/// Checks the current `last_response` against an [`Expectation`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertAction {
    pub expect: Expectation,
}

/// A weighted random decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecideAction {
    pub decision: String,
    #[serde(default)]
    pub policy_ref: Option<String>,
    #[serde(default = "DecideAction::default_output_var")]
    pub output_var: String,
}

impl DecideAction {
    fn default_output_var() -> String {
        "decision_result".to_string()
    }
}

/// A two-way branch over nested action lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchAction {
    pub condition: String,
    #[serde(default)]
    pub if_true: Vec<Action>,
    #[serde(default)]
    pub if_false: Vec<Action>,
}

/// A unary gRPC call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrpcAction {
    pub service: String,
    /// `Package.Service/Method`.
    pub method: String,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub extract: HashMap<String, String>,
}

/// One node in a scenario's flow.
///
/// Tagged on `kind`; every variant carries a `name` (used in reporting) and
/// an optional `condition` expression evaluated before execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    Http {
        name: String,
        #[serde(default)]
        condition: Option<String>,
        #[serde(flatten)]
        action: HttpAction,
    },
    Wait {
        name: String,
        #[serde(default)]
        condition: Option<String>,
        #[serde(flatten)]
        action: WaitAction,
    },
    Assert {
        name: String,
        #[serde(default)]
        condition: Option<String>,
        #[serde(flatten)]
        action: AssertAction,
    },
    Decide {
        name: String,
        #[serde(default)]
        condition: Option<String>,
        #[serde(flatten)]
        action: DecideAction,
    },
    Branch {
        name: String,
        #[serde(flatten)]
        action: BranchAction,
    },
    Grpc {
        name: String,
        #[serde(default)]
        condition: Option<String>,
        #[serde(flatten)]
        action: GrpcAction,
    },
}

impl Action {
    /// The reporting name common to every action kind.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Http { name, .. }
            | Self::Wait { name, .. }
            | Self::Assert { name, .. }
            | Self::Decide { name, .. }
            | Self::Branch { name, .. }
            | Self::Grpc { name, .. } => name,
        }
    }

    /// The `kind` tag as it appears on the wire.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http { .. } => "http",
            Self::Wait { .. } => "wait",
            Self::Assert { .. } => "assert",
            Self::Decide { .. } => "decide",
            Self::Branch { .. } => "branch",
            Self::Grpc { .. } => "grpc",
        }
    }

    /// The per-action condition expression, if any.
    ///
    /// `BranchAction` has no condition of its own: its two child lists are
    /// selected by the branch's own `condition` field, which is a distinct
    /// concept from the optional skip-condition on other action kinds.
    #[must_use]
    pub fn condition(&self) -> Option<&str> {
        match self {
            Self::Http { condition, .. }
            | Self::Wait { condition, .. }
            | Self::Assert { condition, .. }
            | Self::Decide { condition, .. }
            | Self::Grpc { condition, .. } => condition.as_deref(),
            Self::Branch { .. } => None,
        }
    }
}
