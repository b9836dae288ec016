use serde::{Deserialize, Serialize};

use crate::action::Action;

/// Terminates a scenario early.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopCondition {
    #[serde(default = "StopCondition::default_max_steps")]
    pub max_steps: u32,
    #[serde(default)]
    pub any_action_fails: bool,
}

impl StopCondition {
    const fn default_max_steps() -> u32 {
        100
    }
}

impl Default for StopCondition {
    fn default() -> Self {
        Self {
            max_steps: Self::default_max_steps(),
            any_action_fails: false,
        }
    }
}

/// An ordered tree of actions with a stop condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    pub flow: Vec<Action>,
    #[serde(default)]
    pub stop_when: StopCondition,
}

impl Scenario {
    #[must_use]
    pub fn new(id: impl Into<String>, flow: Vec<Action>) -> Self {
        Self {
            id: id.into(),
            description: None,
            flow,
            stop_when: StopCondition::default(),
        }
    }

    #[must_use]
    pub fn with_stop_when(mut self, stop_when: StopCondition) -> Self {
        self.stop_when = stop_when;
        self
    }
}
