use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Injects extra latency before a wrapped action runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyInjection {
    pub min_ms: u64,
    pub max_ms: u64,
}

/// Replaces a successful outcome with a synthetic error status, with the
/// given probability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSubstitution {
    pub probability: f64,
    pub status_code: u16,
}

/// Suppresses the wrapped action entirely, raising a synthetic connection
/// error, with the given probability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropPolicy {
    pub probability: f64,
}

/// A fault-injection directive for one `(service, action_name)` pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurbulencePolicy {
    #[serde(default)]
    pub latency: Option<LatencyInjection>,
    #[serde(default)]
    pub status_substitution: Option<StatusSubstitution>,
    #[serde(default)]
    pub drop: Option<DropPolicy>,
}

/// Maps `(service, action_name)` to a [`TurbulencePolicy`].
#[derive(Debug, Clone, Default)]
pub struct TurbulenceConfig {
    policies: HashMap<(String, String), TurbulencePolicy>,
}

impl TurbulenceConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_policy(mut self, service: impl Into<String>, action_name: impl Into<String>, policy: TurbulencePolicy) -> Self {
        self.policies.insert((service.into(), action_name.into()), policy);
        self
    }

    #[must_use]
    pub fn get(&self, service: &str, action_name: &str) -> Option<&TurbulencePolicy> {
        self.policies.get(&(service.to_string(), action_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_policy_by_service_and_action() {
        let config = TurbulenceConfig::new().with_policy(
            "payments",
            "charge",
            TurbulencePolicy { drop: Some(DropPolicy { probability: 0.1 }), ..Default::default() },
        );
        assert!(config.get("payments", "charge").is_some());
        assert!(config.get("payments", "refund").is_none());
    }
}
