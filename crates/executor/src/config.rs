use serde_json::Value;
use turbulence_fault::TurbulenceConfig;
use turbulence_runner::Policy;

/// Configuration for one [`crate::ParallelExecutor::run`] call (§6).
///
/// `entries` supplies per-instance seed data: instance `i` gets
/// `entries[i % entries.len()]` as its `entry` context value, or
/// [`Value::Null`] when `entries` is empty. `fail_on` is a render-then-evaluate
/// condition (§4.3) checked against the instance's final context; when it
/// evaluates true the instance is recorded as failed regardless of whether
/// every step observation was `ok`.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub instances: u32,
    pub parallelism: usize,
    pub seed: Option<u64>,
    pub fail_on: Option<String>,
    pub entries: Vec<Value>,
    pub turbulence: Option<TurbulenceConfig>,
    pub decide_policy: Option<Policy>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            instances: 1,
            parallelism: 1,
            seed: None,
            fail_on: None,
            entries: Vec::new(),
            turbulence: None,
            decide_policy: None,
        }
    }
}

impl RunConfig {
    #[must_use]
    pub fn with_instances(mut self, instances: u32) -> Self {
        self.instances = instances;
        self
    }

    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn with_fail_on(mut self, condition: impl Into<String>) -> Self {
        self.fail_on = Some(condition.into());
        self
    }

    #[must_use]
    pub fn with_entries(mut self, entries: Vec<Value>) -> Self {
        self.entries = entries;
        self
    }

    #[must_use]
    pub fn with_turbulence(mut self, turbulence: TurbulenceConfig) -> Self {
        self.turbulence = Some(turbulence);
        self
    }

    #[must_use]
    pub fn with_decide_policy(mut self, policy: Policy) -> Self {
        self.decide_policy = Some(policy);
        self
    }

    /// Returns the seed-data entry for instance `index`, per the wraparound
    /// rule documented on the struct.
    #[must_use]
    pub fn entry_for(&self, index: u32) -> Value {
        if self.entries.is_empty() {
            Value::Null
        } else {
            self.entries[index as usize % self.entries.len()].clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = RunConfig::default();
        assert_eq!(config.instances, 1);
        assert_eq!(config.parallelism, 1);
        assert!(config.seed.is_none());
    }

    #[test]
    fn entry_for_wraps_around_when_fewer_entries_than_instances() {
        let config = RunConfig::default().with_entries(vec![Value::from(1), Value::from(2)]);
        assert_eq!(config.entry_for(0), Value::from(1));
        assert_eq!(config.entry_for(1), Value::from(2));
        assert_eq!(config.entry_for(2), Value::from(1));
    }

    #[test]
    fn entry_for_is_null_when_no_entries_configured() {
        let config = RunConfig::default();
        assert_eq!(config.entry_for(0), Value::Null);
    }
}
