use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use turbulence_core::{Action, DecideAction, Observation, WorkflowContext};

use crate::error::RunnerError;
use crate::runner_trait::ActionRunner;

/// A decision name mapped to its weighted options.
pub type Policy = HashMap<String, HashMap<String, f64>>;

/// Performs a weighted random selection per §4.10.
///
/// Holds its own seeded RNG behind a mutex so that repeated calls from the
/// same runner, built from the same seed, yield an identical sequence of
/// choices — the determinism law in §8 is about the sequence, not just a
/// single call.
pub struct DecideRunner {
    policy: Arc<Policy>,
    rng: Mutex<ChaCha12Rng>,
}

impl DecideRunner {
    #[must_use]
    pub fn new(policy: Arc<Policy>, seed: u64) -> Self {
        let mut seed_bytes = [0u8; 32];
        seed_bytes[..8].copy_from_slice(&seed.to_le_bytes());
        Self { policy, rng: Mutex::new(ChaCha12Rng::from_seed(seed_bytes)) }
    }

    fn run_decide(&self, name: &str, action: &DecideAction, mut context: WorkflowContext) -> (Observation, WorkflowContext) {
        let Some(options) = self.policy.get(&action.decision) else {
            let observation = Observation {
                ok: false,
                protocol: "decide".to_string(),
                action_name: name.to_string(),
                service: None,
                status_code: None,
                latency_ms: 0.0,
                headers: HashMap::new(),
                body: serde_json::Value::Null,
                errors: vec![format!("no policy registered for decision {:?}", action.decision)],
                metadata: HashMap::new(),
                attempts: Vec::new(),
                branch_condition: None,
                branch_result: None,
                branch_taken: None,
                condition_skipped: false,
            };
            return (observation, context);
        };

        let chosen = self.choose(options);
        context.set(action.output_var.clone(), serde_json::Value::String(chosen.clone()));

        let observation = Observation {
            ok: true,
            protocol: "decide".to_string(),
            action_name: name.to_string(),
            service: None,
            status_code: None,
            latency_ms: 0.0,
            headers: HashMap::new(),
            body: serde_json::json!({"decision": action.decision, "result": chosen}),
            errors: Vec::new(),
            metadata: HashMap::new(),
            attempts: Vec::new(),
            branch_condition: None,
            branch_result: None,
            branch_taken: None,
            condition_skipped: false,
        };
        (observation, context)
    }

    fn choose(&self, options: &HashMap<String, f64>) -> String {
        let mut rng = self.rng.lock().expect("decide rng mutex poisoned");
        let total: f64 = options.values().sum();

        // Iteration order over a HashMap is not insertion order; sort by key
        // so the cumulative-weight walk is deterministic across runs.
        let mut sorted: Vec<(&String, &f64)> = options.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        if total <= 0.0 {
            let index = rng.gen_range(0..sorted.len());
            return sorted[index].0.clone();
        }

        let threshold = rng.gen::<f64>() * total;
        let mut cumulative = 0.0;
        for (option, weight) in &sorted {
            cumulative += *weight;
            if cumulative >= threshold {
                return (*option).clone();
            }
        }
        sorted.last().expect("policy always has at least one option").0.clone()
    }
}

impl ActionRunner for DecideRunner {
    async fn run(&self, action: &Action, context: WorkflowContext) -> Result<(Observation, WorkflowContext), RunnerError> {
        match action {
            Action::Decide { name, action, .. } => Ok(self.run_decide(name, action, context)),
            other => Err(RunnerError::UnknownKind(other.kind().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> Arc<Policy> {
        let mut options = HashMap::new();
        options.insert("a".to_string(), 0.5);
        options.insert("b".to_string(), 0.3);
        options.insert("c".to_string(), 0.2);
        let mut policy = HashMap::new();
        policy.insert("browse".to_string(), options);
        Arc::new(policy)
    }

    fn decide_action() -> Action {
        Action::Decide {
            name: "pick".to_string(),
            condition: None,
            action: DecideAction { decision: "browse".to_string(), policy_ref: None, output_var: "decision_result".to_string() },
        }
    }

    #[tokio::test]
    async fn same_seed_yields_same_sequence() {
        let runner_a = DecideRunner::new(policy(), 12345);
        let runner_b = DecideRunner::new(policy(), 12345);
        let action = decide_action();

        for _ in 0..10 {
            let (obs_a, ctx_a) = runner_a.run(&action, WorkflowContext::new("i", "r", "c")).await.unwrap();
            let (obs_b, ctx_b) = runner_b.run(&action, WorkflowContext::new("i", "r", "c")).await.unwrap();
            assert_eq!(obs_a.body, obs_b.body);
            assert_eq!(ctx_a.get("decision_result"), ctx_b.get("decision_result"));
        }
    }

    #[tokio::test]
    async fn missing_decision_fails_without_mutating_context() {
        let runner = DecideRunner::new(policy(), 1);
        let action = Action::Decide {
            name: "pick".to_string(),
            condition: None,
            action: DecideAction { decision: "unknown".to_string(), policy_ref: None, output_var: "decision_result".to_string() },
        };
        let context = WorkflowContext::new("i", "r", "c");
        let (observation, context) = runner.run(&action, context).await.unwrap();
        assert!(!observation.ok);
        assert!(context.get("decision_result").is_none());
    }

    #[tokio::test]
    async fn zero_weight_sum_falls_back_to_uniform_choice() {
        let mut options = HashMap::new();
        options.insert("a".to_string(), 0.0);
        options.insert("b".to_string(), 0.0);
        let mut policy_map = HashMap::new();
        policy_map.insert("browse".to_string(), options);
        let runner = DecideRunner::new(Arc::new(policy_map), 7);
        let action = decide_action();
        let context = WorkflowContext::new("i", "r", "c");
        let (observation, _) = runner.run(&action, context).await.unwrap();
        assert!(observation.ok);
    }
}
