use std::future::Future;
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use turbulence_core::{Observation, WorkflowContext};

use crate::error::FaultError;
use crate::policy::TurbulencePolicy;
use crate::seed::derive_seed;

/// Resolves `(service, action_name)` pairs to policies and wraps execution
/// of the matched actions with latency injection, status substitution, or
/// drop, per §4.13.
pub struct TurbulenceEngine {
    run_seed: u64,
}

impl TurbulenceEngine {
    #[must_use]
    pub fn new(run_seed: u64) -> Self {
        Self { run_seed }
    }

    /// Wraps one action execution with a policy's injected faults.
    ///
    /// `execute` is only invoked if the policy's drop probability does not
    /// trigger; when it does, a synthetic connection-error observation is
    /// returned with `context` unchanged, matching the contract that a
    /// dropped action performs no I/O.
    pub async fn apply<F, Fut>(
        &self,
        policy: &TurbulencePolicy,
        action_name: &str,
        service: &str,
        instance_id: &str,
        context: WorkflowContext,
        execute: F,
    ) -> Result<(Observation, WorkflowContext), FaultError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(Observation, WorkflowContext), FaultError>>,
    {
        let seed = derive_seed(self.run_seed, instance_id, action_name, service);
        let mut rng = ChaCha12Rng::from_seed(seed);

        if let Some(drop) = &policy.drop {
            if rng.gen_bool(drop.probability.clamp(0.0, 1.0)) {
                tracing::warn!(action_name, service, instance_id, "turbulence: dropping action");
                let mut observation = Observation::skipped(action_name, "turbulence");
                observation.ok = false;
                observation.condition_skipped = false;
                observation.errors.push("connection dropped by turbulence policy".to_string());
                return Ok((observation, context));
            }
        }

        if let Some(latency) = &policy.latency {
            let delay_ms = if latency.max_ms > latency.min_ms {
                rng.gen_range(latency.min_ms..=latency.max_ms)
            } else {
                latency.min_ms
            };
            if delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }

        let (mut observation, context) = execute().await?;

        if let Some(sub) = &policy.status_substitution {
            if rng.gen_bool(sub.probability.clamp(0.0, 1.0)) {
                tracing::warn!(action_name, service, instance_id, status = sub.status_code, "turbulence: substituting status");
                observation.status_code = Some(sub.status_code);
                observation.ok = false;
                observation.errors.push(format!("status substituted by turbulence policy: {}", sub.status_code));
            }
        }

        Ok((observation, context))
    }
}
