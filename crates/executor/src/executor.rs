use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::FutureExt;
use turbulence_client::ClientPool;
use turbulence_core::{Scenario, Sut, WorkflowContext};
use turbulence_fault::TurbulenceEngine;
use turbulence_runner::RunnerRegistry;
use turbulence_scenario::ScenarioRunner;

use crate::config::RunConfig;
use crate::error::ExecutorError;
use crate::sink::{RunManifest, StorageSink};
use crate::stats::ExecutionStats;

/// Drives one run of a [`Scenario`] across `config.instances` instances,
/// bounding concurrency at `config.parallelism` via a [`tokio::sync::Semaphore`]
/// (§4.14).
///
/// Per-instance failures (an `Err` from the scenario runner, or a panic
/// inside its task) are recorded on that instance's
/// [`turbulence_core::InstanceRecord`] and do not abort the run; only
/// failures to construct the client pool or initialize the storage sink are
/// fatal.
pub struct ParallelExecutor {
    sut: Sut,
}

impl ParallelExecutor {
    #[must_use]
    pub fn new(sut: Sut) -> Self {
        Self { sut }
    }

    pub async fn run(&self, scenario: Arc<Scenario>, config: RunConfig, sink: Arc<dyn StorageSink>, run_path: &std::path::Path) -> Result<ExecutionStats, ExecutorError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let seed = config.seed.unwrap_or(0);
        let started_at = Utc::now();

        let manifest = RunManifest { run_id: run_id.clone(), scenario_id: scenario.id.clone(), started_at, instances: config.instances, parallelism: config.parallelism, seed: config.seed };
        sink.initialize(run_path, &manifest).await?;

        let pool = Arc::new(ClientPool::new(self.sut.clone()));
        let turbulence_engine = config.turbulence.as_ref().map(|_| Arc::new(TurbulenceEngine::new(seed)));
        let turbulence_config = config.turbulence.clone().map(Arc::new);
        let decide_policy = Arc::new(config.decide_policy.clone().unwrap_or_default());
        let registry = Arc::new(turbulence_runner::default_registry(pool.clone(), decide_policy, seed));
        let scenario_runner = Arc::new(ScenarioRunner::new(registry, turbulence_config, turbulence_engine));

        let semaphore = Arc::new(tokio::sync::Semaphore::new(config.parallelism.max(1)));
        let latencies: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));
        let passed_count = Arc::new(Mutex::new(0u32));

        let mut handles = Vec::with_capacity(config.instances as usize);
        for index in 0..config.instances {
            let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closed during a run");
            let scenario = scenario.clone();
            let sink = sink.clone();
            let scenario_runner = scenario_runner.clone();
            let latencies = latencies.clone();
            let passed_count = passed_count.clone();
            let run_id = run_id.clone();
            let entry = config.entry_for(index);
            let fail_on = config.fail_on.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let instance_id = format!("{run_id}-{index}");
                let scenario_id = scenario.id.clone();
                let run_id_for_panic = run_id.clone();
                let entry_for_panic = entry.clone();
                let sink_for_panic = sink.clone();

                let outcome = AssertUnwindSafe(run_instance(index, scenario, scenario_runner, sink, run_id, entry, fail_on, latencies, passed_count)).catch_unwind().await;

                if let Err(panic) = outcome {
                    let message = panic_message(&panic);
                    tracing::error!(instance_id = %instance_id, error = %message, "turbulence: instance task panicked");
                    let now = Utc::now();
                    let record = turbulence_core::InstanceRecord {
                        instance_id: instance_id.clone(),
                        run_id: run_id_for_panic,
                        scenario_id,
                        correlation_id: instance_id,
                        passed: false,
                        started_at: now,
                        completed_at: now,
                        entry_data: entry_for_panic,
                        error: Some(message),
                    };
                    if let Err(err) = sink_for_panic.write_instance(record).await {
                        tracing::error!(error = %err, "turbulence: failed to persist panicked instance record");
                    }
                }
            });
            handles.push(handle);
        }

        let mut instance_errors = Vec::new();
        for handle in handles {
            if let Err(join_error) = handle.await {
                instance_errors.push(join_error.to_string());
            }
        }
        for message in &instance_errors {
            tracing::error!(error = %message, "turbulence: instance task join failed");
        }

        let passed = *passed_count.lock().expect("passed-count mutex poisoned");
        let latencies = latencies.lock().expect("latency mutex poisoned").clone();
        let stats = ExecutionStats::compute(config.instances, passed, latencies);

        sink.close().await?;
        pool.close_all();
        Ok(stats)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "instance task panicked with a non-string payload".to_string()
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_instance(
    index: u32,
    scenario: Arc<Scenario>,
    scenario_runner: Arc<ScenarioRunner>,
    sink: Arc<dyn StorageSink>,
    run_id: String,
    entry: serde_json::Value,
    fail_on: Option<String>,
    latencies: Arc<Mutex<Vec<f64>>>,
    passed_count: Arc<Mutex<u32>>,
) {
    let instance_id = format!("{run_id}-{index}");
    let correlation_id = instance_id.clone();
    let started_at = Utc::now();

    let mut context = WorkflowContext::new(instance_id.clone(), run_id.clone(), correlation_id.clone());
    context.set_entry(entry.clone());

    let (steps, final_context) = scenario_runner.execute_flow(&scenario, context).await;

    let mut step_failed = false;
    for step in &steps {
        latencies.lock().expect("latency mutex poisoned").push(step.observation.latency_ms);
        if !step.observation.ok {
            step_failed = true;
        }

        let step_record = turbulence_core::StepRecord {
            instance_id: instance_id.clone(),
            run_id: run_id.clone(),
            correlation_id: correlation_id.clone(),
            step_index: step.step_index,
            step_name: step.action_name.clone(),
            step_type: step.step_type.clone(),
            timestamp: Utc::now(),
            observation: step.observation.clone(),
        };
        if let Err(err) = sink.write_step(step_record).await {
            tracing::error!(instance_id, error = %err, "turbulence: failed to persist step record");
        }

        for outcome in &step.assertions {
            let assertion_record = turbulence_core::AssertionRecord {
                instance_id: instance_id.clone(),
                run_id: run_id.clone(),
                correlation_id: correlation_id.clone(),
                step_index: step.step_index,
                assertion_name: outcome.name.clone(),
                passed: outcome.passed,
                expected: outcome.expected.clone(),
                actual: outcome.actual.clone(),
                message: outcome.message.clone(),
                timestamp: Utc::now(),
            };
            if let Err(err) = sink.write_assertion(assertion_record).await {
                tracing::error!(instance_id, error = %err, "turbulence: failed to persist assertion record");
            }
        }
    }

    let fail_on_triggered = fail_on.map_or(false, |condition| {
        let ctx_value = final_context.as_value();
        let (matched, _) = turbulence_expression::evaluate_safe(&condition, &ctx_value, false);
        matched
    });
    let passed = !step_failed && !fail_on_triggered;
    if passed {
        *passed_count.lock().expect("passed-count mutex poisoned") += 1;
    }

    let instance_record = turbulence_core::InstanceRecord {
        instance_id,
        run_id,
        scenario_id: scenario.id.clone(),
        correlation_id,
        passed,
        started_at,
        completed_at: Utc::now(),
        entry_data: entry,
        error: None,
    };
    if let Err(err) = sink.write_instance(instance_record).await {
        tracing::error!(error = %err, "turbulence: failed to persist instance record");
    }
}
