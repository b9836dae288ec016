use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use turbulence_core::{Action, BranchTaken, Observation, Scenario, StopCondition, WorkflowContext};
use turbulence_fault::{FaultError, TurbulenceConfig, TurbulenceEngine};
use turbulence_runner::{evaluate_expectation, AssertionOutcome, RunnerRegistry};

use crate::error::ScenarioError;

/// One emitted tuple of the recursive interpreter (§4.12): a step index, the
/// action it came from, the resulting observation, and any per-check
/// assertion outcomes (populated only for assert actions).
#[derive(Debug, Clone)]
pub struct StepEmission {
    pub step_index: u32,
    pub action_name: String,
    pub step_type: String,
    pub observation: Observation,
    pub assertions: Vec<AssertionOutcome>,
}

fn delay_params(context: &WorkflowContext) -> (u64, u64) {
    let ctx_value = context.as_value();
    let variation = ctx_value.get("entry").and_then(|e| e.get("seed_data")).and_then(|s| s.get("variation"));
    let step_delay_ms = variation.and_then(|v| v.get("step_delay_ms")).and_then(Value::as_u64).unwrap_or(0);
    let jitter_ms = variation.and_then(|v| v.get("jitter_ms")).and_then(Value::as_u64).unwrap_or(0);
    (step_delay_ms, jitter_ms)
}

fn action_service(action: &Action) -> Option<&str> {
    match action {
        Action::Http { action, .. } => Some(action.service.as_str()),
        Action::Wait { action, .. } => Some(action.service.as_str()),
        Action::Grpc { action, .. } => Some(action.service.as_str()),
        Action::Assert { .. } | Action::Decide { .. } | Action::Branch { .. } => None,
    }
}

/// Walks a [`Scenario`]'s action tree, dispatching each leaf action through a
/// [`RunnerRegistry`] and wrapping matched `(service, action)` pairs with a
/// [`TurbulenceEngine`], per §4.12.
pub struct ScenarioRunner {
    registry: Arc<RunnerRegistry>,
    turbulence_config: Option<Arc<TurbulenceConfig>>,
    turbulence_engine: Option<Arc<TurbulenceEngine>>,
}

impl ScenarioRunner {
    #[must_use]
    pub fn new(registry: Arc<RunnerRegistry>, turbulence_config: Option<Arc<TurbulenceConfig>>, turbulence_engine: Option<Arc<TurbulenceEngine>>) -> Self {
        Self { registry, turbulence_config, turbulence_engine }
    }

    /// Runs `scenario` to completion, or until its stop condition fires,
    /// returning every emitted [`StepEmission`] in `step_index` order plus
    /// the final context.
    pub async fn execute_flow(&self, scenario: &Scenario, context: WorkflowContext) -> (Vec<StepEmission>, WorkflowContext) {
        let (step_delay_ms, jitter_ms) = delay_params(&context);
        let mut steps = Vec::new();
        let mut step_count = 0u32;
        let (_, context) = self
            .execute_actions(&scenario.flow, context, &mut steps, &mut step_count, &scenario.stop_when, step_delay_ms, jitter_ms)
            .await;
        (steps, context)
    }

    /// Returns `(stopped_early, context)`. Boxed because branch children are
    /// executed by recursive calls into this same function; a native
    /// `async fn` cannot recurse (its future would have infinite size).
    fn execute_actions<'a>(
        &'a self,
        actions: &'a [Action],
        context: WorkflowContext,
        steps: &'a mut Vec<StepEmission>,
        step_count: &'a mut u32,
        stop_when: &'a StopCondition,
        step_delay_ms: u64,
        jitter_ms: u64,
    ) -> BoxFuture<'a, (bool, WorkflowContext)> {
        async move {
            let mut context = context;
            for (index, action) in actions.iter().enumerate() {
                if *step_count >= stop_when.max_steps {
                    tracing::warn!(max_steps = stop_when.max_steps, "scenario stopped: max_steps reached");
                    return (true, context);
                }

                if let Some(condition) = action.condition() {
                    let ctx_value = context.as_value();
                    let (should_run, _) = turbulence_expression::evaluate_safe(condition, &ctx_value, true);
                    if !should_run {
                        *step_count += 1;
                        steps.push(StepEmission {
                            step_index: *step_count - 1,
                            action_name: action.name().to_string(),
                            step_type: action.kind().to_string(),
                            observation: Observation::skipped(action.name(), action.kind()),
                            assertions: Vec::new(),
                        });
                        continue;
                    }
                }

                if index > 0 && (step_delay_ms > 0 || jitter_ms > 0) {
                    tokio::time::sleep(Duration::from_millis(step_delay_ms + jitter_ms)).await;
                }

                if let Action::Branch { name, action: branch } = action {
                    let ctx_value = context.as_value();
                    let (result, _) = turbulence_expression::evaluate_safe(&branch.condition, &ctx_value, false);
                    let taken = if result { BranchTaken::IfTrue } else { BranchTaken::IfFalse };
                    *step_count += 1;
                    steps.push(StepEmission {
                        step_index: *step_count - 1,
                        action_name: name.clone(),
                        step_type: "branch".to_string(),
                        observation: Observation::branch_decision(name, &branch.condition, result, taken),
                        assertions: Vec::new(),
                    });

                    let children = if result { &branch.if_true } else { &branch.if_false };
                    let (stopped, new_context) =
                        self.execute_actions(children, context, &mut *steps, &mut *step_count, stop_when, step_delay_ms, jitter_ms).await;
                    context = new_context;
                    if stopped {
                        return (true, context);
                    }
                    continue;
                }

                let context_before = context.clone();
                let (observation, new_context, assertions) = match self.dispatch(action, context).await {
                    Ok(result) => result,
                    Err(err) => {
                        let mut observation = Observation::skipped(action.name(), action.kind());
                        observation.ok = false;
                        observation.condition_skipped = false;
                        observation.errors.push(err.to_string());
                        (observation, context_before, Vec::new())
                    }
                };
                context = new_context;
                *step_count += 1;
                let should_stop = !observation.ok && stop_when.any_action_fails;
                steps.push(StepEmission {
                    step_index: *step_count - 1,
                    action_name: action.name().to_string(),
                    step_type: action.kind().to_string(),
                    observation,
                    assertions,
                });
                if should_stop {
                    return (true, context);
                }
            }
            (false, context)
        }
        .boxed()
    }

    async fn dispatch(&self, action: &Action, context: WorkflowContext) -> Result<(Observation, WorkflowContext, Vec<AssertionOutcome>), ScenarioError> {
        if let Action::Assert { name, action: assert_action, .. } = action {
            let last_response = context.last_response();
            let outcomes = evaluate_expectation(&assert_action.expect, &last_response);
            let ok = outcomes.iter().all(|o| o.passed);
            let errors = outcomes.iter().filter(|o| !o.passed).map(|o| o.name.clone()).collect();
            let observation = Observation {
                ok,
                protocol: "assert".to_string(),
                action_name: name.clone(),
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
            return Ok((observation, context, outcomes));
        }

        let runner = self.registry.get(action.kind())?.clone();
        let service = action_service(action);
        let policy = service.zip(self.turbulence_config.as_deref()).and_then(|(service, config)| config.get(service, action.name()));

        let (observation, context) = match (policy, &self.turbulence_engine) {
            (Some(policy), Some(engine)) => {
                let instance_id = context.instance_id().to_string();
                let action_name = action.name().to_string();
                let service_name = service.unwrap_or_default().to_string();
                let action_owned = action.clone();
                let context_for_execute = context.clone();
                engine
                    .apply(policy, &action_name, &service_name, &instance_id, context, move || {
                        let runner = runner.clone();
                        let action_owned = action_owned.clone();
                        let context_for_execute = context_for_execute.clone();
                        async move { runner.run_dyn(&action_owned, context_for_execute).await.map_err(|e| FaultError::Downstream(e.to_string())) }
                    })
                    .await?
            }
            _ => runner.run_dyn(action, context).await?,
        };

        Ok((observation, context, Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turbulence_core::{AssertAction, Expectation, HttpAction, RetryConfig};
    use turbulence_runner::{AssertRunner, HttpRunner};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn runner_registry(pool: Arc<turbulence_client::ClientPool>) -> Arc<RunnerRegistry> {
        let mut registry = RunnerRegistry::new();
        registry.register("http", Arc::new(HttpRunner::new(pool)));
        registry.register("assert", Arc::new(AssertRunner));
        Arc::new(registry)
    }

    fn sut_for(base_url: &str) -> turbulence_core::Sut {
        let mut services = HashMap::new();
        services.insert(
            "users".to_string(),
            turbulence_core::Service {
                name: "users".to_string(),
                config: turbulence_core::ServiceConfig::Http { base_url: base_url.to_string(), default_headers: HashMap::new(), timeout: Duration::from_secs(5) },
            },
        );
        turbulence_core::Sut { name: "demo".to_string(), default_headers: HashMap::new(), services }
    }

    #[tokio::test]
    async fn conditional_skip_counts_as_a_step_with_no_network_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path("/a")).respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({}))).mount(&server).await;
        Mock::given(method("GET")).and(path("/c")).respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({}))).mount(&server).await;

        let pool = Arc::new(turbulence_client::ClientPool::new(sut_for(&server.uri())));
        let registry = runner_registry(pool);
        let runner = ScenarioRunner::new(registry, None, None);

        let http = |name: &str, p: &str| Action::Http {
            name: name.to_string(),
            condition: None,
            action: HttpAction { service: "users".to_string(), method: "GET".to_string(), path: p.to_string(), query: HashMap::new(), headers: HashMap::new(), body: Value::Null, extract: HashMap::new(), retry: RetryConfig::default() },
        };
        let skip_http = Action::Http {
            name: "b".to_string(),
            condition: Some("{{should_run}}".to_string()),
            action: HttpAction { service: "users".to_string(), method: "GET".to_string(), path: "/b".to_string(), query: HashMap::new(), headers: HashMap::new(), body: Value::Null, extract: HashMap::new(), retry: RetryConfig::default() },
        };

        let scenario = Scenario::new("three-steps", vec![http("a", "/a"), skip_http, http("c", "/c")]);
        let mut context = WorkflowContext::new("i1", "r1", "c1");
        context.set("should_run", Value::Bool(false));

        let (steps, _) = runner.execute_flow(&scenario, context).await;
        assert_eq!(steps.len(), 3);
        assert!(steps[1].observation.condition_skipped);
        assert!(!steps[0].observation.condition_skipped);
        assert!(!steps[2].observation.condition_skipped);
    }

    #[tokio::test]
    async fn branch_if_false_path_skips_if_true_entirely() {
        let pool = Arc::new(turbulence_client::ClientPool::new(sut_for("http://unused")));
        let registry = runner_registry(pool);
        let runner = ScenarioRunner::new(registry, None, None);

        let retry = Action::Assert {
            name: "retry".to_string(),
            condition: None,
            action: AssertAction { expect: Expectation { status_code: Some(999), headers_contain: HashMap::new(), body_matches: HashMap::new(), json_schema: None } },
        };
        let confirm = Action::Assert {
            name: "confirm".to_string(),
            condition: None,
            action: AssertAction { expect: Expectation { status_code: None, headers_contain: HashMap::new(), body_matches: HashMap::new(), json_schema: None } },
        };
        let branch = Action::Branch {
            name: "decide-path".to_string(),
            action: turbulence_core::BranchAction { condition: r#"{{status}} == "declined""#.to_string(), if_true: vec![retry], if_false: vec![confirm] },
        };
        let scenario = Scenario::new("checkout", vec![branch]);
        let mut context = WorkflowContext::new("i1", "r1", "c1");
        context.set("status", Value::String("approved".to_string()));

        let (steps, _) = runner.execute_flow(&scenario, context).await;
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].step_type, "branch");
        assert_eq!(steps[0].observation.branch_taken, Some(BranchTaken::IfFalse));
        assert_eq!(steps[1].action_name, "confirm");
    }

    #[tokio::test]
    async fn any_action_fails_stops_iteration() {
        let pool = Arc::new(turbulence_client::ClientPool::new(sut_for("http://unused")));
        let registry = runner_registry(pool);
        let runner = ScenarioRunner::new(registry, None, None);

        let failing = Action::Assert {
            name: "must-fail".to_string(),
            condition: None,
            action: AssertAction { expect: Expectation { status_code: Some(200), headers_contain: HashMap::new(), body_matches: HashMap::new(), json_schema: None } },
        };
        let never_runs = Action::Assert {
            name: "never".to_string(),
            condition: None,
            action: AssertAction { expect: Expectation { status_code: None, headers_contain: HashMap::new(), body_matches: HashMap::new(), json_schema: None } },
        };
        let scenario = Scenario::new("s", vec![failing, never_runs]).with_stop_when(turbulence_core::StopCondition { max_steps: 100, any_action_fails: true });
        let context = WorkflowContext::new("i1", "r1", "c1");

        let (steps, _) = runner.execute_flow(&scenario, context).await;
        assert_eq!(steps.len(), 1);
        assert!(!steps[0].observation.ok);
    }
}
