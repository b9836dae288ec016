use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use turbulence_client::ClientPool;
use turbulence_core::{Action, AttemptRecord, Observation, WaitAction, WorkflowContext};

use crate::error::RunnerError;
use crate::runner_trait::ActionRunner;

/// Polls a service until `success_predicate` holds against the probe
/// response, or `timeout_ms` elapses (§4.8). Only the terminal probe
/// updates `last_response`.
pub struct WaitRunner {
    pool: Arc<ClientPool>,
}

impl WaitRunner {
    #[must_use]
    pub fn new(pool: Arc<ClientPool>) -> Self {
        Self { pool }
    }

    async fn run_wait(&self, name: &str, action: &WaitAction, mut context: WorkflowContext) -> Result<(Observation, WorkflowContext), RunnerError> {
        let deadline = Instant::now() + Duration::from_millis(action.timeout_ms);
        let client = self.pool.http_client(&action.service).await?;
        let base_url = self.pool.base_url(&action.service)?;
        let path = turbulence_template::render_str(&action.path, &context.as_value())?;
        let url = format!("{base_url}{path}");

        let mut attempts = Vec::new();
        let mut last_status = None;
        let mut last_body = serde_json::Value::Null;
        let mut last_headers = HashMap::new();
        let mut succeeded = false;

        loop {
            let start = Instant::now();
            let probe = client.get(&url).send().await;
            let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

            match probe {
                Ok(response) => {
                    last_status = Some(response.status().as_u16());
                    last_headers = response
                        .headers()
                        .iter()
                        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
                        .collect();
                    last_body = response.json::<serde_json::Value>().await.unwrap_or(serde_json::Value::Null);
                    attempts.push(AttemptRecord { attempt: u32::try_from(attempts.len() + 1).unwrap_or(u32::MAX), status_code: last_status, error: None, latency_ms });

                    let probe_context = serde_json::json!({
                        "last_response": {"status_code": last_status, "headers": last_headers, "body": last_body},
                    });
                    let (ok, _) = turbulence_expression::evaluate(&action.success_predicate, &probe_context)?;
                    if ok {
                        succeeded = true;
                        break;
                    }
                }
                Err(error) => {
                    attempts.push(AttemptRecord { attempt: u32::try_from(attempts.len() + 1).unwrap_or(u32::MAX), status_code: None, error: Some(error.to_string()), latency_ms });
                }
            }

            if Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(action.interval_ms)).await;
        }

        context.set_last_response(last_status.unwrap_or(0), last_headers.clone(), last_body.clone());

        let observation = Observation {
            ok: succeeded,
            protocol: "wait".to_string(),
            action_name: name.to_string(),
            service: Some(action.service.clone()),
            status_code: last_status,
            latency_ms: attempts.iter().map(|a| a.latency_ms).sum(),
            headers: last_headers,
            body: last_body,
            errors: if succeeded { Vec::new() } else { vec![format!("timed out after {}ms", action.timeout_ms)] },
            metadata: HashMap::new(),
            attempts,
            branch_condition: None,
            branch_result: None,
            branch_taken: None,
            condition_skipped: false,
        };

        Ok((observation, context))
    }
}

impl ActionRunner for WaitRunner {
    async fn run(&self, action: &Action, context: WorkflowContext) -> Result<(Observation, WorkflowContext), RunnerError> {
        match action {
            Action::Wait { name, action, .. } => self.run_wait(name, action, context).await,
            other => Err(RunnerError::UnknownKind(other.kind().to_string())),
        }
    }
}
