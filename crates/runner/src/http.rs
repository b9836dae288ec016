use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use reqwest::Method;
use serde_json_path::JsonPath;
use turbulence_client::ClientPool;
use turbulence_core::{Action, HttpAction, Observation, WorkflowContext};

use crate::error::RunnerError;
use crate::retry::{run_retry_loop, RawAttempt};
use crate::runner_trait::ActionRunner;

/// Executes [`HttpAction`]s against a pooled client, retrying per the
/// action's [`turbulence_core::RetryConfig`] (§4.6, §4.7).
pub struct HttpRunner {
    pool: Arc<ClientPool>,
}

impl HttpRunner {
    #[must_use]
    pub fn new(pool: Arc<ClientPool>) -> Self {
        Self { pool }
    }

    async fn run_http(&self, name: &str, action: &HttpAction, mut context: WorkflowContext) -> Result<(Observation, WorkflowContext), RunnerError> {
        let ctx_value = context.as_value();
        let path = turbulence_template::render_str(&action.path, &ctx_value)?;
        let headers = turbulence_template::render_map(&action.headers, &ctx_value)?;
        let body = turbulence_template::render_value(&action.body, &ctx_value)?;
        let query = turbulence_template::render_map(&action.query, &ctx_value)?;

        let base_url = self.pool.base_url(&action.service)?;
        let mut url = format!("{base_url}{path}");
        if !query.is_empty() {
            let pairs: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
            url.push('?');
            url.push_str(&pairs.join("&"));
        }

        let method = Method::from_bytes(action.method.to_uppercase().as_bytes())
            .map_err(|_| RunnerError::InvalidMethod(action.method.clone()))?;

        let client = self.pool.http_client(&action.service).await?;
        let retry = action.retry.clone();
        let body_for_request = body.clone();

        let (attempts, outcome) = run_retry_loop(&retry, |_attempt| {
            let client = client.clone();
            let method = method.clone();
            let url = url.clone();
            let headers = headers.clone();
            let body = body_for_request.clone();
            async move { perform_one_request(&client, method, &url, &headers, &body).await }
        })
        .await;

        let ok = outcome.status_code.is_some_and(|s| (200..300).contains(&s));

        for (key, jsonpath_expr) in &action.extract {
            if !ok {
                break;
            }
            match extract_jsonpath(&outcome.body, jsonpath_expr) {
                Ok(value) => context.set(key.clone(), value),
                Err(message) => {
                    return Ok((
                        error_observation(name, &action.service, &outcome, attempts, format!("extraction of {key:?} failed: {message}")),
                        context,
                    ));
                }
            }
        }

        context.set_last_response(outcome.status_code.unwrap_or(0), outcome.headers.clone(), outcome.body.clone());

        let mut errors = Vec::new();
        if let Some(error) = &outcome.error {
            errors.push(error.clone());
        }
        if !ok {
            if let Some(status) = outcome.status_code {
                errors.push(format!("non-2xx status: {status}"));
            }
        }

        let observation = Observation {
            ok,
            protocol: "http".to_string(),
            action_name: name.to_string(),
            service: Some(action.service.clone()),
            status_code: outcome.status_code,
            latency_ms: attempts.last().map_or(0.0, |a| a.latency_ms),
            headers: outcome.headers,
            body: outcome.body,
            errors,
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

fn error_observation(name: &str, service: &str, outcome: &RawAttempt, attempts: Vec<turbulence_core::AttemptRecord>, message: String) -> Observation {
    Observation {
        ok: false,
        protocol: "http".to_string(),
        action_name: name.to_string(),
        service: Some(service.to_string()),
        status_code: outcome.status_code,
        latency_ms: attempts.last().map_or(0.0, |a| a.latency_ms),
        headers: outcome.headers.clone(),
        body: outcome.body.clone(),
        errors: vec![message],
        metadata: HashMap::new(),
        attempts,
        branch_condition: None,
        branch_result: None,
        branch_taken: None,
        condition_skipped: false,
    }
}

fn extract_jsonpath(body: &serde_json::Value, path: &str) -> Result<serde_json::Value, String> {
    let jsonpath = JsonPath::parse(path).map_err(|e| e.to_string())?;
    let matches: Vec<&serde_json::Value> = jsonpath.query(body).all();
    match matches.len() {
        0 => Err(format!("no match for jsonpath {path:?}")),
        1 => Ok(matches[0].clone()),
        _ => Ok(serde_json::Value::Array(matches.into_iter().cloned().collect())),
    }
}

async fn perform_one_request(client: &reqwest::Client, method: Method, url: &str, headers: &HashMap<String, String>, body: &serde_json::Value) -> RawAttempt {
    let start = Instant::now();
    let mut request = client.request(method, url);
    for (key, value) in headers {
        request = request.header(key, value);
    }
    if !body.is_null() {
        request = request.json(body);
    }

    match request.send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            let response_headers: HashMap<String, String> = response
                .headers()
                .iter()
                .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
                .collect();
            let body = response.json::<serde_json::Value>().await.unwrap_or(serde_json::Value::Null);
            RawAttempt {
                status_code: Some(status),
                headers: response_headers,
                body,
                error: None,
                latency_ms: start.elapsed().as_secs_f64() * 1000.0,
                is_timeout: false,
                is_connection_error: false,
            }
        }
        Err(error) => RawAttempt {
            status_code: None,
            headers: HashMap::new(),
            body: serde_json::Value::Null,
            error: Some(error.to_string()),
            latency_ms: start.elapsed().as_secs_f64() * 1000.0,
            is_timeout: error.is_timeout(),
            is_connection_error: error.is_connect(),
        },
    }
}

impl ActionRunner for HttpRunner {
    async fn run(&self, action: &Action, context: WorkflowContext) -> Result<(Observation, WorkflowContext), RunnerError> {
        match action {
            Action::Http { name, action, .. } => self.run_http(name, action, context).await,
            other => Err(RunnerError::UnknownKind(other.kind().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;
    use std::time::Duration;
    use turbulence_core::{Service, ServiceConfig, Sut};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sut_for(base_url: &str) -> Sut {
        let mut services = StdHashMap::new();
        services.insert(
            "users".to_string(),
            Service {
                name: "users".to_string(),
                config: ServiceConfig::Http {
                    base_url: base_url.to_string(),
                    default_headers: StdHashMap::new(),
                    timeout: Duration::from_secs(5),
                },
            },
        );
        Sut { name: "demo".to_string(), default_headers: StdHashMap::new(), services }
    }

    #[tokio::test]
    async fn successful_get_updates_context_and_extracts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 1, "name": "Alice"})))
            .mount(&server)
            .await;

        let pool = Arc::new(ClientPool::new(sut_for(&server.uri())));
        let runner = HttpRunner::new(pool);
        let action = Action::Http {
            name: "get-user".to_string(),
            condition: None,
            action: HttpAction {
                service: "users".to_string(),
                method: "GET".to_string(),
                path: "/users/1".to_string(),
                query: StdHashMap::new(),
                headers: StdHashMap::new(),
                body: serde_json::Value::Null,
                extract: StdHashMap::from([("user_name".to_string(), "$.name".to_string())]),
                retry: Default::default(),
            },
        };
        let context = WorkflowContext::new("i1", "r1", "c1");
        let (observation, context) = runner.run(&action, context).await.unwrap();
        assert!(observation.ok);
        assert_eq!(observation.status_code, Some(200));
        assert_eq!(context.get("user_name").unwrap(), "Alice");
    }

    #[tokio::test]
    async fn retry_then_success_records_all_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let pool = Arc::new(ClientPool::new(sut_for(&server.uri())));
        let runner = HttpRunner::new(pool);
        let action = Action::Http {
            name: "flaky".to_string(),
            condition: None,
            action: HttpAction {
                service: "users".to_string(),
                method: "GET".to_string(),
                path: "/flaky".to_string(),
                query: StdHashMap::new(),
                headers: StdHashMap::new(),
                body: serde_json::Value::Null,
                extract: StdHashMap::new(),
                retry: turbulence_core::RetryConfig { max_attempts: 3, on_status: vec![503], delay_ms: 1, ..Default::default() },
            },
        };
        let context = WorkflowContext::new("i1", "r1", "c1");
        let (observation, _) = runner.run(&action, context).await.unwrap();
        assert!(observation.ok);
        assert_eq!(observation.attempts.len(), 3);
        assert_eq!(observation.status_code, Some(200));
    }
}
