use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use turbulence_core::{AttemptRecord, BackoffPolicy, RetryConfig};

/// The raw outcome of one HTTP attempt, before it is folded into an
/// [`AttemptRecord`] or a final [`turbulence_core::Observation`].
pub struct RawAttempt {
    pub status_code: Option<u16>,
    pub headers: std::collections::HashMap<String, String>,
    pub body: Value,
    pub error: Option<String>,
    pub latency_ms: f64,
    pub is_timeout: bool,
    pub is_connection_error: bool,
}

/// The retry state machine (§4.7), parameterized over whatever performs one
/// attempt. Sleeps between retriable attempts using the configured backoff;
/// the final attempt's outcome — retriable or not — always terminates the
/// loop.
pub async fn run_retry_loop<F, Fut>(retry: &RetryConfig, mut perform: F) -> (Vec<AttemptRecord>, RawAttempt)
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = RawAttempt>,
{
    let max_attempts = retry.max_attempts.max(1);
    let mut attempts = Vec::with_capacity(max_attempts as usize);
    let mut outcome = None;

    for i in 0..max_attempts {
        let raw = perform(i).await;
        attempts.push(AttemptRecord {
            attempt: i + 1,
            status_code: raw.status_code,
            error: raw.error.clone(),
            latency_ms: raw.latency_ms,
        });

        let retriable = raw.status_code.is_some_and(|status| retry.on_status.contains(&status))
            || (raw.is_timeout && retry.on_timeout)
            || (raw.is_connection_error && retry.on_connection_error);
        let is_last_attempt = i + 1 >= max_attempts;

        if retriable && !is_last_attempt {
            let delay_ms = match retry.backoff {
                BackoffPolicy::Fixed => retry.delay_ms,
                BackoffPolicy::Exponential => retry.base_delay_ms.saturating_mul(1u64 << i.min(32)),
            };
            if delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            outcome = Some(raw);
            continue;
        }

        outcome = Some(raw);
        break;
    }

    (attempts, outcome.expect("run_retry_loop always performs at least one attempt"))
}
