use serde::{Deserialize, Serialize};

/// Aggregate results of a completed run (§4.14).
///
/// Percentiles are computed directly from a sorted vector of per-step
/// latencies, not a histogram: run sizes in this domain are small enough
/// that linear-interpolated-rank over the full sample is cheap and exact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub total_instances: u32,
    pub passed_instances: u32,
    pub failed_instances: u32,
    pub pass_rate: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
}

impl ExecutionStats {
    #[must_use]
    pub fn compute(total_instances: u32, passed_instances: u32, mut step_latencies_ms: Vec<f64>) -> Self {
        step_latencies_ms.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let failed_instances = total_instances.saturating_sub(passed_instances);
        let pass_rate = if total_instances == 0 { 0.0 } else { f64::from(passed_instances) / f64::from(total_instances) * 100.0 };
        Self {
            total_instances,
            passed_instances,
            failed_instances,
            pass_rate,
            p50_latency_ms: percentile(&step_latencies_ms, 0.50),
            p95_latency_ms: percentile(&step_latencies_ms, 0.95),
            p99_latency_ms: percentile(&step_latencies_ms, 0.99),
        }
    }
}

/// Linear interpolation between the floor and ceiling ranks, matching the
/// reference `calculate_percentile` this was supplemented from: for a rank
/// `k` that falls between two samples, the result is weighted toward
/// whichever sample `k` sits closer to, rather than snapping to one of them.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let k = (sorted.len() - 1) as f64 * p;
    let f = k.floor() as usize;
    let c = k.ceil() as usize;
    if f == c {
        return sorted[f];
    }
    sorted[f] + (sorted[c] - sorted[f]) * (k - f as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_latencies_yield_zeroed_percentiles() {
        let stats = ExecutionStats::compute(0, 0, Vec::new());
        assert_eq!(stats.pass_rate, 0.0);
        assert_eq!(stats.p50_latency_ms, 0.0);
    }

    #[test]
    fn percentiles_computed_from_sorted_samples() {
        let latencies: Vec<f64> = (1..=100).map(f64::from).collect();
        let stats = ExecutionStats::compute(10, 9, latencies);
        assert_eq!(stats.pass_rate, 90.0);
        assert_eq!(stats.p50_latency_ms, 50.5);
        assert_eq!(stats.p99_latency_ms, 99.01);
    }

    #[test]
    fn unsorted_input_is_sorted_before_ranking() {
        let stats = ExecutionStats::compute(1, 1, vec![30.0, 10.0, 20.0]);
        assert_eq!(stats.p50_latency_ms, 20.0);
    }
}
