use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use turbulence_core::{AssertionRecord, InstanceRecord, StepRecord};

use crate::error::ExecutorError;

/// Written once per run, alongside the per-record streams (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub scenario_id: String,
    pub started_at: DateTime<Utc>,
    pub instances: u32,
    pub parallelism: usize,
    pub seed: Option<u64>,
}

/// Persists the three record streams of a run (§6).
///
/// Implementations must not hold any internal lock across an `.await` point:
/// do the blocking work, then drop the guard before yielding.
#[async_trait]
pub trait StorageSink: Send + Sync {
    async fn initialize(&self, run_path: &Path, manifest: &RunManifest) -> Result<(), ExecutorError>;
    async fn write_instance(&self, record: InstanceRecord) -> Result<(), ExecutorError>;
    async fn write_step(&self, record: StepRecord) -> Result<(), ExecutorError>;
    async fn write_assertion(&self, record: AssertionRecord) -> Result<(), ExecutorError>;
    async fn close(&self) -> Result<(), ExecutorError>;
}

/// A [`StorageSink`] that discards every record. Used by tests that only
/// care about the computed [`crate::ExecutionStats`].
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait]
impl StorageSink for NullSink {
    async fn initialize(&self, _run_path: &Path, _manifest: &RunManifest) -> Result<(), ExecutorError> {
        Ok(())
    }

    async fn write_instance(&self, _record: InstanceRecord) -> Result<(), ExecutorError> {
        Ok(())
    }

    async fn write_step(&self, _record: StepRecord) -> Result<(), ExecutorError> {
        Ok(())
    }

    async fn write_assertion(&self, _record: AssertionRecord) -> Result<(), ExecutorError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), ExecutorError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[tokio::test]
    async fn null_sink_accepts_every_record_kind() {
        let sink = NullSink;
        let manifest = RunManifest { run_id: "r1".to_string(), scenario_id: "s1".to_string(), started_at: Utc::now(), instances: 1, parallelism: 1, seed: None };
        sink.initialize(Path::new("/tmp/unused"), &manifest).await.unwrap();
        sink.close().await.unwrap();
    }
}
