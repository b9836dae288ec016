use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use turbulence_core::{AssertionRecord, InstanceRecord, StepRecord};
use turbulence_executor::{ExecutorError, RunManifest, StorageSink};

use crate::error::StorageError;

/// Append-only JSONL [`StorageSink`] (§6): one file per record stream plus a
/// `manifest.json` written once at `initialize`.
///
/// Each stream is guarded by a `tokio::sync::Mutex` rather than a
/// `std::sync::Mutex`, since the write itself is the async operation being
/// serialized — holding the guard across the `.await` is the point, not a
/// violation of the usual std-mutex discipline.
pub struct JsonlSink {
    instances: Mutex<Option<File>>,
    steps: Mutex<Option<File>>,
    assertions: Mutex<Option<File>>,
}

impl JsonlSink {
    #[must_use]
    pub fn new() -> Self {
        Self { instances: Mutex::new(None), steps: Mutex::new(None), assertions: Mutex::new(None) }
    }
}

impl Default for JsonlSink {
    fn default() -> Self {
        Self::new()
    }
}

async fn open(path: PathBuf) -> Result<File, StorageError> {
    File::create(&path).await.map_err(|source| StorageError::Io { path: path.display().to_string(), source })
}

/// Appends one JSON line and flushes immediately, matching the durability
/// discipline of the JSONL writer this sink is grounded on: every record
/// reaches disk before the write call returns, not just at `close`.
async fn append_line<T: Serialize>(slot: &Mutex<Option<File>>, record: &T) -> Result<(), StorageError> {
    let mut guard = slot.lock().await;
    let file = guard.as_mut().ok_or(StorageError::NotInitialized)?;
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    file.write_all(&line).await.map_err(|source| StorageError::Io { path: "<stream>".to_string(), source })?;
    file.flush().await.map_err(|source| StorageError::Io { path: "<stream>".to_string(), source })
}

#[async_trait]
impl StorageSink for JsonlSink {
    async fn initialize(&self, run_path: &Path, manifest: &RunManifest) -> Result<(), ExecutorError> {
        tokio::fs::create_dir_all(run_path).await.map_err(|source| StorageError::Io { path: run_path.display().to_string(), source })?;

        let manifest_path = run_path.join("manifest.json");
        let manifest_json = serde_json::to_vec_pretty(manifest).map_err(StorageError::from)?;
        tokio::fs::write(&manifest_path, manifest_json).await.map_err(|source| StorageError::Io { path: manifest_path.display().to_string(), source })?;

        *self.instances.lock().await = Some(open(run_path.join("instances.jsonl")).await?);
        *self.steps.lock().await = Some(open(run_path.join("steps.jsonl")).await?);
        *self.assertions.lock().await = Some(open(run_path.join("assertions.jsonl")).await?);
        Ok(())
    }

    async fn write_instance(&self, record: InstanceRecord) -> Result<(), ExecutorError> {
        Ok(append_line(&self.instances, &record).await?)
    }

    async fn write_step(&self, record: StepRecord) -> Result<(), ExecutorError> {
        Ok(append_line(&self.steps, &record).await?)
    }

    async fn write_assertion(&self, record: AssertionRecord) -> Result<(), ExecutorError> {
        Ok(append_line(&self.assertions, &record).await?)
    }

    async fn close(&self) -> Result<(), ExecutorError> {
        for slot in [&self.instances, &self.steps, &self.assertions] {
            if let Some(file) = slot.lock().await.as_mut() {
                file.flush().await.map_err(|source| StorageError::Io { path: "<stream>".to_string(), source })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;
    use turbulence_core::{BranchTaken, Observation};

    fn manifest() -> RunManifest {
        RunManifest { run_id: "r1".to_string(), scenario_id: "checkout".to_string(), started_at: Utc::now(), instances: 2, parallelism: 1, seed: Some(7) }
    }

    fn step_record() -> StepRecord {
        StepRecord {
            instance_id: "r1-0".to_string(),
            run_id: "r1".to_string(),
            correlation_id: "r1-0".to_string(),
            step_index: 0,
            step_name: "ping".to_string(),
            step_type: "http".to_string(),
            timestamp: Utc::now(),
            observation: Observation::branch_decision("ping", "true", true, BranchTaken::IfTrue),
        }
    }

    #[tokio::test]
    async fn writes_manifest_and_each_record_stream() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::new();
        sink.initialize(dir.path(), &manifest()).await.unwrap();

        sink.write_step(step_record()).await.unwrap();
        sink.write_step(step_record()).await.unwrap();
        sink.write_instance(InstanceRecord {
            instance_id: "r1-0".to_string(),
            run_id: "r1".to_string(),
            scenario_id: "checkout".to_string(),
            correlation_id: "r1-0".to_string(),
            passed: true,
            started_at: Utc::now(),
            completed_at: Utc::now(),
            entry_data: serde_json::Value::Null,
            error: None,
        })
        .await
        .unwrap();
        sink.write_assertion(AssertionRecord {
            instance_id: "r1-0".to_string(),
            run_id: "r1".to_string(),
            correlation_id: "r1-0".to_string(),
            step_index: 0,
            assertion_name: "status_code".to_string(),
            passed: true,
            expected: None,
            actual: None,
            message: None,
            timestamp: Utc::now(),
        })
        .await
        .unwrap();
        sink.close().await.unwrap();

        let manifest_contents = tokio::fs::read_to_string(dir.path().join("manifest.json")).await.unwrap();
        assert!(manifest_contents.contains("\"run_id\""));

        let steps_contents = tokio::fs::read_to_string(dir.path().join("steps.jsonl")).await.unwrap();
        assert_eq!(steps_contents.lines().count(), 2);

        let instances_contents = tokio::fs::read_to_string(dir.path().join("instances.jsonl")).await.unwrap();
        assert_eq!(instances_contents.lines().count(), 1);

        let assertions_contents = tokio::fs::read_to_string(dir.path().join("assertions.jsonl")).await.unwrap();
        assert_eq!(assertions_contents.lines().count(), 1);
        let _: HashMap<String, serde_json::Value> = serde_json::from_str(assertions_contents.lines().next().unwrap()).unwrap();
    }

    #[tokio::test]
    async fn write_before_initialize_is_an_error() {
        let sink = JsonlSink::new();
        assert!(sink.write_step(step_record()).await.is_err());
    }
}
