use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RunnerError;
use crate::runner_trait::DynActionRunner;

/// The action runner factory (§4.5): maps an action's `kind` tag to the
/// runner that executes it.
#[derive(Default, Clone)]
pub struct RunnerRegistry {
    runners: HashMap<String, Arc<dyn DynActionRunner>>,
}

impl RunnerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: impl Into<String>, runner: Arc<dyn DynActionRunner>) {
        self.runners.insert(kind.into(), runner);
    }

    pub fn get(&self, kind: &str) -> Result<&Arc<dyn DynActionRunner>, RunnerError> {
        self.runners.get(kind).ok_or_else(|| RunnerError::UnknownKind(kind.to_string()))
    }

    #[must_use]
    pub fn list(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.runners.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.runners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use turbulence_core::{Action, Observation, WorkflowContext};

    struct NoopRunner;

    #[async_trait]
    impl DynActionRunner for NoopRunner {
        async fn run_dyn(&self, action: &Action, context: WorkflowContext) -> Result<(Observation, WorkflowContext), RunnerError> {
            Ok((Observation::skipped(action.name(), action.kind()), context))
        }
    }

    #[test]
    fn empty_registry_has_no_kinds() {
        let registry = RunnerRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("http").is_err());
    }

    #[test]
    fn register_and_get_roundtrip() {
        let mut registry = RunnerRegistry::new();
        registry.register("http", Arc::new(NoopRunner));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("http").is_ok());
    }

    #[test]
    fn list_is_sorted() {
        let mut registry = RunnerRegistry::new();
        registry.register("wait", Arc::new(NoopRunner));
        registry.register("assert", Arc::new(NoopRunner));
        registry.register("http", Arc::new(NoopRunner));
        assert_eq!(registry.list(), vec!["assert", "http", "wait"]);
    }

    #[test]
    fn register_replaces_existing() {
        let mut registry = RunnerRegistry::new();
        registry.register("http", Arc::new(NoopRunner));
        registry.register("http", Arc::new(NoopRunner));
        assert_eq!(registry.len(), 1);
    }
}
