use async_trait::async_trait;
use turbulence_core::{Action, Observation, WorkflowContext};

use crate::error::RunnerError;

/// A concrete action runner for one action kind.
///
/// Native `async fn`, so it cannot be used as a trait object directly — see
/// [`DynActionRunner`] for the object-safe counterpart used by the
/// [`crate::registry::RunnerRegistry`].
pub trait ActionRunner: Send + Sync {
    fn run(
        &self,
        action: &Action,
        context: WorkflowContext,
    ) -> impl std::future::Future<Output = Result<(Observation, WorkflowContext), RunnerError>> + Send;
}

/// Object-safe counterpart of [`ActionRunner`], implemented automatically
/// for every `T: ActionRunner + Sync` via the blanket impl below.
#[async_trait]
pub trait DynActionRunner: Send + Sync {
    async fn run_dyn(&self, action: &Action, context: WorkflowContext) -> Result<(Observation, WorkflowContext), RunnerError>;
}

#[async_trait]
impl<T> DynActionRunner for T
where
    T: ActionRunner + Sync,
{
    async fn run_dyn(&self, action: &Action, context: WorkflowContext) -> Result<(Observation, WorkflowContext), RunnerError> {
        self.run(action, context).await
    }
}
