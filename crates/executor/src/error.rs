use thiserror::Error;

/// Fatal, run-level failures (§7): everything short of this is recorded as a
/// per-instance [`turbulence_core::InstanceRecord`] instead of aborting the
/// run.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error(transparent)]
    ClientPool(#[from] turbulence_client::ClientPoolError),

    #[error("storage sink error: {0}")]
    Sink(String),

    #[error("instance task panicked: {0}")]
    InstancePanic(String),
}
