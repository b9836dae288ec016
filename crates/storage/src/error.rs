use thiserror::Error;

/// Internal failures of [`crate::JsonlSink`], before they cross the
/// [`turbulence_executor::StorageSink`] trait boundary into an
/// `ExecutorError::Sink`.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error writing {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },

    #[error(transparent)]
    Serialize(#[from] serde_json::Error),

    #[error("write attempted before initialize")]
    NotInitialized,
}

impl From<StorageError> for turbulence_executor::ExecutorError {
    fn from(err: StorageError) -> Self {
        turbulence_executor::ExecutorError::Sink(err.to_string())
    }
}
