use thiserror::Error;

#[derive(Debug, Error)]
pub enum FaultError {
    #[error("downstream action failed: {0}")]
    Downstream(String),
}
