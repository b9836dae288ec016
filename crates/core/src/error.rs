use thiserror::Error;

/// Errors shared across the execution engine's crates.
///
/// Individual crates (`turbulence-template`, `turbulence-expression`, ...)
/// define their own narrower error enums and convert into this one only at
/// the boundary where a caller needs a single type (e.g. an `Observation`'s
/// error list).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown action kind: {0}")]
    UnknownActionKind(String),

    #[error("unknown service: {0}")]
    UnknownService(String),

    #[error("missing context key: {0}")]
    MissingContextKey(String),

    #[error("malformed record: {0}")]
    MalformedRecord(String),
}
