use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("unknown action kind: {0}")]
    UnknownKind(String),

    #[error(transparent)]
    Template(#[from] turbulence_template::TemplateError),

    #[error(transparent)]
    Expression(#[from] turbulence_expression::ExpressionError),

    #[error(transparent)]
    ClientPool(#[from] turbulence_client::ClientPoolError),

    #[error("http request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("invalid http method: {0}")]
    InvalidMethod(String),

    #[error("grpc call failed: {0}")]
    Grpc(String),

    #[error("jsonpath extraction failed for {path}: {message}")]
    Extraction { path: String, message: String },

    #[error("decide policy missing decision {0:?}")]
    MissingDecision(String),

    #[error("wait action timed out after {0}ms")]
    WaitTimeout(u64),
}

impl RunnerError {
    /// Whether the failure is a network-level condition the retry state
    /// machine should consider, as opposed to a programming/config error.
    #[must_use]
    pub fn is_retryable_class(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Grpc(_))
    }
}
