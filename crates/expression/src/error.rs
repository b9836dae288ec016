use thiserror::Error;

/// A forbidden construct: an identifier outside the whitelist, a
/// leading-underscore attribute, or a call to a non-whitelisted function.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpressionSecurityError {
    #[error("identifier {0:?} is not bound")]
    UnboundIdentifier(String),
    #[error("attribute {0:?} is not accessible")]
    ForbiddenAttribute(String),
    #[error("function {0:?} is not in the call whitelist")]
    ForbiddenCall(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("syntax error at position {0}: {1}")]
    Syntax(usize, String),
    #[error("type error: {0}")]
    Type(String),
    #[error("wrong number of arguments to {0}: expected {1}, got {2}")]
    Arity(&'static str, usize, usize),
    #[error(transparent)]
    Security(#[from] ExpressionSecurityError),
}
