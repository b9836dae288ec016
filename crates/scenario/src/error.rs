use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Runner(#[from] turbulence_runner::RunnerError),

    #[error(transparent)]
    Expression(#[from] turbulence_expression::ExpressionError),

    #[error(transparent)]
    Fault(#[from] turbulence_fault::FaultError),
}
