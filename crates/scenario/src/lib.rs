//! The recursive scenario interpreter (§4.12).

pub mod error;
pub mod interpreter;

pub use error::ScenarioError;
pub use interpreter::{ScenarioRunner, StepEmission};
