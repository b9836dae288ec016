//! Shared data model for the Turbulence execution engine: actions,
//! scenarios, the system under test, the per-instance workflow context,
//! observations, and the three record types persisted by a storage sink.

pub mod action;
pub mod context;
pub mod error;
pub mod observation;
pub mod record;
pub mod scenario;
pub mod sut;

pub use action::{Action, AssertAction, BackoffPolicy, BranchAction, DecideAction, Expectation, GrpcAction, HttpAction, RetryConfig, WaitAction};
pub use context::WorkflowContext;
pub use error::EngineError;
pub use observation::{AttemptRecord, BranchTaken, Observation};
pub use record::{AssertionRecord, InstanceRecord, StepRecord};
pub use scenario::{Scenario, StopCondition};
pub use sut::{Service, ServiceConfig, Sut};
