//! Action runners (§4.6–§4.11): one [`runner_trait::ActionRunner`]
//! implementation per [`turbulence_core::Action`] kind, dispatched through a
//! [`registry::RunnerRegistry`].

pub mod assert;
pub mod decide;
pub mod error;
pub mod grpc;
pub mod http;
pub mod registry;
pub mod retry;
pub mod runner_trait;
pub mod wait;

use std::sync::Arc;

pub use assert::{evaluate_expectation, AssertionOutcome, AssertRunner};
pub use decide::{DecideRunner, Policy};
pub use error::RunnerError;
pub use grpc::GrpcRunner;
pub use http::HttpRunner;
pub use registry::RunnerRegistry;
pub use runner_trait::{ActionRunner, DynActionRunner};
pub use wait::WaitRunner;

/// Builds a [`RunnerRegistry`] wired up with every built-in runner (§4.5),
/// sharing one [`turbulence_client::ClientPool`] across the protocol
/// runners that need one.
#[must_use]
pub fn default_registry(pool: Arc<turbulence_client::ClientPool>, decide_policy: Arc<Policy>, decide_seed: u64) -> RunnerRegistry {
    let mut registry = RunnerRegistry::new();
    registry.register("http", Arc::new(HttpRunner::new(pool.clone())));
    registry.register("wait", Arc::new(WaitRunner::new(pool.clone())));
    registry.register("grpc", Arc::new(GrpcRunner::new(pool)));
    registry.register("assert", Arc::new(AssertRunner));
    registry.register("decide", Arc::new(DecideRunner::new(decide_policy, decide_seed)));
    registry
}
