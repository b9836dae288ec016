//! Bounded-concurrency run driver (§4.14, §6, §7): [`ParallelExecutor`] walks
//! a scenario across many instances, wrapping each through
//! [`turbulence_scenario::ScenarioRunner`] and persisting records through a
//! [`StorageSink`].

pub mod config;
pub mod error;
pub mod executor;
pub mod sink;
pub mod stats;

pub use config::RunConfig;
pub use error::ExecutorError;
pub use executor::ParallelExecutor;
pub use sink::{NullSink, RunManifest, StorageSink};
pub use stats::ExecutionStats;
