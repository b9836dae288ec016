//! The concrete, filesystem-backed [`turbulence_executor::StorageSink`]
//! implementation (§6).

pub mod error;
pub mod jsonl;

pub use error::StorageError;
pub use jsonl::JsonlSink;
