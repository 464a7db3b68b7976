//! Core pipeline orchestration for jobflow.
//!
//! This crate resolves search phrases and ties together retrieval, filtering,
//! the seen store, and the sink into a single run (`pipeline::run`).

pub mod pipeline;
pub mod queries;

pub use pipeline::{ProgressReporter, SilentProgress, run};
pub use queries::{DEFAULT_QUERIES, QuerySources, resolve_queries};
