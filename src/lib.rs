//! seed-forge: deploy an application job to Nomad, wait for its database and
//! seed fixture data.
//!
//! This library provides the three pipeline stages and the runner that
//! executes them in dependency order.

// Core modules
pub mod args;
pub mod cli;
pub mod datastore;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod pipeline;

// Re-export commonly used error types
pub use error::{
    ArgumentError, DatastoreError, JobSpecError, OrchestratorError, PipelineError, StageError,
};
