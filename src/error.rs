//! Error types for seed-forge operations.
//!
//! Defines error types for every stage of the deployment pipeline:
//! - Argument resolution
//! - Job specification invariants
//! - Orchestrator (Nomad) job submission
//! - Data store readiness and seeding
//! - Stage and pipeline execution

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while resolving stage arguments.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("Missing required argument '{0}'")]
    MissingRequiredKey(String),

    #[error("Malformed argument '{0}': expected KEY=VALUE")]
    Malformed(String),
}

/// Invariant violations in a job specification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobSpecError {
    #[error("Job has no task groups")]
    NoTaskGroups,

    #[error("Task group '{group}' has replica count {count}, must be at least 1")]
    InvalidReplicaCount { group: String, count: u32 },

    #[error("Task group '{0}' has no tasks")]
    EmptyTaskGroup(String),

    #[error("Task '{task}' reserves port label '{label}' more than once")]
    DuplicatePortLabel { task: String, label: String },

    #[error("Task '{task}' reserves port 0 for label '{label}'")]
    InvalidPort { task: String, label: String },

    #[error("Task '{task}' reserves port label '{label}' that no service registration uses")]
    UnusedPortLabel { task: String, label: String },

    #[error("Service '{service}' in task '{task}' references unknown port label '{label}'")]
    UnknownPortLabel {
        task: String,
        service: String,
        label: String,
    },
}

/// Errors that can occur while submitting a job to the orchestrator.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Invalid orchestrator address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Job specification rejected before submission: {0}")]
    InvalidJob(#[from] JobSpecError),

    #[error("Failed to reach orchestrator API: {0}")]
    Connection(String),

    #[error("Orchestrator rejected job ({status}): {message}")]
    Submission { status: u16, message: String },

    #[error("Failed to parse orchestrator response: {0}")]
    InvalidResponse(String),
}

/// Errors that can occur while talking to the application database.
#[derive(Debug, Error)]
pub enum DatastoreError {
    #[error("Failed to connect to database: {0}")]
    Connection(String),

    #[error("Statement '{statement}' failed: {source}")]
    Query {
        statement: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Timed out after {waited:?} waiting for database ({attempts} attempts)")]
    Timeout { waited: Duration, attempts: u32 },

    #[error("Wait for database was cancelled")]
    Cancelled,
}

/// Errors returned by a single pipeline stage.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Argument error: {0}")]
    Arguments(#[from] ArgumentError),

    #[error("Orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    #[error("Database error: {0}")]
    Datastore(#[from] DatastoreError),

    #[error("Stage '{0}' was cancelled")]
    Cancelled(String),
}

/// Errors returned by a full pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Stage '{stage}' failed: {source}")]
    StageFailed {
        stage: String,
        #[source]
        source: StageError,
    },
}

impl PipelineError {
    /// Returns the title of the stage that failed.
    pub fn stage(&self) -> &str {
        match self {
            PipelineError::StageFailed { stage, .. } => stage,
        }
    }
}
