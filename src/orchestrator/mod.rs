//! Orchestrator job submission.
//!
//! Only the single operation the deploy stage needs is modelled: registering
//! (creating or updating) a job. Registration is an upsert keyed by job ID, so
//! submitting the same spec twice updates the existing job in place.

pub mod address;
pub mod nomad;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;
use crate::job::JobSpec;

pub use address::{resolve_api_address, DEFAULT_NOMAD_HOST, NOMAD_PORT};
pub use nomad::NomadClient;

/// Outcome of a successful job registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRegistration {
    /// ID of the registered job.
    pub job_id: String,
    /// Evaluation created for the registration, if any.
    pub eval_id: Option<String>,
    /// Modify index of the job after registration.
    pub job_modify_index: u64,
    /// Non-fatal warnings returned by the orchestrator.
    pub warnings: Option<String>,
}

/// Client able to register jobs with a cluster orchestrator.
#[async_trait]
pub trait OrchestratorClient: Send + Sync {
    /// Registers `job`, creating it or updating the existing job with the same ID.
    ///
    /// A single attempt is made; failures are returned immediately.
    async fn register_job(&self, job: JobSpec) -> Result<JobRegistration, OrchestratorError>;
}
