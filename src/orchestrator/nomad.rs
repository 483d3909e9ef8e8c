//! Nomad HTTP API client.
//!
//! Converts a [`JobSpec`] into Nomad's JSON job document and registers it with
//! `PUT /v1/jobs`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};

use super::{JobRegistration, OrchestratorClient};
use crate::error::OrchestratorError;
use crate::job::{JobSpec, Task, TaskGroup};

/// Header carrying the Nomad ACL token.
const TOKEN_HEADER: &str = "X-Nomad-Token";

/// Default timeout for a single API request.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Request body of `PUT /v1/jobs`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegisterJobRequest {
    pub job: NomadJob,
}

/// Nomad job document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NomadJob {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    #[serde(rename = "Type")]
    pub job_type: String,
    pub region: String,
    pub priority: i32,
    pub datacenters: Vec<String>,
    pub task_groups: Vec<NomadTaskGroup>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NomadTaskGroup {
    pub name: String,
    pub count: u32,
    pub tasks: Vec<NomadTask>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NomadTask {
    pub name: String,
    pub driver: String,
    pub config: BTreeMap<String, serde_json::Value>,
    pub env: BTreeMap<String, String>,
    pub services: Vec<NomadService>,
    pub resources: NomadResources,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NomadService {
    pub name: String,
    pub port_label: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NomadResources {
    #[serde(rename = "MemoryMB", skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u32>,
    pub networks: Vec<NomadNetwork>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NomadNetwork {
    pub reserved_ports: Vec<NomadPort>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NomadPort {
    pub label: String,
    pub value: u16,
}

/// Response body of `PUT /v1/jobs`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RegisterJobResponse {
    #[serde(rename = "EvalID")]
    pub eval_id: String,
    pub job_modify_index: u64,
    pub warnings: String,
}

impl From<&Task> for NomadTask {
    fn from(task: &Task) -> Self {
        let mut config = BTreeMap::new();
        config.insert(
            "image".to_string(),
            serde_json::Value::String(task.image.clone()),
        );

        Self {
            name: task.name.clone(),
            driver: task.driver.driver_name().to_string(),
            config,
            env: task.env.clone(),
            services: task
                .services
                .iter()
                .map(|s| NomadService {
                    name: s.name.clone(),
                    port_label: s.port_label.clone(),
                })
                .collect(),
            resources: NomadResources {
                memory_mb: task.memory_limit_mb,
                networks: vec![NomadNetwork {
                    reserved_ports: task
                        .reserved_ports
                        .iter()
                        .map(|p| NomadPort {
                            label: p.label.clone(),
                            value: p.value,
                        })
                        .collect(),
                }],
            },
        }
    }
}

impl From<&TaskGroup> for NomadTaskGroup {
    fn from(group: &TaskGroup) -> Self {
        Self {
            name: group.name.clone(),
            count: group.replica_count,
            tasks: group.tasks.iter().map(NomadTask::from).collect(),
        }
    }
}

impl From<&JobSpec> for NomadJob {
    fn from(job: &JobSpec) -> Self {
        Self {
            id: job.id.clone(),
            name: job.name.clone(),
            job_type: job.kind.as_str().to_string(),
            region: job.region.clone(),
            priority: job.priority,
            datacenters: job.datacenters.clone(),
            task_groups: job.task_groups.iter().map(NomadTaskGroup::from).collect(),
        }
    }
}

/// Client for the Nomad HTTP API.
pub struct NomadClient {
    /// Base URL of the API, e.g. `http://127.0.0.1:4646/`.
    base_url: Url,
    /// Optional ACL token.
    token: Option<String>,
    /// HTTP client for making API requests.
    http_client: Client,
}

impl NomadClient {
    /// Creates a client with the default request timeout.
    pub fn new(base_url: Url, token: Option<String>) -> Result<Self, OrchestratorError> {
        Self::with_timeout(base_url, token, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a client whose requests time out after `timeout`.
    pub fn with_timeout(
        base_url: Url,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, OrchestratorError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OrchestratorError::Connection(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            token: token.filter(|t| !t.is_empty()),
            http_client,
        })
    }

    /// Returns the API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn jobs_url(&self) -> Result<Url, OrchestratorError> {
        // Keep any path prefix of the base, e.g. a proxy mounted at `/nomad`.
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join("v1/jobs")
            .map_err(|e| OrchestratorError::InvalidAddress {
                address: self.base_url.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl OrchestratorClient for NomadClient {
    async fn register_job(&self, job: JobSpec) -> Result<JobRegistration, OrchestratorError> {
        job.validate()?;

        let url = self.jobs_url()?;
        let body = RegisterJobRequest {
            job: NomadJob::from(&job),
        };

        tracing::debug!(job_id = %job.id, url = %url, "Registering job with Nomad");

        let mut request = self.http_client.put(url).json(&body);
        if let Some(token) = &self.token {
            request = request.header(TOKEN_HEADER, token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| OrchestratorError::Connection(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| OrchestratorError::Connection(e.to_string()))?;

        if !status.is_success() {
            return Err(submission_error(status, text));
        }

        let parsed: RegisterJobResponse = serde_json::from_str(&text).map_err(|e| {
            OrchestratorError::InvalidResponse(format!("{e}, body: {text}"))
        })?;

        if !parsed.warnings.is_empty() {
            tracing::warn!(job_id = %job.id, warnings = %parsed.warnings, "Nomad returned warnings");
        }

        Ok(JobRegistration {
            job_id: job.id,
            eval_id: Some(parsed.eval_id).filter(|id| !id.is_empty()),
            job_modify_index: parsed.job_modify_index,
            warnings: Some(parsed.warnings).filter(|w| !w.is_empty()),
        })
    }
}

fn submission_error(status: StatusCode, body: String) -> OrchestratorError {
    let message = body.trim();
    OrchestratorError::Submission {
        status: status.as_u16(),
        message: if message.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        } else {
            message.to_string()
        },
    }
}
