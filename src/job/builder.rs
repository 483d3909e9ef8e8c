//! Builds the application job from stage arguments.
//!
//! The job always has one task group with two tasks: the `myapp` frontend and
//! its `db` MySQL container. Argument values only end up in environment
//! variables, never in the shape of the job.

use serde::{Deserialize, Serialize};

use super::types::{JobKind, JobSpec, Task, TaskGroup};
use crate::args::{keys, ArgumentMap};

/// Hostname containers use to reach a database published on the Docker host.
pub const INTERNAL_DB_HOST: &str = "host.docker.internal:3306";

/// Port reserved for the frontend service.
pub const FRONTEND_PORT: u16 = 9090;

/// Port reserved for the database service.
pub const DATABASE_PORT: u16 = 3306;

/// Knobs for the generated job. Defaults reproduce the stock `myapp` deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployOptions {
    pub job_id: String,
    pub job_name: String,
    pub region: String,
    pub priority: i32,
    pub datacenters: Vec<String>,
    pub task_group: String,
    pub replica_count: u32,
    /// Frontend image without tag; `:latest` is appended.
    pub frontend_image: String,
    pub database_image: String,
    pub database_name: String,
    pub database_memory_mb: u32,
    /// Inject the resolved `MYAPP_HOST` into the frontend instead of
    /// [`INTERNAL_DB_HOST`].
    pub use_resolved_host: bool,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            job_id: "myapp".to_string(),
            job_name: "myapp".to_string(),
            region: "eu".to_string(),
            priority: 50,
            datacenters: vec!["dc1".to_string()],
            task_group: "myAppTaskGroup".to_string(),
            replica_count: 1,
            frontend_image: "michelvocks/myapp".to_string(),
            database_image: "mysql:latest".to_string(),
            database_name: "myappdb".to_string(),
            database_memory_mb: 800,
            use_resolved_host: false,
        }
    }
}

impl DeployOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_use_resolved_host(mut self, use_resolved_host: bool) -> Self {
        self.use_resolved_host = use_resolved_host;
        self
    }

    pub fn with_frontend_image(mut self, image: impl Into<String>) -> Self {
        self.frontend_image = image.into();
        self
    }

    pub fn with_database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = name.into();
        self
    }

    pub fn with_replica_count(mut self, count: u32) -> Self {
        self.replica_count = count;
        self
    }
}

/// Builds the job spec. Missing arguments become empty strings.
pub fn build_job_spec(args: &ArgumentMap, options: &DeployOptions) -> JobSpec {
    let db_host = if options.use_resolved_host {
        args.get_or_empty(keys::MYAPP_HOST).to_string()
    } else {
        INTERNAL_DB_HOST.to_string()
    };
    let user = args.get_or_empty(keys::MYAPP_USER);
    let password = args.get_or_empty(keys::MYAPP_PASS);

    let frontend = Task::container("myapp", format!("{}:latest", options.frontend_image))
        .with_env("MYAPP_DB_HOST", db_host)
        .with_env("MYAPP_DB_USERNAME", user)
        .with_env("MYAPP_DB_PASSWORD", password)
        .with_service("myapp-frontend", "frontend", FRONTEND_PORT);

    let database = Task::container("db", options.database_image.clone())
        .with_env("MYSQL_ROOT_PASSWORD", password)
        .with_env("MYSQL_DATABASE", options.database_name.clone())
        .with_service("db-backend", "backend", DATABASE_PORT)
        .with_memory_limit_mb(options.database_memory_mb);

    JobSpec {
        id: options.job_id.clone(),
        name: options.job_name.clone(),
        kind: JobKind::Service,
        region: options.region.clone(),
        priority: options.priority,
        datacenters: options.datacenters.clone(),
        task_groups: vec![TaskGroup {
            name: options.task_group.clone(),
            replica_count: options.replica_count,
            tasks: vec![frontend, database],
        }],
    }
}
