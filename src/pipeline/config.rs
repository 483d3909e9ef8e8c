//! Pipeline configuration.
//!
//! This module provides configuration for the deployment pipeline: which stage
//! variant to run, readiness polling limits, orchestrator defaults, and the
//! options used to build the application job.

use std::time::Duration;
use thiserror::Error;

use super::stage::PipelineVariant;
use crate::datastore::readiness::{DEFAULT_POLL_INTERVAL, DEFAULT_READINESS_TIMEOUT};
use crate::job::DeployOptions;
use crate::orchestrator::{DEFAULT_NOMAD_HOST, NOMAD_PORT};

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration for the stage runner.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    // Stage wiring
    /// Which set of stages `run_pipeline` executes by default.
    pub variant: PipelineVariant,
    /// Fail stages up front when a required argument is absent.
    pub require_arguments: bool,

    // Readiness settings
    /// Delay between readiness probes.
    pub poll_interval: Duration,
    /// Total time to wait for the database.
    pub readiness_timeout: Duration,

    // Orchestrator settings
    /// Nomad host used when `NOMAD_API` is not supplied.
    pub default_nomad_host: String,
    /// Port appended to a bare `NOMAD_API` host.
    pub nomad_port: u16,
    /// Timeout for a single orchestrator request.
    pub request_timeout: Duration,

    // Job settings
    /// Options for the generated job; `deploy.database_name` is also the
    /// database the readiness and seed stages connect to.
    pub deploy: DeployOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            variant: PipelineVariant::WithReadiness,
            require_arguments: true,

            poll_interval: DEFAULT_POLL_INTERVAL,
            readiness_timeout: DEFAULT_READINESS_TIMEOUT,

            default_nomad_host: DEFAULT_NOMAD_HOST.to_string(),
            nomad_port: NOMAD_PORT,
            request_timeout: Duration::from_secs(30),

            deploy: DeployOptions::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SEED_FORGE_VARIANT`: `direct` or `with-readiness` (default: with-readiness)
    /// - `SEED_FORGE_REQUIRE_ARGUMENTS`: Validate required arguments up front (default: true)
    /// - `SEED_FORGE_POLL_INTERVAL_SECS`: Readiness poll interval (default: 3)
    /// - `SEED_FORGE_READINESS_TIMEOUT_SECS`: Readiness timeout (default: 60)
    /// - `SEED_FORGE_DEFAULT_NOMAD_HOST`: Nomad host when `NOMAD_API` is absent (default: 127.0.0.1)
    /// - `SEED_FORGE_NOMAD_PORT`: Nomad API port (default: 4646)
    /// - `SEED_FORGE_REQUEST_TIMEOUT_SECS`: Orchestrator request timeout (default: 30)
    /// - `SEED_FORGE_DATABASE`: Application database name (default: myappdb)
    /// - `SEED_FORGE_FRONTEND_IMAGE`: Frontend image without tag (default: michelvocks/myapp)
    /// - `SEED_FORGE_USE_RESOLVED_HOST`: Pass `MYAPP_HOST` to the frontend (default: false)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("SEED_FORGE_VARIANT") {
            config.variant = val.parse().map_err(|message| ConfigError::InvalidValue {
                key: "SEED_FORGE_VARIANT".to_string(),
                message,
            })?;
        }

        if let Some(val) = lookup("SEED_FORGE_REQUIRE_ARGUMENTS") {
            config.require_arguments = parse_env_bool(&val, "SEED_FORGE_REQUIRE_ARGUMENTS")?;
        }

        // Readiness settings
        if let Some(val) = lookup("SEED_FORGE_POLL_INTERVAL_SECS") {
            let secs: u64 = parse_env_value(&val, "SEED_FORGE_POLL_INTERVAL_SECS")?;
            config.poll_interval = Duration::from_secs(secs);
        }

        if let Some(val) = lookup("SEED_FORGE_READINESS_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "SEED_FORGE_READINESS_TIMEOUT_SECS")?;
            config.readiness_timeout = Duration::from_secs(secs);
        }

        // Orchestrator settings
        if let Some(val) = lookup("SEED_FORGE_DEFAULT_NOMAD_HOST") {
            config.default_nomad_host = val;
        }

        if let Some(val) = lookup("SEED_FORGE_NOMAD_PORT") {
            config.nomad_port = parse_env_value(&val, "SEED_FORGE_NOMAD_PORT")?;
        }

        if let Some(val) = lookup("SEED_FORGE_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "SEED_FORGE_REQUEST_TIMEOUT_SECS")?;
            config.request_timeout = Duration::from_secs(secs);
        }

        // Job settings
        if let Some(val) = lookup("SEED_FORGE_DATABASE") {
            config.deploy.database_name = val;
        }

        if let Some(val) = lookup("SEED_FORGE_FRONTEND_IMAGE") {
            config.deploy.frontend_image = val;
        }

        if let Some(val) = lookup("SEED_FORGE_USE_RESOLVED_HOST") {
            config.deploy.use_resolved_host = parse_env_bool(&val, "SEED_FORGE_USE_RESOLVED_HOST")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "poll_interval must be greater than 0".to_string(),
            ));
        }

        if self.readiness_timeout < self.poll_interval {
            return Err(ConfigError::ValidationFailed(
                "readiness_timeout must be at least one poll_interval".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        if self.default_nomad_host.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "default_nomad_host cannot be empty".to_string(),
            ));
        }

        if self.nomad_port == 0 {
            return Err(ConfigError::ValidationFailed(
                "nomad_port must be greater than 0".to_string(),
            ));
        }

        if self.deploy.replica_count == 0 {
            return Err(ConfigError::ValidationFailed(
                "replica_count must be at least 1".to_string(),
            ));
        }

        if self.deploy.database_name.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "database_name cannot be empty".to_string(),
            ));
        }

        if self.deploy.frontend_image.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "frontend_image cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    // Builder methods

    /// Sets the default pipeline variant.
    pub fn with_variant(mut self, variant: PipelineVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Enables or disables up-front argument validation.
    pub fn with_require_arguments(mut self, require: bool) -> Self {
        self.require_arguments = require;
        self
    }

    /// Sets the readiness poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the readiness timeout.
    pub fn with_readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = timeout;
        self
    }

    /// Sets the fallback Nomad host.
    pub fn with_default_nomad_host(mut self, host: impl Into<String>) -> Self {
        self.default_nomad_host = host.into();
        self
    }

    /// Sets the orchestrator request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Replaces the job options.
    pub fn with_deploy_options(mut self, deploy: DeployOptions) -> Self {
        self.deploy = deploy;
        self
    }
}

/// Parses an environment variable value.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// Parses a boolean environment variable value.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean, got '{}'", value),
        }),
    }
}
