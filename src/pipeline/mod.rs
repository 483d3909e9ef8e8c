//! Stage orchestration for the deployment pipeline.
//!
//! # Stages
//!
//! - **Deploy Application**: build the `myapp` job and register it with Nomad
//! - **Wait for DB**: poll the application database until it accepts connections
//! - **Import test data**: reset the `names` table and insert the fixture rows
//!
//! # Variants
//!
//! The same three stages are wired into two pipelines:
//!
//! - [`PipelineVariant::WithReadiness`]: deploy → wait → seed
//! - [`PipelineVariant::Direct`]: deploy → seed, for hosts that are already
//!   reachable when the job is submitted
//!
//! A failed stage stops the run; later stages are never started.
//!
//! # Example
//!
//! ```rust,ignore
//! use seed_forge::args::Argument;
//! use seed_forge::pipeline::{PipelineConfig, PipelineVariant, StageRunner};
//!
//! let runner = StageRunner::new(PipelineConfig::from_env()?);
//! let args = vec![
//!     Argument::new("MYAPP_HOST", "127.0.0.1:3306"),
//!     Argument::new("MYAPP_USER", "root"),
//!     Argument::new("MYAPP_PASS", "mysecretpw"),
//! ];
//!
//! let report = runner.run_pipeline(PipelineVariant::WithReadiness, &args).await?;
//! for stage in &report.stages {
//!     println!("{} finished in {}ms", stage.stage, stage.duration_ms);
//! }
//! ```

pub mod config;
pub mod runner;
pub mod stage;

// Re-export main types for convenience
pub use config::{ConfigError, PipelineConfig};
pub use runner::{PipelineReport, StageReport, StageRunner};
pub use stage::{PipelineVariant, Stage, StageOutcome};
