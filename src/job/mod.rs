//! Job specification model and builder.
//!
//! ```rust,ignore
//! use seed_forge::args::{Argument, ArgumentMap};
//! use seed_forge::job::{build_job_spec, DeployOptions};
//!
//! let args = ArgumentMap::resolve(&[Argument::new("MYAPP_PASS", "secret")]);
//! let job = build_job_spec(&args, &DeployOptions::default());
//! job.validate()?;
//! ```

pub mod builder;
pub mod types;

pub use builder::{build_job_spec, DeployOptions, DATABASE_PORT, FRONTEND_PORT, INTERNAL_DB_HOST};
pub use types::{
    DriverKind, JobKind, JobSpec, PortReservation, ServiceRegistration, Task, TaskGroup,
};
