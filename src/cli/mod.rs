//! Command-line interface for seed-forge.
//!
//! Provides commands to run the deployment pipeline or a single stage, and to
//! inspect the generated job and stage wiring.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli};
