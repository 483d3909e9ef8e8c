//! Stage catalogue and pipeline variants.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::datastore::{ReadinessReport, SeedReport};
use crate::orchestrator::JobRegistration;

/// One unit of work the host can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Register the application job with the orchestrator.
    DeployApplication,
    /// Wait for the application database to accept connections.
    WaitForDatabase,
    /// Reset and fill the fixture table.
    ImportTestData,
}

impl Stage {
    pub const ALL: [Stage; 3] = [
        Stage::DeployApplication,
        Stage::WaitForDatabase,
        Stage::ImportTestData,
    ];

    /// Human-readable title, also used to name dependencies.
    pub fn title(&self) -> &'static str {
        match self {
            Stage::DeployApplication => "Deploy Application",
            Stage::WaitForDatabase => "Wait for DB",
            Stage::ImportTestData => "Import test data",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Stage::DeployApplication => "deploy the application with database",
            Stage::WaitForDatabase => "wait for database to come up",
            Stage::ImportTestData => "import test data into application database",
        }
    }

    /// Short name accepted on the command line.
    pub fn short_name(&self) -> &'static str {
        match self {
            Stage::DeployApplication => "deploy",
            Stage::WaitForDatabase => "wait",
            Stage::ImportTestData => "seed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| {
                stage.short_name().eq_ignore_ascii_case(s) || stage.title().eq_ignore_ascii_case(s)
            })
            .ok_or_else(|| format!("unknown stage '{s}' (expected deploy, wait or seed)"))
    }
}

/// Which stages make up a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineVariant {
    /// Deploy, then seed straight away against an already-resolvable host.
    Direct,
    /// Deploy, wait for the database, then seed.
    WithReadiness,
}

impl PipelineVariant {
    /// Stages in execution order.
    pub fn stages(&self) -> &'static [Stage] {
        match self {
            PipelineVariant::Direct => &[Stage::DeployApplication, Stage::ImportTestData],
            PipelineVariant::WithReadiness => &Stage::ALL,
        }
    }

    /// Stages `stage` depends on in this variant.
    pub fn depends_on(&self, stage: Stage) -> &'static [Stage] {
        match (self, stage) {
            (_, Stage::DeployApplication) => &[],
            (_, Stage::WaitForDatabase) => &[Stage::DeployApplication],
            (PipelineVariant::Direct, Stage::ImportTestData) => &[Stage::DeployApplication],
            (PipelineVariant::WithReadiness, Stage::ImportTestData) => &[Stage::WaitForDatabase],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineVariant::Direct => "direct",
            PipelineVariant::WithReadiness => "with-readiness",
        }
    }
}

impl fmt::Display for PipelineVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "direct" => Ok(PipelineVariant::Direct),
            "with-readiness" | "with_readiness" | "wait" => Ok(PipelineVariant::WithReadiness),
            other => Err(format!(
                "unknown pipeline variant '{other}' (expected direct or with-readiness)"
            )),
        }
    }
}

/// What a successful stage produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageOutcome {
    Deployed(JobRegistration),
    Ready(ReadinessReport),
    Seeded(SeedReport),
}
