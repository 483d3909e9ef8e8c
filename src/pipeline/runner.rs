//! Stage execution.
//!
//! The [`StageRunner`] is what the host calls: either one stage at a time, or
//! a whole [`PipelineVariant`] in dependency order. Every invocation rebuilds
//! its state from the supplied arguments; nothing is carried between calls.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::config::PipelineConfig;
use super::stage::{PipelineVariant, Stage, StageOutcome};
use crate::args::{keys, Argument, ArgumentMap, DATASTORE_KEYS};
use crate::datastore::{DatastoreConfig, ReadinessPoller, SeedExecutor, SqlProbe};
use crate::error::{ArgumentError, DatastoreError, PipelineError, StageError};
use crate::job::build_job_spec;
use crate::orchestrator::{resolve_api_address, NomadClient, OrchestratorClient};

/// Record of one completed stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub outcome: StageOutcome,
    pub duration_ms: u64,
}

/// Record of a completed pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub variant: PipelineVariant,
    pub stages: Vec<StageReport>,
    pub duration_ms: u64,
}

/// Runs pipeline stages against the orchestrator and database.
pub struct StageRunner {
    config: PipelineConfig,
    /// Fixed orchestrator client; when unset a Nomad client is built from
    /// `NOMAD_API` on every deploy.
    orchestrator: Option<Arc<dyn OrchestratorClient>>,
    cancel: CancellationToken,
}

impl StageRunner {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            orchestrator: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `client` for every deploy instead of a per-call Nomad client.
    pub fn with_orchestrator(mut self, client: Arc<dyn OrchestratorClient>) -> Self {
        self.orchestrator = Some(client);
        self
    }

    /// Aborts in-flight and pending stages when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Runs a single stage.
    pub async fn run_stage(
        &self,
        stage: Stage,
        args: &[Argument],
    ) -> Result<StageOutcome, StageError> {
        if self.cancel.is_cancelled() {
            return Err(StageError::Cancelled(stage.title().to_string()));
        }

        let args = self.resolve_arguments(args)?;
        tracing::info!(stage = %stage, "Starting stage");

        let outcome = match stage {
            Stage::DeployApplication => self.deploy_application(&args).await,
            Stage::WaitForDatabase => self.wait_for_database(&args).await,
            Stage::ImportTestData => self.import_test_data(&args).await,
        };

        match &outcome {
            Ok(_) => tracing::info!(stage = %stage, "Stage completed"),
            Err(e) => tracing::error!(stage = %stage, error = %e, "Stage failed"),
        }
        outcome
    }

    /// Runs every stage of `variant` in order, stopping at the first failure.
    pub async fn run_pipeline(
        &self,
        variant: PipelineVariant,
        args: &[Argument],
    ) -> Result<PipelineReport, PipelineError> {
        let started = Instant::now();
        let mut reports = Vec::with_capacity(variant.stages().len());

        tracing::info!(variant = %variant, "Starting pipeline");
        for stage in variant.stages() {
            let stage_started = Instant::now();
            let outcome = self
                .run_stage(*stage, args)
                .await
                .map_err(|source| PipelineError::StageFailed {
                    stage: stage.title().to_string(),
                    source,
                })?;
            reports.push(StageReport {
                stage: *stage,
                outcome,
                duration_ms: millis(stage_started.elapsed()),
            });
        }

        Ok(PipelineReport {
            variant,
            stages: reports,
            duration_ms: millis(started.elapsed()),
        })
    }

    fn resolve_arguments(&self, args: &[Argument]) -> Result<ArgumentMap, ArgumentError> {
        if self.config.require_arguments {
            ArgumentMap::resolve_required(args, &DATASTORE_KEYS)
        } else {
            Ok(ArgumentMap::resolve(args))
        }
    }

    fn datastore(&self, args: &ArgumentMap) -> DatastoreConfig {
        DatastoreConfig::from_arguments(args, self.config.deploy.database_name.clone())
    }

    async fn deploy_application(&self, args: &ArgumentMap) -> Result<StageOutcome, StageError> {
        let job = build_job_spec(args, &self.config.deploy);

        let client: Arc<dyn OrchestratorClient> = match &self.orchestrator {
            Some(client) => Arc::clone(client),
            None => {
                let address = resolve_api_address(
                    args.get(keys::NOMAD_API),
                    &self.config.default_nomad_host,
                    self.config.nomad_port,
                )?;
                tracing::debug!(address = %address, "Using Nomad API");
                let token = args.get(keys::NOMAD_TOKEN).map(str::to_string);
                Arc::new(NomadClient::with_timeout(
                    address,
                    token,
                    self.config.request_timeout,
                )?)
            }
        };

        let registration = self
            .cancellable(Stage::DeployApplication, client.register_job(job))
            .await??;

        tracing::info!(
            job_id = %registration.job_id,
            eval_id = registration.eval_id.as_deref().unwrap_or("-"),
            "Job registered"
        );
        Ok(StageOutcome::Deployed(registration))
    }

    async fn wait_for_database(&self, args: &ArgumentMap) -> Result<StageOutcome, StageError> {
        let datastore = self.datastore(args);
        tracing::info!(
            database = %datastore.redacted_url(),
            interval = ?self.config.poll_interval,
            timeout = ?self.config.readiness_timeout,
            "Waiting for database"
        );

        let poller = ReadinessPoller::new(self.config.poll_interval, self.config.readiness_timeout);
        let probe = SqlProbe::new(datastore.url());
        match poller.wait(&probe, &self.cancel).await {
            Ok(report) => Ok(StageOutcome::Ready(report)),
            Err(DatastoreError::Cancelled) => Err(StageError::Cancelled(
                Stage::WaitForDatabase.title().to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn import_test_data(&self, args: &ArgumentMap) -> Result<StageOutcome, StageError> {
        let datastore = self.datastore(args);
        tracing::info!(database = %datastore.redacted_url(), "Importing test data");

        let executor = SeedExecutor::new(datastore.url());
        let report = self
            .cancellable(Stage::ImportTestData, executor.run())
            .await??;
        Ok(StageOutcome::Seeded(report))
    }

    /// Races `fut` against the runner's cancellation token.
    async fn cancellable<F, T>(&self, stage: Stage, fut: F) -> Result<T, StageError>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            _ = self.cancel.cancelled() => {
                tracing::warn!(stage = %stage, "Stage cancelled");
                Err(StageError::Cancelled(stage.title().to_string()))
            }
            value = fut => Ok(value),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrchestratorError;
    use crate::job::JobSpec;
    use crate::orchestrator::JobRegistration;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingOrchestrator {
        jobs: Mutex<Vec<JobSpec>>,
        fail: bool,
    }

    impl RecordingOrchestrator {
        fn new(fail: bool) -> Self {
            Self {
                jobs: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl OrchestratorClient for RecordingOrchestrator {
        async fn register_job(&self, job: JobSpec) -> Result<JobRegistration, OrchestratorError> {
            if self.fail {
                return Err(OrchestratorError::Submission {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            let job_id = job.id.clone();
            self.jobs.lock().expect("lock not poisoned").push(job);
            Ok(JobRegistration {
                job_id,
                eval_id: Some("eval-1".to_string()),
                job_modify_index: 1,
                warnings: None,
            })
        }
    }

    fn args() -> Vec<Argument> {
        vec![
            Argument::new(keys::MYAPP_HOST, "127.0.0.1:9"),
            Argument::new(keys::MYAPP_USER, "root"),
            Argument::new(keys::MYAPP_PASS, "mysecretpw"),
        ]
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig::default()
            .with_poll_interval(Duration::from_millis(50))
            .with_readiness_timeout(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_deploy_stage_submits_built_job() {
        let orchestrator = Arc::new(RecordingOrchestrator::new(false));
        let runner = StageRunner::new(fast_config()).with_orchestrator(orchestrator.clone());

        let outcome = runner
            .run_stage(Stage::DeployApplication, &args())
            .await
            .unwrap();
        assert!(matches!(outcome, StageOutcome::Deployed(ref r) if r.job_id == "myapp"));

        let jobs = orchestrator.jobs.lock().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(
            jobs[0].task("myapp").unwrap().env["MYAPP_DB_PASSWORD"],
            "mysecretpw"
        );
    }

    #[tokio::test]
    async fn test_missing_argument_fails_before_io() {
        let orchestrator = Arc::new(RecordingOrchestrator::new(false));
        let runner = StageRunner::new(fast_config()).with_orchestrator(orchestrator.clone());

        let err = runner
            .run_stage(
                Stage::DeployApplication,
                &[Argument::new(keys::MYAPP_HOST, "db:3306")],
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StageError::Arguments(ArgumentError::MissingRequiredKey(ref k)) if k == keys::MYAPP_USER
        ));
        assert!(orchestrator.jobs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lenient_mode_passes_empty_values_through() {
        let orchestrator = Arc::new(RecordingOrchestrator::new(false));
        let runner = StageRunner::new(fast_config().with_require_arguments(false))
            .with_orchestrator(orchestrator.clone());

        runner
            .run_stage(Stage::DeployApplication, &[])
            .await
            .unwrap();
        let jobs = orchestrator.jobs.lock().unwrap();
        assert_eq!(jobs[0].task("db").unwrap().env["MYSQL_ROOT_PASSWORD"], "");
    }

    #[tokio::test]
    async fn test_wait_stage_times_out_against_closed_port() {
        let runner = StageRunner::new(fast_config());
        let err = runner
            .run_stage(Stage::WaitForDatabase, &args())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StageError::Datastore(DatastoreError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_pipeline_halts_on_first_failure() {
        let orchestrator = Arc::new(RecordingOrchestrator::new(true));
        let runner = StageRunner::new(fast_config()).with_orchestrator(orchestrator);

        let err = runner
            .run_pipeline(PipelineVariant::WithReadiness, &args())
            .await
            .unwrap_err();
        assert_eq!(err.stage(), "Deploy Application");
        assert!(matches!(
            err,
            PipelineError::StageFailed {
                source: StageError::Orchestrator(OrchestratorError::Submission { status: 500, .. }),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_cancelled_runner_skips_stages() {
        let orchestrator = Arc::new(RecordingOrchestrator::new(false));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let runner = StageRunner::new(fast_config())
            .with_orchestrator(orchestrator.clone())
            .with_cancellation(cancel);

        let err = runner
            .run_pipeline(PipelineVariant::Direct, &args())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::StageFailed {
                source: StageError::Cancelled(_),
                ..
            }
        ));
        assert!(orchestrator.jobs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_wait() {
        let cancel = CancellationToken::new();
        let runner = StageRunner::new(
            PipelineConfig::default()
                .with_poll_interval(Duration::from_millis(50))
                .with_readiness_timeout(Duration::from_secs(30)),
        )
        .with_cancellation(cancel.clone());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = runner
            .run_stage(Stage::WaitForDatabase, &args())
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Cancelled(ref s) if s == "Wait for DB"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_nomad_address_error_surfaces() {
        let runner = StageRunner::new(fast_config());
        let mut args = args();
        args.push(Argument::new(keys::NOMAD_API, "http://"));

        let err = runner
            .run_stage(Stage::DeployApplication, &args)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StageError::Orchestrator(OrchestratorError::InvalidAddress { .. })
        ));
    }
}
