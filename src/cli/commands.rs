//! CLI command definitions for seed-forge.
//!
//! The CLI stands in for the pipeline host: it collects arguments, invokes
//! stages in dependency order and reports the outcome.

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::args::{declared_arguments, Argument, ArgumentMap};
use crate::job::build_job_spec;
use crate::orchestrator::nomad::{NomadJob, RegisterJobRequest};
use crate::pipeline::{PipelineConfig, PipelineVariant, Stage, StageRunner};

/// Deploy the myapp job to Nomad, wait for its database and seed test data.
#[derive(Parser)]
#[command(name = "seed-forge")]
#[command(about = "Deploy an application to Nomad and seed its database with fixture data")]
#[command(version)]
#[command(
    long_about = "seed-forge registers the myapp job with Nomad, waits for its MySQL database and seeds the `names` table.\n\nArguments are passed as KEY=VALUE pairs (MYAPP_HOST, MYAPP_USER, MYAPP_PASS, NOMAD_API, NOMAD_TOKEN).\n\nExample usage:\n  seed-forge run -a MYAPP_HOST=127.0.0.1:3306 -a MYAPP_USER=root -a MYAPP_PASS=mysecretpw"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Output JSON summary.
    #[arg(short = 'j', long, global = true)]
    pub json: bool,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run every stage of a pipeline variant in order.
    Run(RunArgs),

    /// Run a single stage (deploy, wait or seed).
    Stage(StageArgs),

    /// Print the job specification that would be submitted.
    Render(RenderArgs),

    /// List stages, their dependencies and the accepted arguments.
    Describe(DescribeArgs),
}

/// Stage arguments shared by every command that runs stages.
#[derive(Parser, Debug, Clone)]
pub struct ArgumentOptions {
    /// Stage argument as KEY=VALUE. May be repeated; later values win.
    #[arg(short = 'a', long = "arg", value_name = "KEY=VALUE")]
    pub args: Vec<String>,

    /// Read declared argument keys from the process environment first.
    #[arg(long)]
    pub env: bool,
}

/// Arguments for `seed-forge run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Pipeline variant (direct or with-readiness). Defaults to SEED_FORGE_VARIANT or with-readiness.
    #[arg(long)]
    pub variant: Option<PipelineVariant>,

    #[command(flatten)]
    pub arguments: ArgumentOptions,
}

/// Arguments for `seed-forge stage`.
#[derive(Parser, Debug)]
pub struct StageArgs {
    /// Stage to run: deploy, wait or seed.
    pub stage: Stage,

    #[command(flatten)]
    pub arguments: ArgumentOptions,
}

/// Arguments for `seed-forge render`.
#[derive(Parser, Debug)]
pub struct RenderArgs {
    /// Print the Nomad wire document instead of the job model.
    #[arg(long)]
    pub nomad: bool,

    #[command(flatten)]
    pub arguments: ArgumentOptions,
}

/// Arguments for `seed-forge describe`.
#[derive(Parser, Debug)]
pub struct DescribeArgs {
    /// Pipeline variant to describe. Defaults to SEED_FORGE_VARIANT or with-readiness.
    #[arg(long)]
    pub variant: Option<PipelineVariant>,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let config = PipelineConfig::from_env().context("Invalid SEED_FORGE_* configuration")?;

    match cli.command {
        Commands::Run(args) => run_pipeline_command(config, args, cli.json).await,
        Commands::Stage(args) => run_stage_command(config, args, cli.json).await,
        Commands::Render(args) => run_render_command(&config, args),
        Commands::Describe(args) => run_describe_command(&config, args, cli.json),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn run_pipeline_command(
    config: PipelineConfig,
    args: RunArgs,
    json: bool,
) -> anyhow::Result<()> {
    let variant = args.variant.unwrap_or(config.variant);
    let arguments = collect_arguments(&args.arguments)?;
    let runner = StageRunner::new(config).with_cancellation(shutdown_token());

    let report = runner.run_pipeline(variant, &arguments).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for stage in &report.stages {
            println!("✓ {} ({} ms)", stage.stage, stage.duration_ms);
        }
        println!(
            "Pipeline '{}' completed in {} ms",
            report.variant, report.duration_ms
        );
    }
    Ok(())
}

async fn run_stage_command(
    config: PipelineConfig,
    args: StageArgs,
    json: bool,
) -> anyhow::Result<()> {
    let arguments = collect_arguments(&args.arguments)?;
    let runner = StageRunner::new(config).with_cancellation(shutdown_token());

    let outcome = runner.run_stage(args.stage, &arguments).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("✓ {}", args.stage);
    }
    Ok(())
}

fn run_render_command(config: &PipelineConfig, args: RenderArgs) -> anyhow::Result<()> {
    let arguments = collect_arguments(&args.arguments)?;
    let job = build_job_spec(&ArgumentMap::resolve(&arguments), &config.deploy);
    job.validate()?;

    let rendered = if args.nomad {
        serde_json::to_string_pretty(&RegisterJobRequest {
            job: NomadJob::from(&job),
        })?
    } else {
        serde_json::to_string_pretty(&job)?
    };
    println!("{rendered}");
    Ok(())
}

#[derive(Debug, Serialize)]
struct StageDescription {
    stage: Stage,
    title: &'static str,
    description: &'static str,
    depends_on: Vec<&'static str>,
}

fn run_describe_command(
    config: &PipelineConfig,
    args: DescribeArgs,
    json: bool,
) -> anyhow::Result<()> {
    let variant = args.variant.unwrap_or(config.variant);
    let stages: Vec<StageDescription> = variant
        .stages()
        .iter()
        .map(|stage| StageDescription {
            stage: *stage,
            title: stage.title(),
            description: stage.description(),
            depends_on: variant.depends_on(*stage).iter().map(Stage::title).collect(),
        })
        .collect();

    if json {
        let value = serde_json::json!({
            "variant": variant,
            "stages": stages,
            "arguments": declared_arguments(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Pipeline '{variant}':");
    for stage in &stages {
        let deps = if stage.depends_on.is_empty() {
            String::from("-")
        } else {
            stage.depends_on.join(", ")
        };
        println!(
            "  {:<20} {:<45} depends on: {}",
            stage.title, stage.description, deps
        );
    }
    println!("Arguments:");
    for decl in declared_arguments() {
        println!("  {:<12} [{}] {}", decl.key, decl.kind, decl.description);
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Collects stage arguments: environment first (if requested), then `-a` pairs.
fn collect_arguments(options: &ArgumentOptions) -> anyhow::Result<Vec<Argument>> {
    let mut arguments = Vec::new();

    if options.env {
        for decl in declared_arguments() {
            if let Ok(value) = std::env::var(decl.key) {
                arguments.push(Argument::new(decl.key, value));
            }
        }
    }

    for raw in &options.args {
        arguments.push(Argument::parse(raw)?);
    }

    let known: Vec<&str> = declared_arguments().iter().map(|d| d.key).collect();
    for arg in &arguments {
        if !known.contains(&arg.key.as_str()) {
            warn!(key = %arg.key, "Ignoring unrecognised argument");
        }
    }
    Ok(arguments)
}

/// Token cancelled on Ctrl-C so in-flight stages stop cleanly.
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling pipeline");
            trigger.cancel();
        }
    });
    token
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_command() {
        let cli = Cli::try_parse_from([
            "seed-forge",
            "run",
            "--variant",
            "direct",
            "-a",
            "MYAPP_HOST=127.0.0.1:3306",
            "--arg",
            "MYAPP_USER=root",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.variant, Some(PipelineVariant::Direct));
                assert_eq!(args.arguments.args.len(), 2);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_parse_stage_command() {
        let cli = Cli::try_parse_from(["seed-forge", "stage", "wait"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Stage(StageArgs {
                stage: Stage::WaitForDatabase,
                ..
            })
        ));
        assert!(Cli::try_parse_from(["seed-forge", "stage", "rollback"]).is_err());
    }

    #[test]
    fn test_collect_arguments_later_values_win() {
        let options = ArgumentOptions {
            args: vec![
                "MYAPP_USER=root".to_string(),
                "MYAPP_USER=admin".to_string(),
            ],
            env: false,
        };
        let arguments = collect_arguments(&options).unwrap();
        let map = ArgumentMap::resolve(&arguments);
        assert_eq!(map.get("MYAPP_USER"), Some("admin"));
    }

    #[test]
    fn test_collect_arguments_rejects_malformed_pair() {
        let options = ArgumentOptions {
            args: vec!["MYAPP_USER".to_string()],
            env: false,
        };
        assert!(collect_arguments(&options).is_err());
    }
}
