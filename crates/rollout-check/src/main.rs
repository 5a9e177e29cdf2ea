//! Rollout check CLI.
//!
//! Waits for a Deployment to become available and, if it never does,
//! explains why its pods are failing.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::builder::NonEmptyStringValueParser;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rollout_check::config::{KubeconfigSource, DEFAULT_INTERVAL_SECS, DEFAULT_MAX_ATTEMPTS};
use rollout_check::{check_rollout, ui, KubeCluster, RetryBudget, RolloutReport, WorkloadRef};

/// Verify that a Deployment rollout became available.
#[derive(Parser)]
#[command(
    name = "rollout-check",
    version,
    about = "Post-deploy rollout verification",
    long_about = "Poll a Deployment until its Available condition is True.\n\n\
                  If the retry budget runs out, every container of the workload's\n\
                  pods is classified and the likely failure cause is reported:\n\
                  image pull secrets, config references, or error lines from the\n\
                  container log."
)]
struct Cli {
    /// Namespace of the Deployment.
    #[arg(value_parser = NonEmptyStringValueParser::new())]
    namespace: String,

    /// Name of the Deployment.
    #[arg(value_parser = NonEmptyStringValueParser::new())]
    name: String,

    /// Path to kubeconfig file. Defaults to the usual kube-rs inference.
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use.
    #[arg(long)]
    context: Option<String>,

    /// Number of readiness checks before giving up.
    #[arg(
        long,
        env = "ROLLOUT_CHECK_ATTEMPTS",
        default_value_t = DEFAULT_MAX_ATTEMPTS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    attempts: u32,

    /// Seconds to wait between readiness checks.
    #[arg(long, env = "ROLLOUT_CHECK_INTERVAL_SECS", default_value_t = DEFAULT_INTERVAL_SECS)]
    interval_secs: u64,

    /// Output the report as JSON.
    #[arg(long, default_value = "false")]
    json: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbosity flag when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("info,rollout_check=debug,kube=info")
        } else {
            EnvFilter::new("warn,rollout_check=info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let workload = WorkloadRef::new(cli.namespace, cli.name)?;
    let budget = RetryBudget::new(cli.attempts, Duration::from_secs(cli.interval_secs))?;
    let progress = !cli.json;

    if progress {
        let source = KubeconfigSource::resolve(cli.kubeconfig.as_deref());
        ui::print_info(&format!("Using kubeconfig: {source}"));
        let max_wait = budget
            .max_wait()
            .map_or_else(|| "unbounded".to_string(), |d| format!("{}s", d.as_secs()));
        ui::print_info(&format!(
            "Checking {workload}: up to {} attempts, {}s apart ({max_wait} of waiting at most)",
            budget.max_attempts(),
            budget.interval().as_secs()
        ));
    }

    let cluster = KubeCluster::connect(cli.kubeconfig.as_deref(), cli.context.as_deref())
        .await
        .context("Error creating Kubernetes client")?;

    let outcome = check_rollout(&cluster, &workload, budget, progress).await?;
    let report = RolloutReport::new(workload, budget, outcome);

    if cli.json {
        report.print_json()?;
    } else {
        report.print();
    }

    if report.outcome.is_success() {
        Ok(())
    } else {
        anyhow::bail!("{}", report.summary());
    }
}
