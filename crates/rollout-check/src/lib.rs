//! Rollout verification with automatic failure diagnosis.
//!
//! Polls a Deployment until its `Available` condition turns `True` or a retry
//! budget runs out. On failure, every container of the workload's pods is
//! classified and explained: known waiting reasons get a canned explanation,
//! everything else gets error lines pulled from its log.
//!
//! # Example
//!
//! ```ignore
//! use rollout_check::{check_rollout, KubeCluster, RetryBudget, WorkloadRef};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cluster = KubeCluster::connect(None, None).await?;
//!     let workload = WorkloadRef::new("payments", "api")?;
//!     let outcome = check_rollout(&cluster, &workload, RetryBudget::default(), true).await?;
//!     println!("available: {}", outcome.is_success());
//!     Ok(())
//! }
//! ```

// Allow product names without backticks in doc comments
#![allow(clippy::doc_markdown)]

pub mod classify;
pub mod cluster;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod poller;
pub mod report;
pub mod scanner;
pub mod secrets;
pub mod ui;

use anyhow::{Context, Result};
use tracing::info;

// Re-export commonly used types at the crate root
pub use classify::{classify, Classification, KnownReason};
pub use cluster::{
    DeploymentStatusChecker, KubeCluster, LogSource, PodSnapshot, SecretLookup, WorkloadSource,
};
pub use config::{RetryBudget, WorkloadRef};
pub use diagnostics::{Diagnosis, PodDiagnostics};
pub use error::{ClusterError, ConfigError};
pub use poller::{Outcome, RolloutPoller};
pub use report::RolloutReport;
pub use scanner::EvidenceSet;

/// Check one rollout end to end.
///
/// Fetches the workload and its pods once, then polls readiness within
/// `budget`. Setup failures and readiness query failures are returned as
/// errors; a rollout that never becomes available is an `Outcome::Failure`.
///
/// # Errors
///
/// Returns an error if the workload, its pods, or its readiness cannot be
/// fetched.
pub async fn check_rollout<C>(
    cluster: &C,
    workload: &WorkloadRef,
    budget: RetryBudget,
    progress: bool,
) -> Result<Outcome>
where
    C: WorkloadSource + DeploymentStatusChecker + SecretLookup + LogSource + ?Sized,
{
    let descriptor = cluster
        .get_workload(workload)
        .await
        .with_context(|| format!("Error getting deployment {workload}"))?;

    info!(
        %workload,
        selector = %descriptor.selector,
        replicas = ?descriptor.replicas,
        "Fetched deployment"
    );

    let pods = cluster
        .list_pods(&workload.namespace, &descriptor.selector)
        .await
        .with_context(|| format!("Error getting pods for {workload}"))?;

    info!(pods = pods.len(), "Fetched workload pods");

    RolloutPoller::new(cluster, budget)
        .with_progress(progress)
        .run(workload, &pods)
        .await
        .with_context(|| format!("Error checking readiness of {workload}"))
}
