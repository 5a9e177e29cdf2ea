//! Bounded readiness polling.
//!
//! The poller checks the Deployment's `Available` condition up to
//! `max_attempts` times, sleeping `interval` between attempts. It stops on
//! the first success. When the last attempt also fails, it diagnoses the pods
//! before reporting failure.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cluster::{DeploymentStatusChecker, LogSource, PodSnapshot, SecretLookup};
use crate::config::{RetryBudget, WorkloadRef};
use crate::diagnostics::{Diagnosis, PodDiagnostics};
use crate::error::ClusterError;
use crate::ui;

/// Result of a polling run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The workload became available.
    Success { attempts: u32, waits: u32 },
    /// The budget ran out; carries the pod diagnosis.
    Failure {
        attempts: u32,
        waits: u32,
        diagnosis: Diagnosis,
    },
}

impl Outcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Number of readiness queries made.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. } | Self::Failure { attempts, .. } => *attempts,
        }
    }

    /// Number of sleeps between attempts.
    #[must_use]
    pub fn waits(&self) -> u32 {
        match self {
            Self::Success { waits, .. } | Self::Failure { waits, .. } => *waits,
        }
    }
}

/// Drives the readiness loop for one workload.
pub struct RolloutPoller<'a, C: ?Sized> {
    cluster: &'a C,
    budget: RetryBudget,
    progress: bool,
}

impl<'a, C> RolloutPoller<'a, C>
where
    C: DeploymentStatusChecker + SecretLookup + LogSource + ?Sized,
{
    pub fn new(cluster: &'a C, budget: RetryBudget) -> Self {
        Self {
            cluster,
            budget,
            progress: true,
        }
    }

    /// Toggle the per-attempt console notices. Tracing output is unaffected.
    #[must_use]
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Poll until the workload is available or the budget is spent.
    ///
    /// `pods` is the pod set fetched before polling began. It is diagnosed
    /// as-is on failure and may lag the final readiness query.
    ///
    /// # Errors
    ///
    /// Returns an error if a readiness query fails.
    pub async fn run(
        &self,
        workload: &WorkloadRef,
        pods: &[PodSnapshot],
    ) -> Result<Outcome, ClusterError> {
        let interval = self.budget.interval();
        let mut remaining = self.budget.max_attempts();
        let mut attempts = 0;
        let mut waits = 0;

        loop {
            attempts += 1;
            debug!(attempt = attempts, remaining, %workload, "Checking rollout readiness");

            if self.cluster.is_available(workload).await? {
                info!(attempts, %workload, "Deployment is available");
                return Ok(Outcome::Success { attempts, waits });
            }

            if remaining == 1 {
                warn!(attempts, %workload, "Deployment is not available, diagnosing pods");
                if self.progress {
                    ui::print_error("Deployment is not up yet, checking pod logs");
                }

                let diagnosis = PodDiagnostics::new(self.cluster, &workload.namespace)
                    .diagnose(pods)
                    .await;

                return Ok(Outcome::Failure {
                    attempts,
                    waits,
                    diagnosis,
                });
            }

            if self.progress {
                ui::print_warning(&format!(
                    "Deployment is not up yet, trying again in {}s... ({} attempts left)",
                    interval.as_secs_f64(),
                    remaining - 1
                ));
            }

            tokio::time::sleep(interval).await;
            waits += 1;
            remaining -= 1;
        }
    }
}
