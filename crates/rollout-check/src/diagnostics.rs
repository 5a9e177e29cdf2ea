//! Per-pod failure diagnostics.
//!
//! Walks every container of every pod, classifies it, and turns the result
//! into an explanation. Lookup failures along the way become part of the
//! explanation; diagnosing never fails as a whole.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::classify::{classify, Classification, ConfigErrorHint, KnownReason};
use crate::cluster::{ContainerSnapshot, ContainerState, LogSource, PodSnapshot, SecretLookup};
use crate::scanner::{self, EvidenceSet};
use crate::secrets::{self, SecretPresence};

/// Explanation for a single container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// Running and ready.
    Running,
    /// Image pull failed and the pull secret could not be read.
    PullSecretMissing {
        reason: KnownReason,
        secret: String,
        namespace: String,
        cause: String,
    },
    /// Image pull failed although the pull secret exists.
    PullSecretPresent {
        reason: KnownReason,
        secret: String,
        namespace: String,
    },
    /// Image pull failed and the pod declares no pull secret at all.
    PullSecretNotConfigured { reason: KnownReason },
    /// Container config could not be built.
    ConfigReference { hint: ConfigErrorHint },
    /// Error lines found in the container log.
    LogEvidence { evidence: EvidenceSet },
    /// The container log could not be opened.
    LogsUnavailable { cause: String },
}

impl Finding {
    /// Whether the container needs attention.
    #[must_use]
    pub fn is_problem(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "Container is in running state"),
            Self::PullSecretMissing {
                reason,
                secret,
                namespace,
                cause,
            } => write!(
                f,
                "Reason for {reason}: error getting secret {secret} in namespace {namespace}: \
                 {cause}. Please add it"
            ),
            Self::PullSecretPresent {
                reason,
                secret,
                namespace,
            } => write!(
                f,
                "Reason for {reason}: secret {secret} is present in namespace {namespace}, \
                 this error could be due to expired or wrong values in the secret"
            ),
            Self::PullSecretNotConfigured { reason } => write!(
                f,
                "Reason for {reason}: configuration error, the pod has no imagePullSecrets \
                 configured. Add an image pull secret reference to the pod spec"
            ),
            Self::ConfigReference {
                hint: ConfigErrorHint::SecretReference,
            } => write!(
                f,
                "Reason for CreateContainerConfigError: Check if the env block in deployment \
                 yaml has correct \"secretKeyRef\", also see the \"SecretStore\" if the secret \
                 is from vault"
            ),
            Self::ConfigReference {
                hint: ConfigErrorHint::ConfigMapReference,
            } => write!(
                f,
                "Reason for CreateContainerConfigError: Check if the env block in deployment \
                 yaml has correct \"configMapKeyRef\" to the volume mount"
            ),
            Self::LogEvidence { evidence } if evidence.is_empty() => {
                write!(f, "Reason for Error: no qualifying lines found in the container log")
            }
            Self::LogEvidence { evidence } => {
                writeln!(f, "Reason for Error:")?;
                for line in evidence.lines() {
                    writeln!(f, "  {line}")?;
                }
                Ok(())
            }
            Self::LogsUnavailable { cause } => {
                write!(f, "Reason for Error: could not read container logs: {cause}")
            }
        }
    }
}

/// Diagnosis of one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerReport {
    pub container: String,
    pub state: ContainerState,
    pub finding: Finding,
}

impl ContainerReport {
    /// Pretty JSON rendering of the container state.
    #[must_use]
    pub fn state_detail(&self) -> String {
        serde_json::to_string_pretty(&self.state).unwrap_or_else(|_| format!("{:?}", self.state))
    }
}

/// Diagnosis of one pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodReport {
    pub pod: String,
    pub phase: Option<String>,
    pub containers: Vec<ContainerReport>,
    /// Pod-level notes, e.g. unmet conditions when no container reported.
    pub notes: Vec<String>,
}

/// Diagnosis of every pod in the workload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnosis {
    pub pods: Vec<PodReport>,
}

impl Diagnosis {
    /// Number of containers that need attention.
    #[must_use]
    pub fn problem_count(&self) -> usize {
        self.pods
            .iter()
            .flat_map(|p| &p.containers)
            .filter(|c| c.finding.is_problem())
            .count()
    }
}

/// Builds a [`Diagnosis`] for pods in one namespace.
pub struct PodDiagnostics<'a, C: ?Sized> {
    cluster: &'a C,
    namespace: &'a str,
}

impl<'a, C> PodDiagnostics<'a, C>
where
    C: SecretLookup + LogSource + ?Sized,
{
    pub fn new(cluster: &'a C, namespace: &'a str) -> Self {
        Self { cluster, namespace }
    }

    /// Diagnose every container of every pod, in order.
    pub async fn diagnose(&self, pods: &[PodSnapshot]) -> Diagnosis {
        info!(pods = pods.len(), namespace = self.namespace, "Diagnosing pods");

        let mut reports = Vec::with_capacity(pods.len());
        for pod in pods {
            reports.push(self.diagnose_pod(pod).await);
        }

        Diagnosis { pods: reports }
    }

    async fn diagnose_pod(&self, pod: &PodSnapshot) -> PodReport {
        let mut containers = Vec::with_capacity(pod.containers.len());
        for container in &pod.containers {
            containers.push(ContainerReport {
                container: container.name.clone(),
                state: container.state.clone(),
                finding: self.diagnose_container(pod, container).await,
            });
        }

        let mut notes = Vec::new();
        if pod.containers.is_empty() {
            notes.push("No container statuses reported".to_string());
            notes.extend(pod.unmet_conditions.iter().cloned());
        }

        PodReport {
            pod: pod.name.clone(),
            phase: pod.phase.clone(),
            containers,
            notes,
        }
    }

    async fn diagnose_container(
        &self,
        pod: &PodSnapshot,
        container: &ContainerSnapshot,
    ) -> Finding {
        match classify(container) {
            Classification::HealthyRunning => Finding::Running,
            Classification::KnownReason { reason, .. } if reason.is_image_pull() => {
                self.explain_image_pull(pod, reason).await
            }
            Classification::KnownReason { message, .. } => Finding::ConfigReference {
                hint: ConfigErrorHint::from_message(&message),
            },
            Classification::RequiresLogScan => self.scan_logs(pod, container).await,
        }
    }

    async fn explain_image_pull(&self, pod: &PodSnapshot, reason: KnownReason) -> Finding {
        let Some(secret) = pod.image_pull_secrets.first() else {
            warn!(pod = %pod.name, %reason, "Image pull failed but pod has no imagePullSecrets");
            return Finding::PullSecretNotConfigured { reason };
        };

        match secrets::probe(self.cluster, secret, self.namespace).await {
            SecretPresence::Found => Finding::PullSecretPresent {
                reason,
                secret: secret.clone(),
                namespace: self.namespace.to_string(),
            },
            SecretPresence::NotFound { cause } => Finding::PullSecretMissing {
                reason,
                secret: secret.clone(),
                namespace: self.namespace.to_string(),
                cause,
            },
        }
    }

    async fn scan_logs(&self, pod: &PodSnapshot, container: &ContainerSnapshot) -> Finding {
        debug!(pod = %pod.name, container = %container.name, "Scanning container log");

        match self
            .cluster
            .stream_logs(self.namespace, &pod.name, &container.name)
            .await
        {
            Ok(lines) => Finding::LogEvidence {
                evidence: scanner::scan(lines).await,
            },
            Err(e) => {
                warn!(
                    pod = %pod.name,
                    container = %container.name,
                    error = %e,
                    "Failed to open log stream"
                );
                Finding::LogsUnavailable {
                    cause: e.to_string(),
                }
            }
        }
    }
}
