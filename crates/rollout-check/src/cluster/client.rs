//! Live cluster access through kube-rs.

use std::path::Path;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    ContainerState as K8sContainerState, ContainerStatus, Pod, Secret,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::{Api, ListParams, LogParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::debug;

use super::{
    log_lines, ContainerSnapshot, ContainerState, DeploymentStatusChecker, LogLines, LogSource,
    PodSnapshot, SecretLookup, WorkloadDescriptor, WorkloadSource,
};
use crate::config::WorkloadRef;
use crate::error::ClusterError;

/// Kubernetes API client implementing every cluster collaborator.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    /// Resolve credentials and build a client.
    ///
    /// With no explicit kubeconfig this follows the usual inference order:
    /// `KUBECONFIG`, `~/.kube/config`, then the in-cluster service account.
    pub async fn connect(
        kubeconfig: Option<&Path>,
        context: Option<&str>,
    ) -> Result<Self, ClusterError> {
        let options = KubeConfigOptions {
            context: context.map(ToString::to_string),
            ..Default::default()
        };

        let config = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    ClusterError::Session(format!(
                        "failed to read kubeconfig from {}: {e}",
                        path.display()
                    ))
                })?;
                Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .map_err(|e| ClusterError::Session(e.to_string()))?
            }
            None if context.is_some() => Config::from_kubeconfig(&options)
                .await
                .map_err(|e| ClusterError::Session(e.to_string()))?,
            None => Config::infer()
                .await
                .map_err(|e| ClusterError::Session(e.to_string()))?,
        };

        debug!(cluster_url = %config.cluster_url, "Resolved cluster configuration");

        let client = Client::try_from(config).map_err(|e| ClusterError::Session(e.to_string()))?;
        Ok(Self { client })
    }

    async fn fetch_deployment(&self, workload: &WorkloadRef) -> Result<Deployment, ClusterError> {
        let deployments: Api<Deployment> =
            Api::namespaced(self.client.clone(), &workload.namespace);
        deployments
            .get(&workload.name)
            .await
            .map_err(|e| {
                ClusterError::from_kube(e, "Deployment", &workload.namespace, &workload.name)
            })
    }
}

#[async_trait]
impl WorkloadSource for KubeCluster {
    async fn get_workload(
        &self,
        workload: &WorkloadRef,
    ) -> Result<WorkloadDescriptor, ClusterError> {
        let deployment = self.fetch_deployment(workload).await?;
        let spec = deployment.spec.as_ref().ok_or_else(|| {
            ClusterError::InvalidSelector(format!("Deployment {workload} has no spec"))
        })?;

        Ok(WorkloadDescriptor {
            workload: workload.clone(),
            selector: format_label_selector(&spec.selector)?,
            replicas: spec.replicas,
        })
    }

    async fn list_pods(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<PodSnapshot>, ClusterError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = pods.list(&ListParams::default().labels(selector)).await?;

        debug!(count = list.items.len(), selector, "Listed workload pods");

        Ok(list.items.iter().map(pod_snapshot).collect())
    }
}

#[async_trait]
impl DeploymentStatusChecker for KubeCluster {
    async fn is_available(&self, workload: &WorkloadRef) -> Result<bool, ClusterError> {
        let deployment = self.fetch_deployment(workload).await?;
        Ok(is_available(&deployment))
    }
}

#[async_trait]
impl SecretLookup for KubeCluster {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        secrets
            .get(name)
            .await
            .map(|_| ())
            .map_err(|e| ClusterError::from_kube(e, "Secret", namespace, name))
    }
}

#[async_trait]
impl LogSource for KubeCluster {
    async fn stream_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
    ) -> Result<LogLines, ClusterError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = LogParams {
            container: Some(container.to_string()),
            ..Default::default()
        };

        let reader = pods
            .log_stream(pod, &params)
            .await
            .map_err(|e| ClusterError::from_kube(e, "Pod", namespace, pod))?;

        Ok(log_lines(reader))
    }
}

/// True when the Deployment has an `Available` condition with status `True`.
#[must_use]
pub fn is_available(deployment: &Deployment) -> bool {
    deployment
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Available" && c.status == "True")
        })
}

/// Render a `LabelSelector` as a list selector string.
///
/// Requirements are sorted by key, and set values are sorted, so the output is
/// stable. An empty selector is rejected rather than matching every pod.
pub fn format_label_selector(selector: &LabelSelector) -> Result<String, ClusterError> {
    let mut requirements: Vec<(String, String)> = Vec::new();

    if let Some(labels) = &selector.match_labels {
        for (key, value) in labels {
            requirements.push((key.clone(), format!("{key}={value}")));
        }
    }

    for expr in selector.match_expressions.iter().flatten() {
        let mut values = expr.values.clone().unwrap_or_default();
        values.sort();

        let rendered = match expr.operator.as_str() {
            "In" | "NotIn" if values.is_empty() => {
                return Err(ClusterError::InvalidSelector(format!(
                    "operator {} on key {} needs at least one value",
                    expr.operator, expr.key
                )));
            }
            "In" => format!("{} in ({})", expr.key, values.join(",")),
            "NotIn" => format!("{} notin ({})", expr.key, values.join(",")),
            "Exists" => expr.key.clone(),
            "DoesNotExist" => format!("!{}", expr.key),
            other => {
                return Err(ClusterError::InvalidSelector(format!(
                    "unsupported operator {other} on key {}",
                    expr.key
                )));
            }
        };
        requirements.push((expr.key.clone(), rendered));
    }

    if requirements.is_empty() {
        return Err(ClusterError::InvalidSelector(
            "selector is empty and would match every pod".to_string(),
        ));
    }

    requirements.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(requirements
        .into_iter()
        .map(|(_, rendered)| rendered)
        .collect::<Vec<_>>()
        .join(","))
}

fn pod_snapshot(pod: &Pod) -> PodSnapshot {
    let image_pull_secrets = pod
        .spec
        .as_ref()
        .and_then(|s| s.image_pull_secrets.as_ref())
        .map(|refs| {
            refs.iter()
                .map(|r| r.name.clone())
                .filter(|name| !name.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let status = pod.status.as_ref();

    let containers = status
        .and_then(|s| s.container_statuses.as_ref())
        .map(|statuses| statuses.iter().map(container_snapshot).collect())
        .unwrap_or_default();

    let unmet_conditions = status
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .filter(|c| c.status != "True")
                .map(|c| {
                    let mut line = format!("{}={}", c.type_, c.status);
                    if let Some(reason) = &c.reason {
                        line.push_str(&format!(" ({reason})"));
                    }
                    if let Some(message) = &c.message {
                        line.push_str(&format!(": {message}"));
                    }
                    line
                })
                .collect()
        })
        .unwrap_or_default();

    PodSnapshot {
        name: pod.metadata.name.clone().unwrap_or_default(),
        phase: status.and_then(|s| s.phase.clone()),
        image_pull_secrets,
        containers,
        unmet_conditions,
    }
}

fn container_snapshot(status: &ContainerStatus) -> ContainerSnapshot {
    let state = match status.state.as_ref() {
        Some(K8sContainerState {
            running: Some(_), ..
        }) => ContainerState::Running,
        Some(K8sContainerState {
            waiting: Some(waiting),
            ..
        }) => ContainerState::Waiting {
            reason: waiting.reason.clone().unwrap_or_default(),
            message: waiting.message.clone().unwrap_or_default(),
        },
        Some(K8sContainerState {
            terminated: Some(terminated),
            ..
        }) => ContainerState::Terminated {
            reason: terminated.reason.clone().unwrap_or_default(),
            message: terminated.message.clone().unwrap_or_default(),
            exit_code: terminated.exit_code,
        },
        _ => ContainerState::Unknown,
    };

    ContainerSnapshot {
        name: status.name.clone(),
        ready: status.ready,
        state,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use k8s_openapi::api::apps::v1::{DeploymentCondition, DeploymentStatus};
    use k8s_openapi::api::core::v1::{
        ContainerStateRunning, ContainerStateTerminated, ContainerStateWaiting,
        LocalObjectReference, PodCondition, PodSpec, PodStatus,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelectorRequirement, ObjectMeta};

    use super::*;

    fn deployment_with(conditions: &[(&str, &str)]) -> Deployment {
        Deployment {
            status: Some(DeploymentStatus {
                conditions: Some(
                    conditions
                        .iter()
                        .map(|(type_, status)| DeploymentCondition {
                            type_: (*type_).to_string(),
                            status: (*status).to_string(),
                            ..Default::default()
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_available_condition() {
        assert!(is_available(&deployment_with(&[
            ("Progressing", "True"),
            ("Available", "True"),
        ])));
        assert!(!is_available(&deployment_with(&[("Available", "False")])));
        assert!(!is_available(&deployment_with(&[("Progressing", "True")])));
        assert!(!is_available(&Deployment::default()));
    }

    #[test]
    fn test_format_match_labels() {
        let selector = LabelSelector {
            match_labels: Some(BTreeMap::from([
                ("tier".to_string(), "web".to_string()),
                ("app".to_string(), "api".to_string()),
            ])),
            match_expressions: None,
        };
        assert_eq!(format_label_selector(&selector).unwrap(), "app=api,tier=web");
    }

    #[test]
    fn test_format_match_expressions() {
        let selector = LabelSelector {
            match_labels: Some(BTreeMap::from([("app".to_string(), "api".to_string())])),
            match_expressions: Some(vec![
                LabelSelectorRequirement {
                    key: "env".to_string(),
                    operator: "In".to_string(),
                    values: Some(vec!["prod".to_string(), "canary".to_string()]),
                },
                LabelSelectorRequirement {
                    key: "legacy".to_string(),
                    operator: "DoesNotExist".to_string(),
                    values: None,
                },
                LabelSelectorRequirement {
                    key: "zone".to_string(),
                    operator: "NotIn".to_string(),
                    values: Some(vec!["us-west".to_string()]),
                },
                LabelSelectorRequirement {
                    key: "managed".to_string(),
                    operator: "Exists".to_string(),
                    values: None,
                },
            ]),
        };
        assert_eq!(
            format_label_selector(&selector).unwrap(),
            "app=api,env in (canary,prod),!legacy,managed,zone notin (us-west)"
        );
    }

    #[test]
    fn test_empty_selector_rejected() {
        let err = format_label_selector(&LabelSelector::default()).unwrap_err();
        assert!(matches!(err, ClusterError::InvalidSelector(_)));

        let bad_operator = LabelSelector {
            match_labels: None,
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: "app".to_string(),
                operator: "Like".to_string(),
                values: None,
            }]),
        };
        assert!(format_label_selector(&bad_operator).is_err());
    }

    #[test]
    fn test_pod_snapshot_conversion() {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("api-7d9f-abcde".to_string()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                image_pull_secrets: Some(vec![LocalObjectReference {
                    name: "registry-creds".to_string(),
                }]),
                ..Default::default()
            }),
            status: Some(PodStatus {
                phase: Some("Pending".to_string()),
                conditions: Some(vec![
                    PodCondition {
                        type_: "PodScheduled".to_string(),
                        status: "True".to_string(),
                        ..Default::default()
                    },
                    PodCondition {
                        type_: "Ready".to_string(),
                        status: "False".to_string(),
                        reason: Some("ContainersNotReady".to_string()),
                        message: Some("containers with unready status: [api]".to_string()),
                        ..Default::default()
                    },
                ]),
                container_statuses: Some(vec![
                    ContainerStatus {
                        name: "api".to_string(),
                        ready: false,
                        state: Some(K8sContainerState {
                            waiting: Some(ContainerStateWaiting {
                                reason: Some("ImagePullBackOff".to_string()),
                                message: Some("Back-off pulling image".to_string()),
                            }),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                    ContainerStatus {
                        name: "sidecar".to_string(),
                        ready: true,
                        state: Some(K8sContainerState {
                            running: Some(ContainerStateRunning::default()),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                    ContainerStatus {
                        name: "migrate".to_string(),
                        ready: false,
                        state: Some(K8sContainerState {
                            terminated: Some(ContainerStateTerminated {
                                exit_code: 137,
                                reason: Some("OOMKilled".to_string()),
                                ..Default::default()
                            }),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                    ContainerStatus {
                        name: "empty".to_string(),
                        ..Default::default()
                    },
                ]),
                ..Default::default()
            }),
        };

        let snapshot = pod_snapshot(&pod);
        assert_eq!(snapshot.name, "api-7d9f-abcde");
        assert_eq!(snapshot.phase.as_deref(), Some("Pending"));
        assert_eq!(snapshot.image_pull_secrets, vec!["registry-creds"]);
        assert_eq!(
            snapshot.unmet_conditions,
            vec!["Ready=False (ContainersNotReady): containers with unready status: [api]"]
        );

        assert_eq!(
            snapshot.containers[0].state,
            ContainerState::Waiting {
                reason: "ImagePullBackOff".to_string(),
                message: "Back-off pulling image".to_string(),
            }
        );
        assert_eq!(snapshot.containers[1].state, ContainerState::Running);
        assert!(snapshot.containers[1].ready);
        assert_eq!(
            snapshot.containers[2].state,
            ContainerState::Terminated {
                reason: "OOMKilled".to_string(),
                message: String::new(),
                exit_code: 137,
            }
        );
        assert_eq!(snapshot.containers[3].state, ContainerState::Unknown);
    }
}
