//! Cluster collaborators and the snapshot types they hand back.
//!
//! The checker only talks to the cluster through the traits in this module.
//! [`KubeCluster`] implements all of them against a live API server; tests
//! provide in-memory fakes.

mod client;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::{AsyncBufRead, AsyncBufReadExt, StreamExt};
use serde::Serialize;

use crate::config::WorkloadRef;
use crate::error::ClusterError;

pub use self::client::{format_label_selector, is_available, KubeCluster};

/// A container log, one line per item. Dropping it closes the stream.
pub type LogLines = BoxStream<'static, std::io::Result<String>>;

/// Split a raw log body into lines.
///
/// Lines are split on `\n` with a trailing `\r` removed. Bytes that are not
/// valid UTF-8 are replaced, never reported as errors; only I/O failures of
/// the underlying reader surface as `Err` items.
pub fn log_lines<R>(reader: R) -> LogLines
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    stream::unfold(reader, |mut reader| async move {
        let mut buf = Vec::new();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => None,
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                    if buf.last() == Some(&b'\r') {
                        buf.pop();
                    }
                }
                Some((Ok(String::from_utf8_lossy(&buf).into_owned()), reader))
            }
            Err(e) => Some((Err(e), reader)),
        }
    })
    .boxed()
}

/// Lifecycle state of a single container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ContainerState {
    Running,
    Waiting {
        reason: String,
        message: String,
    },
    Terminated {
        reason: String,
        message: String,
        #[serde(rename = "exitCode")]
        exit_code: i32,
    },
    Unknown,
}

/// Point-in-time view of one container, captured at diagnosis time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerSnapshot {
    pub name: String,
    pub ready: bool,
    pub state: ContainerState,
}

/// Point-in-time view of one pod backing the workload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PodSnapshot {
    pub name: String,
    /// Pod phase ("Pending", "Running", ...), if reported.
    pub phase: Option<String>,
    /// Names from `spec.imagePullSecrets`, in declaration order.
    pub image_pull_secrets: Vec<String>,
    pub containers: Vec<ContainerSnapshot>,
    /// Pod conditions that are not `True`, formatted for display.
    pub unmet_conditions: Vec<String>,
}

/// What the checker needs to know about the Deployment itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadDescriptor {
    pub workload: WorkloadRef,
    /// Label selector in list-query form, e.g. `app=api,tier in (web)`.
    pub selector: String,
    pub replicas: Option<i32>,
}

/// Fetches the workload and the pods it selects.
#[async_trait]
pub trait WorkloadSource: Send + Sync {
    async fn get_workload(&self, workload: &WorkloadRef)
        -> Result<WorkloadDescriptor, ClusterError>;

    async fn list_pods(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<PodSnapshot>, ClusterError>;
}

/// Answers whether the workload is currently available.
#[async_trait]
pub trait DeploymentStatusChecker: Send + Sync {
    /// Fresh readiness query; nothing is cached between calls.
    async fn is_available(&self, workload: &WorkloadRef) -> Result<bool, ClusterError>;
}

/// Looks up secrets by name.
#[async_trait]
pub trait SecretLookup: Send + Sync {
    /// Succeeds if the secret exists. Its contents are never returned.
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;
}

/// Opens container log streams.
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn stream_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
    ) -> Result<LogLines, ClusterError>;
}

#[cfg(test)]
mod tests {
    use futures::io::Cursor;

    use super::*;

    async fn collect(bytes: &'static [u8]) -> Vec<String> {
        log_lines(Cursor::new(bytes))
            .map(|line| line.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_log_lines_split_and_trim() {
        let lines = collect(b"first\r\nsecond\n\nlast without newline").await;
        assert_eq!(lines, ["first", "second", "", "last without newline"]);
    }

    #[tokio::test]
    async fn test_log_lines_replace_invalid_utf8() {
        let lines = collect(b"error: \xff\xfe bad byte\n\xff\nok\n").await;
        assert_eq!(lines, ["error: \u{fffd}\u{fffd} bad byte", "\u{fffd}", "ok"]);
    }

    #[tokio::test]
    async fn test_log_lines_empty_body() {
        assert!(collect(b"").await.is_empty());
    }
}
