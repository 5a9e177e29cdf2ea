//! Error types for rollout checks.

use thiserror::Error;

/// Errors returned by the cluster collaborators.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Credentials could not be resolved or the client could not be built.
    #[error("Failed to establish cluster session: {0}")]
    Session(String),

    /// The requested object does not exist.
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    /// The Kubernetes API rejected the request or could not be reached.
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// The workload selector cannot be turned into a list selector.
    #[error("Invalid label selector: {0}")]
    InvalidSelector(String),
}

impl ClusterError {
    /// Map a kube error to `NotFound` when the API answered 404.
    pub(crate) fn from_kube(
        err: kube::Error,
        kind: &'static str,
        namespace: &str,
        name: &str,
    ) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 404 => Self::NotFound {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            other => Self::Api(other),
        }
    }
}

/// Invalid run configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The retry budget must allow at least one attempt.
    #[error("max attempts must be at least 1, got {0}")]
    ZeroAttempts(u32),

    /// Namespace or workload name was empty.
    #[error("{0} must not be empty")]
    Empty(&'static str),
}
