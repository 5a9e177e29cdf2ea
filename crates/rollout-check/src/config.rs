//! Run configuration: the workload under check and its retry budget.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::error::ConfigError;

/// Default number of readiness checks before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 6;

/// Default pause between readiness checks, in seconds.
pub const DEFAULT_INTERVAL_SECS: u64 = 10;

/// The Deployment being checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadRef {
    pub namespace: String,
    pub name: String,
}

impl WorkloadRef {
    /// Create a workload reference, rejecting empty parts.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Result<Self, ConfigError> {
        let namespace = namespace.into();
        let name = name.into();

        if namespace.trim().is_empty() {
            return Err(ConfigError::Empty("namespace"));
        }
        if name.trim().is_empty() {
            return Err(ConfigError::Empty("workload name"));
        }

        Ok(Self { namespace, name })
    }
}

impl fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// How many readiness checks to make and how long to wait between them.
///
/// Both values are fixed at construction. The poller owns its own countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    max_attempts: u32,
    interval: Duration,
}

impl RetryBudget {
    /// Create a budget. At least one attempt is required.
    pub fn new(max_attempts: u32, interval: Duration) -> Result<Self, ConfigError> {
        if max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts(max_attempts));
        }
        Ok(Self {
            max_attempts,
            interval,
        })
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Longest time the poller can spend sleeping, or `None` if that does
    /// not fit in a `Duration`.
    #[must_use]
    pub fn max_wait(&self) -> Option<Duration> {
        self.interval.checked_mul(self.max_attempts - 1)
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
        }
    }
}

/// Where cluster credentials come from, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KubeconfigSource {
    /// Passed with `--kubeconfig`.
    Explicit(PathBuf),
    /// Taken from the `KUBECONFIG` environment variable.
    Env(String),
    /// The default `~/.kube/config`.
    Default(PathBuf),
    /// No kubeconfig file; in-cluster service account or inference.
    Inferred,
}

impl KubeconfigSource {
    /// Work out which kubeconfig the client will load.
    #[must_use]
    pub fn resolve(explicit: Option<&Path>) -> Self {
        if let Some(path) = explicit {
            return Self::Explicit(path.to_path_buf());
        }
        if let Ok(value) = std::env::var("KUBECONFIG") {
            if !value.is_empty() {
                return Self::Env(value);
            }
        }
        match default_kubeconfig_path() {
            Some(path) if path.exists() => Self::Default(path),
            _ => Self::Inferred,
        }
    }
}

impl fmt::Display for KubeconfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit(path) | Self::Default(path) => write!(f, "{}", path.display()),
            Self::Env(value) => write!(f, "{value} (from KUBECONFIG)"),
            Self::Inferred => write!(f, "in-cluster / inferred configuration"),
        }
    }
}

/// Get the default kubeconfig path (~/.kube/config).
#[must_use]
pub fn default_kubeconfig_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".kube").join("config"))
}
