//! Container state classification.
//!
//! Maps a [`ContainerSnapshot`] to exactly one [`Classification`]. Rules are
//! checked in order and the first match wins.

use std::fmt;

use serde::Serialize;

use crate::cluster::{ContainerSnapshot, ContainerState};

/// Waiting reasons that have a canned explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum KnownReason {
    ImagePullBackOff,
    ErrImagePull,
    CreateContainerConfigError,
}

impl KnownReason {
    /// Parse a waiting reason code. Unknown codes return `None`.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "ImagePullBackOff" => Some(Self::ImagePullBackOff),
            "ErrImagePull" => Some(Self::ErrImagePull),
            "CreateContainerConfigError" => Some(Self::CreateContainerConfigError),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImagePullBackOff => "ImagePullBackOff",
            Self::ErrImagePull => "ErrImagePull",
            Self::CreateContainerConfigError => "CreateContainerConfigError",
        }
    }

    /// The runtime could not fetch the image.
    #[must_use]
    pub fn is_image_pull(&self) -> bool {
        matches!(self, Self::ImagePullBackOff | Self::ErrImagePull)
    }
}

impl fmt::Display for KnownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Running and ready; nothing to explain.
    HealthyRunning,
    /// Waiting with a reason that has a canned explanation.
    KnownReason { reason: KnownReason, message: String },
    /// Anything else; the container log has to be searched.
    RequiresLogScan,
}

/// Classify a container snapshot.
#[must_use]
pub fn classify(snapshot: &ContainerSnapshot) -> Classification {
    match &snapshot.state {
        ContainerState::Running if snapshot.ready => Classification::HealthyRunning,
        ContainerState::Waiting { reason, message } => match KnownReason::from_code(reason) {
            Some(reason) => Classification::KnownReason {
                reason,
                message: message.clone(),
            },
            None => Classification::RequiresLogScan,
        },
        _ => Classification::RequiresLogScan,
    }
}

/// Which reference to point at for a `CreateContainerConfigError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigErrorHint {
    SecretReference,
    ConfigMapReference,
}

impl ConfigErrorHint {
    /// Case-sensitive: only a lowercase "secret" in the kubelet message counts.
    #[must_use]
    pub fn from_message(message: &str) -> Self {
        if message.contains("secret") {
            Self::SecretReference
        } else {
            Self::ConfigMapReference
        }
    }
}
