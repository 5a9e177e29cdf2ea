//! Secret presence probe for image pull diagnostics.

use serde::Serialize;
use tracing::debug;

use crate::cluster::SecretLookup;

/// Whether a referenced secret could be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SecretPresence {
    Found,
    /// The lookup failed; `cause` is the error text, whether the secret is
    /// absent or the API call itself failed.
    NotFound { cause: String },
}

/// Check whether `secret_name` exists in `namespace`. Never fails.
pub async fn probe<S>(lookup: &S, secret_name: &str, namespace: &str) -> SecretPresence
where
    S: SecretLookup + ?Sized,
{
    match lookup.get_secret(namespace, secret_name).await {
        Ok(()) => SecretPresence::Found,
        Err(e) => {
            debug!(secret = secret_name, namespace, error = %e, "Secret lookup failed");
            SecretPresence::NotFound {
                cause: e.to_string(),
            }
        }
    }
}
