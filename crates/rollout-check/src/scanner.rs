//! Log error scanning.
//!
//! Reads a container log one line at a time and keeps the first distinct
//! lines that look like application errors. Reading stops as soon as the
//! evidence set is full, so large logs are never consumed in full.

use futures::{Stream, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};

/// Maximum number of evidence lines kept per container.
pub const MAX_EVIDENCE_LINES: usize = 10;

/// Consecutive read errors after which the stream is abandoned.
const MAX_CONSECUTIVE_READ_ERRORS: usize = 3;

/// Log prefix from a noisy third-party agent that is never evidence.
const IGNORED_SOURCE: &str = "datadog";

/// Distinct error lines in discovery order, capped at [`MAX_EVIDENCE_LINES`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvidenceSet {
    lines: Vec<String>,
    read_errors: Vec<String>,
}

impl EvidenceSet {
    /// Add a line unless it is already present or the set is full.
    ///
    /// Returns `true` if the line was added.
    pub fn insert(&mut self, line: String) -> bool {
        if self.is_full() || self.lines.contains(&line) {
            return false;
        }
        self.lines.push(line);
        true
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.lines.len() >= MAX_EVIDENCE_LINES
    }

    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Read errors seen while scanning; the scan carried on past them.
    #[must_use]
    pub fn read_errors(&self) -> &[String] {
        &self.read_errors
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Whether a log line counts as error evidence.
///
/// Case-insensitive: contains "error" and does not contain "datadog".
#[must_use]
pub fn is_error_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("error") && !lower.contains(IGNORED_SOURCE)
}

/// Scan a log stream for error evidence.
///
/// The stream is consumed and dropped on return, whichever way the scan ends.
pub async fn scan<S>(mut lines: S) -> EvidenceSet
where
    S: Stream<Item = std::io::Result<String>> + Unpin,
{
    let mut evidence = EvidenceSet::default();
    let mut consecutive_errors = 0;

    while let Some(next) = lines.next().await {
        match next {
            Ok(line) => {
                consecutive_errors = 0;
                if is_error_line(&line) && evidence.insert(line) && evidence.is_full() {
                    debug!(limit = MAX_EVIDENCE_LINES, "Evidence limit reached, stopping scan");
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "Error reading log line");
                evidence.read_errors.push(e.to_string());
                consecutive_errors += 1;
                if consecutive_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                    warn!(
                        errors = consecutive_errors,
                        "Log stream keeps failing, giving up on it"
                    );
                    break;
                }
            }
        }
    }

    evidence
}
