//! Rollout report formatting.

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;

use crate::config::{RetryBudget, WorkloadRef};
use crate::diagnostics::{ContainerReport, Diagnosis, Finding, PodReport};
use crate::poller::Outcome;
use crate::ui;

/// Everything known about one run, for text or JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct RolloutReport {
    pub workload: WorkloadRef,
    pub checked_at: DateTime<Utc>,
    pub max_attempts: u32,
    pub interval_secs: f64,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl RolloutReport {
    #[must_use]
    pub fn new(workload: WorkloadRef, budget: RetryBudget, outcome: Outcome) -> Self {
        Self {
            workload,
            checked_at: Utc::now(),
            max_attempts: budget.max_attempts(),
            interval_secs: budget.interval().as_secs_f64(),
            outcome,
        }
    }

    /// One-line summary used in the closing banner and the exit error.
    #[must_use]
    pub fn summary(&self) -> String {
        match &self.outcome {
            Outcome::Success { attempts, .. } => format!(
                "Deployment {} is available (attempt {}/{})",
                self.workload, attempts, self.max_attempts
            ),
            Outcome::Failure {
                attempts,
                diagnosis,
                ..
            } => format!(
                "Deployment {} failed: not available after {} attempts, \
                 {} container(s) need attention",
                self.workload,
                attempts,
                diagnosis.problem_count()
            ),
        }
    }

    /// Print the full report as text.
    pub fn print(&self) {
        if let Outcome::Failure { diagnosis, .. } = &self.outcome {
            print_diagnosis(diagnosis);
        }

        let status = if self.outcome.is_success() {
            "[INFO]"
        } else {
            "[ERROR]"
        };
        ui::print_section(&format!("{status} Deployment Status [{}]", self.workload.name));
        ui::print_kv("Workload", &self.workload.to_string());
        ui::print_kv("Checked", &self.checked_at.to_rfc3339());

        if self.outcome.is_success() {
            ui::print_success(&self.summary());
        } else {
            ui::print_error(&self.summary());
        }
        println!();
    }

    /// Print the report as pretty JSON.
    pub fn print_json(&self) -> serde_json::Result<()> {
        println!("{}", serde_json::to_string_pretty(self)?);
        Ok(())
    }
}

/// Print one banner-delimited section per pod.
pub fn print_diagnosis(diagnosis: &Diagnosis) {
    if diagnosis.pods.is_empty() {
        ui::print_warning("No pods matched the workload selector");
        return;
    }

    for pod in &diagnosis.pods {
        print_pod(pod);
    }
}

fn print_pod(pod: &PodReport) {
    ui::print_section(&format!("Pod status [{}]", pod.pod));

    if let Some(phase) = &pod.phase {
        ui::print_kv("Phase", phase);
    }

    for note in &pod.notes {
        ui::print_list_item(note);
    }

    for container in &pod.containers {
        print_container(container);
    }
}

fn print_container(report: &ContainerReport) {
    if let Finding::Running = report.finding {
        ui::print_success(&format!("Container {} is in running state", report.container));
        return;
    }

    println!("{}", format!("Container [{}]:", report.container).bold());
    println!("{}", report.state_detail());
    println!();
    ui::print_note(&report.finding.to_string());

    if let Finding::LogEvidence { evidence } = &report.finding {
        for error in evidence.read_errors() {
            ui::print_warning(&format!("Error reading logs: {error}"));
        }
    }
    println!();
}
