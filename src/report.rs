//! Per-step outcomes and the run report.
//!
//! # Failure Policy
//!
//! Every step ends in exactly one `StepOutcome`. Errors never unwind past the
//! sequencer: they are converted to `StepOutcome::Failed` at the step
//! boundary and the `ContinuationPolicy` decides whether to keep going. The
//! default policy, `never_abort`, always continues.

use std::fmt;

use crate::error::Result;
use crate::stage::Stage;

// ============================================================================
// Step Outcome
// ============================================================================

/// Outcome of a single provisioning step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step did its work.
    Success(String),
    /// Nothing to do, or a precondition was absent.
    Skipped(String),
    /// The step failed; the run carries on.
    Failed(String),
}

impl StepOutcome {
    pub fn success(detail: impl Into<String>) -> Self {
        Self::Success(detail.into())
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped(reason.into())
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    /// Convert a step's `Result` at the step boundary.
    pub fn from_result(result: Result<StepOutcome>) -> Self {
        result.unwrap_or_else(|e| Self::Failed(e.to_string()))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(detail) => write!(f, "ok: {}", detail),
            Self::Skipped(reason) => write!(f, "skipped: {}", reason),
            Self::Failed(reason) => write!(f, "FAILED: {}", reason),
        }
    }
}

/// One line of the run report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub stage: Stage,
    pub outcome: StepOutcome,
}

// ============================================================================
// Continuation Policy
// ============================================================================

/// Decides, after each recorded step, whether provisioning continues.
///
/// Returning `false` stops the remaining provisioning steps. Cleanup runs
/// regardless.
pub type ContinuationPolicy = fn(&StepRecord) -> bool;

/// Best effort: keep going whatever happened.
pub fn never_abort(_record: &StepRecord) -> bool {
    true
}

/// Stop at the first failed step.
pub fn stop_on_failure(record: &StepRecord) -> bool {
    !record.outcome.is_failed()
}

// ============================================================================
// Run Report
// ============================================================================

/// Ordered outcomes of every stage reached during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    records: Vec<StepRecord>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an outcome and log it.
    pub fn record(&mut self, stage: Stage, outcome: StepOutcome) -> &StepRecord {
        match &outcome {
            StepOutcome::Failed(_) => tracing::warn!("[{}] {}", stage, outcome),
            _ => tracing::info!("[{}] {}", stage, outcome),
        }
        self.records.push(StepRecord { stage, outcome });
        &self.records[self.records.len() - 1]
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn outcome(&self, stage: Stage) -> Option<&StepOutcome> {
        self.records
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| &r.outcome)
    }

    pub fn failures(&self) -> Vec<&StepRecord> {
        self.records
            .iter()
            .filter(|r| r.outcome.is_failed())
            .collect()
    }

    /// One line per stage, in execution order.
    pub fn summary(&self) -> String {
        self.records
            .iter()
            .map(|r| format!("{:<20} {}", r.stage.to_string(), r.outcome))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Log the summary and the list of failed steps.
    pub fn log_summary(&self) {
        tracing::info!("Provisioning summary:");
        for line in self.summary().lines() {
            tracing::info!("  {}", line);
        }

        let failures = self.failures();
        if failures.is_empty() {
            tracing::info!("All steps completed without failures");
        } else {
            let names: Vec<String> = failures.iter().map(|r| r.stage.to_string()).collect();
            tracing::warn!("{} step(s) failed: {}", failures.len(), names.join(", "));
        }
    }
}
