//! Step results and the execution report

use serde::{Deserialize, Serialize};

use crate::step::Step;

/// Exit status for a completed or cancelled run
pub const EXIT_OK: u8 = 0;
/// Exit status for a fatal-step abort or an unexpected error
pub const EXIT_ABORTED: u8 = 1;
/// Exit status when the invocation lacks privilege
pub const EXIT_PRECONDITION: u8 = 2;

/// Terminal status of one executed step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failure,
    Skipped,
}

/// Recorded outcome of one executed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub description: String,
    pub status: StepStatus,
    pub detail: String,
}

impl StepResult {
    fn new(step: &Step, status: StepStatus, detail: impl Into<String>) -> Self {
        Self {
            step_id: step.id.to_string(),
            description: step.description.clone(),
            status,
            detail: detail.into(),
        }
    }

    pub fn success(step: &Step, detail: impl Into<String>) -> Self {
        Self::new(step, StepStatus::Success, detail)
    }

    pub fn failure(step: &Step, detail: impl Into<String>) -> Self {
        Self::new(step, StepStatus::Failure, detail)
    }

    pub fn skipped(step: &Step, detail: impl Into<String>) -> Self {
        Self::new(step, StepStatus::Skipped, detail)
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }
}

/// Why a run ended early
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    InsufficientPrivilege,
    UserCancelled,
    StepFailure { step_id: String },
}

/// Overall outcome of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Every built step ran; some may have failed or been skipped
    Completed,
    Aborted { reason: AbortReason },
}

/// Ordered step results plus the overall outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub results: Vec<StepResult>,
    pub outcome: Outcome,
}

impl Default for ExecutionReport {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            outcome: Outcome::Completed,
        }
    }
}

impl ExecutionReport {
    /// Report for a run the operator declined at the continue prompt
    pub fn cancelled() -> Self {
        Self::aborted(AbortReason::UserCancelled)
    }

    /// Report for a run that failed the privilege check
    pub fn insufficient_privilege() -> Self {
        Self::aborted(AbortReason::InsufficientPrivilege)
    }

    fn aborted(reason: AbortReason) -> Self {
        Self {
            results: Vec::new(),
            outcome: Outcome::Aborted { reason },
        }
    }

    pub fn result_for(&self, step_id: &str) -> Option<&StepResult> {
        self.results.iter().find(|r| r.step_id == step_id)
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == Outcome::Completed
    }

    /// Process exit status for this report.
    ///
    /// Tolerant failures still exit 0; the checklist carries them.
    pub fn exit_code(&self) -> u8 {
        match &self.outcome {
            Outcome::Completed => EXIT_OK,
            Outcome::Aborted { reason } => match reason {
                AbortReason::UserCancelled => EXIT_OK,
                AbortReason::InsufficientPrivilege => EXIT_PRECONDITION,
                AbortReason::StepFailure { .. } => EXIT_ABORTED,
            },
        }
    }
}
