use serde::{Deserialize, Serialize};
use std::time::Duration;

use skillassess_critic::Finding;
use skillassess_model::AssessmentGrid;

use crate::{CycleRecord, PipelineState};

/// Why a run ended in `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Still rejected after the last allowed regeneration
    RegenerationBudgetExhausted,
    /// The model provider could not be reached
    Unavailable,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::RegenerationBudgetExhausted => write!(f, "regeneration budget exhausted"),
            FailureReason::Unavailable => write!(f, "model provider unavailable"),
        }
    }
}

/// The final outcome of a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    /// Critic accepted a structurally valid grid; the only exportable outcome
    Accepted {
        run_id: String,
        grid: AssessmentGrid,
        summary: String,
        cycles: usize,
        history: Vec<CycleRecord>,
        total_duration_secs: f64,
    },
    /// Unrecoverable failure; the last candidate is kept for inspection
    Failed {
        run_id: String,
        failed_in: PipelineState,
        reason: FailureReason,
        error: String,
        last_grid: Option<AssessmentGrid>,
        findings: Vec<Finding>,
        cycles: usize,
        history: Vec<CycleRecord>,
        total_duration_secs: f64,
    },
    /// User requested stop (e.g., Ctrl+C)
    Cancelled {
        run_id: String,
        state: PipelineState,
        cycles: usize,
        history: Vec<CycleRecord>,
        total_duration_secs: f64,
    },
}

/// Details of a failed run, gathered before building the outcome
pub struct Failure {
    pub failed_in: PipelineState,
    pub reason: FailureReason,
    pub error: String,
    pub last_grid: Option<AssessmentGrid>,
    pub findings: Vec<Finding>,
}

impl PipelineOutcome {
    pub fn accepted(
        run_id: String,
        grid: AssessmentGrid,
        summary: String,
        history: Vec<CycleRecord>,
        duration: Duration,
    ) -> Self {
        Self::Accepted {
            run_id,
            grid,
            summary,
            cycles: history.len(),
            history,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn failed(
        run_id: String,
        failure: Failure,
        history: Vec<CycleRecord>,
        duration: Duration,
    ) -> Self {
        Self::Failed {
            run_id,
            failed_in: failure.failed_in,
            reason: failure.reason,
            error: failure.error,
            last_grid: failure.last_grid,
            findings: failure.findings,
            cycles: history.len(),
            history,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn cancelled(
        run_id: String,
        state: PipelineState,
        history: Vec<CycleRecord>,
        duration: Duration,
    ) -> Self {
        Self::Cancelled {
            run_id,
            state,
            cycles: history.len(),
            history,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn run_id(&self) -> &str {
        match self {
            Self::Accepted { run_id, .. } => run_id,
            Self::Failed { run_id, .. } => run_id,
            Self::Cancelled { run_id, .. } => run_id,
        }
    }

    pub fn cycles(&self) -> usize {
        match self {
            Self::Accepted { cycles, .. } => *cycles,
            Self::Failed { cycles, .. } => *cycles,
            Self::Cancelled { cycles, .. } => *cycles,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// The grid to export; only an accepted run has one
    pub fn accepted_grid(&self) -> Option<&AssessmentGrid> {
        match self {
            Self::Accepted { grid, .. } => Some(grid),
            _ => None,
        }
    }

    /// User-facing summary: which state the run ended in and why
    pub fn summary(&self) -> String {
        match self {
            Self::Accepted { summary, cycles, .. } => {
                format!("Accepted after {} cycle(s): {}", cycles, summary)
            }
            Self::Failed {
                failed_in,
                reason,
                findings,
                ..
            } => {
                let mut text = format!("Failed while {}: {}", failed_in, reason);
                for finding in findings {
                    text.push_str(&format!("\n  - {}", finding));
                }
                text
            }
            Self::Cancelled { state, .. } => format!("Cancelled while {}", state),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Accepted { .. } => 0,
            Self::Failed {
                reason: FailureReason::RegenerationBudgetExhausted,
                ..
            } => 1,
            Self::Failed { .. } => 2,
            Self::Cancelled { .. } => 130,
        }
    }
}
