use serde::{Deserialize, Serialize};

/// States of a single pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    CollectingInput,
    Generating,
    Critiquing,
    Regenerating,
    Accepted,
    Failed,
    Cancelled,
}

impl PipelineState {
    /// Whether the machine may move from `self` to `next`.
    ///
    /// Cancellation is allowed from every non-terminal state; no state is
    /// skipped otherwise.
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, Cancelled) => true,
            (CollectingInput, Generating) => true,
            (Generating, Critiquing | Failed) => true,
            (Critiquing, Accepted | Regenerating | Failed) => true,
            (Regenerating, Generating) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineState::Accepted | PipelineState::Failed | PipelineState::Cancelled
        )
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineState::CollectingInput => "collecting input",
            PipelineState::Generating => "generating",
            PipelineState::Critiquing => "critiquing",
            PipelineState::Regenerating => "regenerating",
            PipelineState::Accepted => "accepted",
            PipelineState::Failed => "failed",
            PipelineState::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}
