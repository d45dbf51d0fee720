use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use skillassess_model::Competency;

use crate::{PipelineError, PipelineState};

/// Per-run state for the generation pipeline
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub competency: Competency,
    state: PipelineState,
    /// Every state the run has been in, in order
    trace: Vec<PipelineState>,
    /// Zero-based generation cycle
    pub cycle: usize,
    pub history: Vec<CycleRecord>,
    started_at: Instant,
}

/// Record of one generate-critique cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleRecord {
    pub cycle: usize,
    /// Whether the draft passed structural validation
    pub structurally_valid: bool,
    pub verdict: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<String>,
    pub generation_secs: f64,
    pub critique_secs: f64,
    pub timestamp: DateTime<Utc>,
}

impl RunContext {
    pub fn new(competency: Competency) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            competency,
            state: PipelineState::CollectingInput,
            trace: vec![PipelineState::CollectingInput],
            cycle: 0,
            history: Vec::new(),
            started_at: Instant::now(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn trace(&self) -> &[PipelineState] {
        &self.trace
    }

    /// Move to `next`, rejecting transitions the state machine does not allow
    pub fn transition(&mut self, next: PipelineState) -> Result<(), PipelineError> {
        if !self.state.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(run_id = %self.run_id, from = %self.state, to = %next, "Pipeline transition");
        self.state = next;
        self.trace.push(next);
        Ok(())
    }

    /// Number of regeneration cycles already started
    pub fn regenerations(&self) -> usize {
        self.cycle
    }

    pub fn push_record(&mut self, record: CycleRecord) {
        self.history.push(record);
    }

    pub fn total_duration(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> RunContext {
        RunContext::new(Competency::new("Configure a LAN", "intermediate", "networking", 60).unwrap())
    }

    #[test]
    fn test_transition_records_trace() {
        let mut ctx = context();
        ctx.transition(PipelineState::Generating).unwrap();
        ctx.transition(PipelineState::Critiquing).unwrap();
        assert_eq!(ctx.state(), PipelineState::Critiquing);
        assert_eq!(
            ctx.trace(),
            &[
                PipelineState::CollectingInput,
                PipelineState::Generating,
                PipelineState::Critiquing
            ]
        );
    }

    #[test]
    fn test_invalid_transition_is_rejected() {
        let mut ctx = context();
        let err = ctx.transition(PipelineState::Accepted).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidTransition {
                from: PipelineState::CollectingInput,
                to: PipelineState::Accepted
            }
        ));
        assert_eq!(ctx.state(), PipelineState::CollectingInput);
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(context().run_id, context().run_id);
    }
}
