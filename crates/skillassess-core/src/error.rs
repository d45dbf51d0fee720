use thiserror::Error;

use skillassess_model::InputError;

use crate::PipelineState;

/// Errors that stop a run before it can produce an outcome
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    Input(#[from] InputError),

    #[error("Invalid pipeline transition from {from} to {to}")]
    InvalidTransition {
        from: PipelineState,
        to: PipelineState,
    },
}
