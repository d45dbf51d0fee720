//! # skillassess-core
//!
//! The generation pipeline: a state machine that drafts a grid, has it
//! critiqued, folds rejections back into a bounded number of regenerations,
//! and ends in `Accepted`, `Failed` or `Cancelled`.
//!
//! ## Key Types
//!
//! - [`Pipeline`] - Runs one competency (or a batch) to an outcome
//! - [`ModelCaller`] - The generate/critique capability the pipeline drives
//! - [`PipelineOutcome`] - Final result, carrying the grid or the last findings

mod caller;
mod context;
mod error;
mod outcome;
mod pipeline;
mod state;

pub use caller::{HostedModelCaller, ModelCaller};
pub use context::{CycleRecord, RunContext};
pub use error::PipelineError;
pub use outcome::{Failure, FailureReason, PipelineOutcome};
pub use pipeline::{retry_logging_callback, Pipeline, DEFAULT_REGENERATION_BUDGET};
pub use state::PipelineState;
