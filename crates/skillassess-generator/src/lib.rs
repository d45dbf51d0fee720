//! # skillassess-generator
//!
//! The generation agent: turns a [`Competency`](skillassess_model::Competency)
//! into a structurally valid [`AssessmentGrid`](skillassess_model::AssessmentGrid)
//! by prompting a hosted model, parsing its reply tolerantly, and re-prompting
//! with corrective feedback when the reply is unusable.

mod generator;
mod parse;
mod prompts;

pub use generator::{GenerationAgent, GenerationContext, GenerationError};
pub use parse::{parse_grid, ParseError};
pub use prompts::GenerationPrompts;
