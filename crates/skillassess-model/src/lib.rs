//! # skillassess-model
//!
//! Data model for competency-based (APC) assessment grids.
//!
//! An [`AssessmentGrid`] bundles the captured [`Competency`], a three-level
//! [`Rubric`] (ND / NI / NA), an authentic [`Scenario`] and a [`GradingScale`].
//! Grids come from an untrusted source (a language model), so every grid is
//! checked with [`validate`] before it is critiqued or exported.
//!
//! ## Key Types
//!
//! - [`Competency`] - The skill statement plus its level/track/duration context
//! - [`RubricLevel`] - The closed ND < NI < NA scale
//! - [`Rubric`] - Criteria and indicators for every level
//! - [`GradingScale`] - Contiguous score bands per level
//! - [`ValidationError`] - Every violated invariant of a grid, not just the first
//!
//! This crate performs no I/O.

mod competency;
mod duration;
mod grading;
mod grid;
mod level;
mod rubric;
mod scenario;
mod validate;

pub use competency::{Competency, InputError};
pub use duration::parse_duration_minutes;
pub use grading::{GradingScale, ScoreBand};
pub use grid::AssessmentGrid;
pub use level::RubricLevel;
pub use rubric::{Criterion, Rubric};
pub use scenario::Scenario;
pub use validate::{validate, ValidationError, Violation};
