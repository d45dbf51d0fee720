use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{AssessmentGrid, InputError, RubricLevel};

/// A single broken structural invariant
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    #[error("competency field '{field}' is empty")]
    EmptyCompetencyField { field: String },

    #[error("rubric level {level} is missing")]
    MissingLevel { level: RubricLevel },

    #[error("rubric level {level} appears {count} times")]
    DuplicateLevel { level: RubricLevel, count: usize },

    #[error("rubric level {level} has no criteria")]
    EmptyLevel { level: RubricLevel },

    #[error("criterion {position} of level {level} has an empty description", position = .index + 1)]
    EmptyCriterionDescription { level: RubricLevel, index: usize },

    #[error("criterion {position} of level {level} has no indicators", position = .index + 1)]
    NoIndicators { level: RubricLevel, index: usize },

    #[error("criterion {position} of level {level} has a blank indicator", position = .index + 1)]
    BlankIndicator { level: RubricLevel, index: usize },

    #[error("criterion {position} of level {level} is worth no points", position = .index + 1)]
    ZeroPointCriterion { level: RubricLevel, index: usize },

    #[error("grading scale total points is zero")]
    ZeroTotalPoints,

    #[error("grading scale has no band for level {level}")]
    MissingBand { level: RubricLevel },

    #[error("grading band for {level} is inverted ({min} > {max})")]
    InvertedBand { level: RubricLevel, min: u32, max: u32 },

    #[error("lowest grading band starts at {min}, expected 0")]
    BandsDoNotStartAtZero { min: u32 },

    #[error("grading bands {lower} and {upper} overlap")]
    BandOverlap { lower: RubricLevel, upper: RubricLevel },

    #[error("grading bands {lower} and {upper} leave a gap")]
    BandGap { lower: RubricLevel, upper: RubricLevel },

    #[error("highest grading band ends at {max}, expected total of {total}")]
    BandsDoNotReachTotal { max: u32, total: u32 },

    #[error("scenario text is empty")]
    EmptyScenario,

    #[error("scenario instructions are empty")]
    EmptyInstructions,

    #[error("scenario mentions neither the level '{level}' nor the track '{track}'")]
    ScenarioOffContext { level: String, track: String },
}

impl Violation {
    /// Rubric level the violation points at, if any
    pub fn level(&self) -> Option<RubricLevel> {
        match self {
            Violation::MissingLevel { level }
            | Violation::DuplicateLevel { level, .. }
            | Violation::EmptyLevel { level }
            | Violation::EmptyCriterionDescription { level, .. }
            | Violation::NoIndicators { level, .. }
            | Violation::BlankIndicator { level, .. }
            | Violation::ZeroPointCriterion { level, .. }
            | Violation::MissingBand { level }
            | Violation::InvertedBand { level, .. } => Some(*level),
            Violation::BandOverlap { upper, .. } | Violation::BandGap { upper, .. } => Some(*upper),
            _ => None,
        }
    }

    /// 0-based index of the criterion within its level, if any.
    ///
    /// Messages print it 1-based.
    pub fn criterion_index(&self) -> Option<usize> {
        match self {
            Violation::EmptyCriterionDescription { index, .. }
            | Violation::NoIndicators { index, .. }
            | Violation::BlankIndicator { index, .. }
            | Violation::ZeroPointCriterion { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Every structural invariant a grid breaks
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} structural violation(s): {}", .violations.len(), summarize(.violations))]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    pub fn contains(&self, violation: &Violation) -> bool {
        self.violations.contains(violation)
    }

    /// Bullet list suitable for a corrective prompt
    pub fn as_bullets(&self) -> String {
        self.violations
            .iter()
            .map(|v| format!("- {}", v))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Check every structural invariant of `grid`.
///
/// Collects all violations rather than stopping at the first one.
pub fn validate(grid: &AssessmentGrid) -> Result<(), ValidationError> {
    let mut violations = Vec::new();

    check_competency(grid, &mut violations);
    check_rubric(grid, &mut violations);
    check_grading_scale(grid, &mut violations);
    check_scenario(grid, &mut violations);

    if violations.is_empty() {
        Ok(())
    } else {
        debug!(count = violations.len(), "Grid failed structural validation");
        Err(ValidationError { violations })
    }
}

fn check_competency(grid: &AssessmentGrid, violations: &mut Vec<Violation>) {
    if let Err(InputError::EmptyFields(fields)) = grid.competency.check() {
        violations.extend(fields.into_iter().map(|field| Violation::EmptyCompetencyField {
            field: field.to_string(),
        }));
    }
}

fn check_rubric(grid: &AssessmentGrid, violations: &mut Vec<Violation>) {
    for level in RubricLevel::ALL {
        match grid.rubric.occurrences(level) {
            0 => violations.push(Violation::MissingLevel { level }),
            1 => {}
            count => violations.push(Violation::DuplicateLevel { level, count }),
        }
    }

    for (level, criteria) in grid.rubric.entries() {
        let level = *level;
        if criteria.is_empty() {
            violations.push(Violation::EmptyLevel { level });
        }
        for (index, criterion) in criteria.iter().enumerate() {
            if criterion.description.trim().is_empty() {
                violations.push(Violation::EmptyCriterionDescription { level, index });
            }
            if criterion.indicators.is_empty() {
                violations.push(Violation::NoIndicators { level, index });
            } else if criterion.indicators.iter().any(|i| i.trim().is_empty()) {
                violations.push(Violation::BlankIndicator { level, index });
            }
            if criterion.points == 0 {
                violations.push(Violation::ZeroPointCriterion { level, index });
            }
        }
    }
}

fn check_grading_scale(grid: &AssessmentGrid, violations: &mut Vec<Violation>) {
    let scale = &grid.grading_scale;
    if scale.total_points == 0 {
        violations.push(Violation::ZeroTotalPoints);
    }

    for level in RubricLevel::ALL {
        match scale.band(level) {
            None => violations.push(Violation::MissingBand { level }),
            Some(band) if band.min > band.max => violations.push(Violation::InvertedBand {
                level,
                min: band.min,
                max: band.max,
            }),
            Some(_) => {}
        }
    }

    if let Some(lowest) = scale.band(RubricLevel::NotAchieved) {
        if lowest.min != 0 {
            violations.push(Violation::BandsDoNotStartAtZero { min: lowest.min });
        }
    }

    for pair in RubricLevel::ALL.windows(2) {
        let (lower, upper) = (pair[0], pair[1]);
        if let (Some(lo), Some(hi)) = (scale.band(lower), scale.band(upper)) {
            if hi.min <= lo.max {
                violations.push(Violation::BandOverlap { lower, upper });
            } else if hi.min > lo.max.saturating_add(1) {
                violations.push(Violation::BandGap { lower, upper });
            }
        }
    }

    if let Some(highest) = scale.band(RubricLevel::Achieved) {
        if scale.total_points > 0 && highest.max != scale.total_points {
            violations.push(Violation::BandsDoNotReachTotal {
                max: highest.max,
                total: scale.total_points,
            });
        }
    }
}

fn check_scenario(grid: &AssessmentGrid, violations: &mut Vec<Violation>) {
    let scenario = &grid.scenario;
    if scenario.text().is_empty() {
        violations.push(Violation::EmptyScenario);
        return;
    }
    if scenario.instructions.trim().is_empty() {
        violations.push(Violation::EmptyInstructions);
    }

    let level = grid.competency.level();
    let track = grid.competency.track();
    if !scenario.mentions(level) && !scenario.mentions(track) {
        violations.push(Violation::ScenarioOffContext {
            level: level.to_string(),
            track: track.to_string(),
        });
    }
}
