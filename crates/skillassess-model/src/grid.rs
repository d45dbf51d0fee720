use serde::{Deserialize, Serialize};

use crate::{Competency, GradingScale, Rubric, Scenario};

/// The complete generated artifact for one competency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentGrid {
    pub competency: Competency,
    pub rubric: Rubric,
    pub scenario: Scenario,
    pub grading_scale: GradingScale,
}

impl AssessmentGrid {
    pub fn new(
        competency: Competency,
        rubric: Rubric,
        scenario: Scenario,
        grading_scale: GradingScale,
    ) -> Self {
        Self {
            competency,
            rubric,
            scenario,
            grading_scale,
        }
    }

    /// One-line description for logs
    pub fn short_description(&self) -> String {
        let per_level: Vec<String> = self
            .rubric
            .entries()
            .iter()
            .map(|(level, criteria)| format!("{}:{}", level, criteria.len()))
            .collect();
        format!(
            "{} criteria [{}], {} points",
            self.rubric.criterion_count(),
            per_level.join(" "),
            self.grading_scale.total_points
        )
    }
}
