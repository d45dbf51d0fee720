use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::RubricLevel;

/// Inclusive score range `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBand {
    pub min: u32,
    pub max: u32,
}

impl ScoreBand {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, score: u32) -> bool {
        self.min <= score && score <= self.max
    }
}

impl std::fmt::Display for ScoreBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.min, self.max)
    }
}

/// Score bands per level over `0..=total_points`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradingScale {
    pub total_points: u32,
    pub bands: BTreeMap<RubricLevel, ScoreBand>,
}

impl GradingScale {
    pub fn new(total_points: u32) -> Self {
        Self {
            total_points,
            bands: BTreeMap::new(),
        }
    }

    pub fn with_band(mut self, level: RubricLevel, band: ScoreBand) -> Self {
        self.bands.insert(level, band);
        self
    }

    pub fn band(&self, level: RubricLevel) -> Option<ScoreBand> {
        self.bands.get(&level).copied()
    }

    /// Level whose band contains `score`
    pub fn level_for(&self, score: u32) -> Option<RubricLevel> {
        self.bands
            .iter()
            .find(|(_, band)| band.contains(score))
            .map(|(level, _)| *level)
    }
}
