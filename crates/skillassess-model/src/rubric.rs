use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::RubricLevel;

/// One observable criterion at a given level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    pub description: String,
    /// Observable indicators, in the order they should be assessed
    pub indicators: Vec<String>,
    #[serde(default)]
    pub points: u32,
}

impl Criterion {
    pub fn new(description: impl Into<String>, indicators: Vec<String>) -> Self {
        Self {
            description: description.into(),
            indicators,
            points: 0,
        }
    }

    pub fn with_points(mut self, points: u32) -> Self {
        self.points = points;
        self
    }
}

/// Criteria grouped by level.
///
/// Serialized as a JSON object keyed by `ND` / `NI` / `NA`. Entries are kept in
/// the order they were inserted or read, duplicates included, so that
/// [`crate::validate`] can report a level that appears twice instead of one
/// copy silently replacing the other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rubric {
    entries: Vec<(RubricLevel, Vec<Criterion>)>,
}

impl Rubric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append criteria for a level (builder style)
    pub fn with_level(mut self, level: RubricLevel, criteria: Vec<Criterion>) -> Self {
        self.push(level, criteria);
        self
    }

    pub fn push(&mut self, level: RubricLevel, criteria: Vec<Criterion>) {
        self.entries.push((level, criteria));
    }

    /// Criteria of the first entry for `level`
    pub fn criteria(&self, level: RubricLevel) -> Option<&[Criterion]> {
        self.entries
            .iter()
            .find(|(l, _)| *l == level)
            .map(|(_, c)| c.as_slice())
    }

    /// All entries in stored order
    pub fn entries(&self) -> &[(RubricLevel, Vec<Criterion>)] {
        &self.entries
    }

    /// Number of entries for `level` (0, 1, or more when duplicated)
    pub fn occurrences(&self, level: RubricLevel) -> usize {
        self.entries.iter().filter(|(l, _)| *l == level).count()
    }

    /// Iterate criteria across all levels
    pub fn all_criteria(&self) -> impl Iterator<Item = (RubricLevel, &Criterion)> {
        self.entries
            .iter()
            .flat_map(|(level, criteria)| criteria.iter().map(move |c| (*level, c)))
    }

    pub fn criterion_count(&self) -> usize {
        self.entries.iter().map(|(_, c)| c.len()).sum()
    }
}

impl Serialize for Rubric {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (level, criteria) in &self.entries {
            map.serialize_entry(level, criteria)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Rubric {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RubricVisitor;

        impl<'de> Visitor<'de> for RubricVisitor {
            type Value = Rubric;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map from rubric level (ND, NI, NA) to criteria")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut rubric = Rubric::new();
                while let Some((level, criteria)) =
                    access.next_entry::<RubricLevel, Vec<Criterion>>()?
                {
                    rubric.push(level, criteria);
                }
                Ok(rubric)
            }
        }

        deserializer.deserialize_map(RubricVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_keyed_by_level() {
        let rubric = Rubric::new().with_level(
            RubricLevel::NotAchieved,
            vec![Criterion::new("Cabling", vec!["Uses wrong cable".into()])],
        );
        let json = serde_json::to_value(&rubric).unwrap();
        assert_eq!(json["ND"][0]["description"], "Cabling");
        assert_eq!(json["ND"][0]["points"], 0);
    }

    #[test]
    fn test_deserialize_keeps_duplicate_levels() {
        let json = r#"{
            "ND": [{"description": "a", "indicators": ["x"]}],
            "ND": [{"description": "b", "indicators": ["y"]}]
        }"#;
        let rubric: Rubric = serde_json::from_str(json).unwrap();
        assert_eq!(rubric.occurrences(RubricLevel::NotAchieved), 2);
        assert_eq!(rubric.criteria(RubricLevel::NotAchieved).unwrap()[0].description, "a");
    }

    #[test]
    fn test_rejects_unknown_level() {
        let json = r#"{"XX": []}"#;
        assert!(serde_json::from_str::<Rubric>(json).is_err());
    }
}
