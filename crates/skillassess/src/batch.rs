//! Batch files: several competencies generated in one invocation.
//!
//! ```toml
//! [[competency]]
//! competency = "Configure a small office LAN"
//! level = "intermediate"
//! track = "networking"
//! duration = "2h"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use skillassess_model::Competency;

use crate::input::CompetencyArgs;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchFile {
    #[serde(rename = "competency", default)]
    pub entries: Vec<BatchEntry>,
}

/// One competency of a batch file
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchEntry {
    pub competency: String,
    pub element: Option<String>,
    pub level: String,
    pub track: String,
    pub specialty: Option<String>,
    pub duration: DurationSpec,
}

/// Durations may be bare minutes or text such as "3h30"
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DurationSpec {
    Minutes(u32),
    Text(String),
}

impl DurationSpec {
    fn as_text(&self) -> String {
        match self {
            DurationSpec::Minutes(minutes) => minutes.to_string(),
            DurationSpec::Text(text) => text.clone(),
        }
    }
}

impl BatchFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Validate every entry up front so no run starts from a bad batch
    pub fn competencies(&self) -> Result<Vec<Competency>> {
        if self.entries.is_empty() {
            anyhow::bail!("Batch file has no [[competency]] entries");
        }
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                entry
                    .to_args()
                    .to_competency()
                    .with_context(|| format!("Invalid batch entry #{}", i + 1))
            })
            .collect()
    }
}

impl BatchEntry {
    fn to_args(&self) -> CompetencyArgs {
        CompetencyArgs {
            competency: Some(self.competency.clone()),
            element: self.element.clone(),
            level: Some(self.level.clone()),
            track: Some(self.track.clone()),
            specialty: self.specialty.clone(),
            duration: Some(self.duration.as_text()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn parse(content: &str) -> BatchFile {
        toml::from_str(content).unwrap()
    }

    #[test]
    fn test_entries_with_both_duration_forms() {
        let batch = parse(
            r#"
            [[competency]]
            competency = "Configure a small office LAN"
            level = "intermediate"
            track = "networking"
            duration = 120

            [[competency]]
            competency = "Harden an SSH server"
            element = "Key-based authentication"
            level = "advanced"
            track = "networking"
            specialty = "security"
            duration = "1 heure 30 minutes"
            "#,
        );

        let competencies = batch.competencies().unwrap();
        assert_eq!(competencies.len(), 2);
        assert_eq!(competencies[0].duration_minutes(), 120);
        assert_eq!(competencies[1].duration_minutes(), 90);
        assert_eq!(competencies[1].specialty(), Some("security"));
    }

    #[test]
    fn test_invalid_entry_names_its_position() {
        let batch = parse(
            r#"
            [[competency]]
            competency = "Configure a small office LAN"
            level = "intermediate"
            track = "networking"
            duration = 60

            [[competency]]
            competency = "Harden an SSH server"
            level = ""
            track = "networking"
            duration = 60
            "#,
        );

        let err = batch.competencies().unwrap_err();
        assert!(format!("{err:#}").contains("#2"));
    }

    #[test]
    fn test_empty_batch_is_an_error() {
        assert!(parse("").competencies().is_err());
    }

    #[test]
    fn test_load_rejects_unknown_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("batch.toml");
        fs::write(
            &path,
            "[[competency]]\ncompetency = \"x\"\nlevel = \"a\"\ntrack = \"b\"\nduration = 5\nweight = 2\n",
        )
        .unwrap();

        assert!(BatchFile::load(&path).is_err());
    }
}
