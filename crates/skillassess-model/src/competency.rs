use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::duration::parse_duration_minutes;

/// Errors in the user-supplied competency record. A run never starts with one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Required fields are empty: {}", .0.join(", "))]
    EmptyFields(Vec<&'static str>),

    #[error("Invalid duration '{0}': expected a positive number of minutes or hours (e.g. 90, 2h, 3h30)")]
    InvalidDuration(String),
}

/// The skill being assessed and the context it is assessed in.
///
/// Built through [`Competency::new`], which trims every field and rejects
/// empty required ones. Fields are private so a captured competency cannot be
/// altered afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competency {
    statement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    element: Option<String>,
    level: String,
    track: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    specialty: Option<String>,
    duration_minutes: u32,
}

impl Competency {
    pub fn new(
        statement: &str,
        level: &str,
        track: &str,
        duration_minutes: u32,
    ) -> Result<Self, InputError> {
        let mut empty = Vec::new();
        for (name, value) in [("competency", statement), ("level", level), ("track", track)] {
            if value.trim().is_empty() {
                empty.push(name);
            }
        }
        if duration_minutes == 0 {
            empty.push("duration");
        }
        if !empty.is_empty() {
            return Err(InputError::EmptyFields(empty));
        }

        Ok(Self {
            statement: statement.trim().to_string(),
            element: None,
            level: level.trim().to_string(),
            track: track.trim().to_string(),
            specialty: None,
            duration_minutes,
        })
    }

    /// Build from raw text fields, parsing the duration (e.g. "2 hours", "3h30").
    pub fn from_raw(
        statement: &str,
        level: &str,
        track: &str,
        duration: &str,
    ) -> Result<Self, InputError> {
        let mut empty = Vec::new();
        for (name, value) in [
            ("competency", statement),
            ("level", level),
            ("track", track),
            ("duration", duration),
        ] {
            if value.trim().is_empty() {
                empty.push(name);
            }
        }
        if !empty.is_empty() {
            return Err(InputError::EmptyFields(empty));
        }

        let minutes = parse_duration_minutes(duration)?;
        Self::new(statement, level, track, minutes)
    }

    pub fn with_element(mut self, element: &str) -> Self {
        self.element = non_empty(element);
        self
    }

    pub fn with_specialty(mut self, specialty: &str) -> Self {
        self.specialty = non_empty(specialty);
        self
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    pub fn element(&self) -> Option<&str> {
        self.element.as_deref()
    }

    pub fn level(&self) -> &str {
        &self.level
    }

    pub fn track(&self) -> &str {
        &self.track
    }

    pub fn specialty(&self) -> Option<&str> {
        self.specialty.as_deref()
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    /// Human-readable duration, e.g. "1h30" or "45 min"
    pub fn duration_label(&self) -> String {
        let hours = self.duration_minutes / 60;
        let minutes = self.duration_minutes % 60;
        match (hours, minutes) {
            (0, m) => format!("{} min", m),
            (h, 0) => format!("{}h", h),
            (h, m) => format!("{}h{:02}", h, m),
        }
    }

    /// Re-check the invariants of a deserialized record
    pub fn check(&self) -> Result<(), InputError> {
        let mut empty = Vec::new();
        for (name, value) in [
            ("competency", &self.statement),
            ("level", &self.level),
            ("track", &self.track),
        ] {
            if value.trim().is_empty() {
                empty.push(name);
            }
        }
        if self.duration_minutes == 0 {
            empty.push("duration");
        }
        if empty.is_empty() {
            Ok(())
        } else {
            Err(InputError::EmptyFields(empty))
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_fields() {
        let competency = Competency::new("  Configure a LAN ", " intermediate", "networking ", 60)
            .unwrap()
            .with_specialty("  ");
        assert_eq!(competency.statement(), "Configure a LAN");
        assert_eq!(competency.level(), "intermediate");
        assert_eq!(competency.track(), "networking");
        assert_eq!(competency.specialty(), None);
    }

    #[test]
    fn test_reports_every_empty_field() {
        let err = Competency::new("", " ", "networking", 0).unwrap_err();
        assert_eq!(
            err,
            InputError::EmptyFields(vec!["competency", "level", "duration"])
        );
    }

    #[test]
    fn test_from_raw_parses_duration() {
        let competency =
            Competency::from_raw("Design a schema", "Licence 2", "Informatique", "2 heures")
                .unwrap();
        assert_eq!(competency.duration_minutes(), 120);
        assert_eq!(competency.duration_label(), "2h");
    }

    #[test]
    fn test_from_raw_rejects_bad_duration() {
        let err = Competency::from_raw("Design a schema", "L2", "Info", "soon").unwrap_err();
        assert!(matches!(err, InputError::InvalidDuration(_)));
    }

    #[test]
    fn test_duration_label() {
        let c = Competency::new("x", "y", "z", 90).unwrap();
        assert_eq!(c.duration_label(), "1h30");
        let c = Competency::new("x", "y", "z", 45).unwrap();
        assert_eq!(c.duration_label(), "45 min");
    }
}
