//! Collects the competency description from flags, prompting for gaps.

use anyhow::{Context, Result};
use clap::Args;
use dialoguer::Input;

use skillassess_model::{Competency, InputError};

/// Competency fields accepted on the command line
#[derive(Args, Debug, Clone, Default)]
pub struct CompetencyArgs {
    /// Competency statement to assess
    #[arg(short, long)]
    pub competency: Option<String>,

    /// Element of the competency (sub-skill)
    #[arg(short, long)]
    pub element: Option<String>,

    /// Target level (e.g. "intermediate")
    #[arg(short, long)]
    pub level: Option<String>,

    /// Training track
    #[arg(short, long)]
    pub track: Option<String>,

    /// Specialty within the track
    #[arg(short, long)]
    pub specialty: Option<String>,

    /// Assessment duration (e.g. "90", "2h", "3h30", "1 heure 30 minutes")
    #[arg(short, long)]
    pub duration: Option<String>,
}

impl CompetencyArgs {
    /// Names of the required fields that were not given
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("competency", &self.competency),
            ("level", &self.level),
            ("track", &self.track),
            ("duration", &self.duration),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| name)
        .collect()
    }

    /// Build the competency without prompting
    pub fn to_competency(&self) -> Result<Competency, InputError> {
        let field = |value: &Option<String>| value.clone().unwrap_or_default();
        Ok(Competency::from_raw(
            &field(&self.competency),
            &field(&self.level),
            &field(&self.track),
            &field(&self.duration),
        )?
        .with_element(&field(&self.element))
        .with_specialty(&field(&self.specialty)))
    }
}

/// Resolve the competency, asking for missing fields when `interactive`.
///
/// Without a terminal, missing fields fail immediately with every gap listed.
pub fn collect(args: &CompetencyArgs, interactive: bool) -> Result<Competency> {
    if args.missing().is_empty() || !interactive {
        return Ok(args.to_competency()?);
    }

    let mut filled = args.clone();
    filled.competency = ask(&filled.competency, "Competency", false)?;
    filled.element = ask(&filled.element, "Element (optional)", true)?;
    filled.level = ask(&filled.level, "Level", false)?;
    filled.track = ask(&filled.track, "Track", false)?;
    filled.specialty = ask(&filled.specialty, "Specialty (optional)", true)?;
    filled.duration = ask(&filled.duration, "Duration (e.g. 2h, 90 min)", false)?;

    Ok(filled.to_competency()?)
}

fn ask(current: &Option<String>, prompt: &str, optional: bool) -> Result<Option<String>> {
    if current.as_deref().is_some_and(|v| !v.trim().is_empty()) {
        return Ok(current.clone());
    }
    let answer: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(optional)
        .interact_text()
        .with_context(|| format!("Failed to read {}", prompt.to_lowercase()))?;
    Ok(Some(answer))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> CompetencyArgs {
        CompetencyArgs {
            competency: Some("Install a network printer".into()),
            element: Some("Driver setup".into()),
            level: Some("beginner".into()),
            track: Some("IT support".into()),
            specialty: None,
            duration: Some("1h30".into()),
        }
    }

    #[test]
    fn test_complete_flags_build_competency() {
        let competency = collect(&full(), false).unwrap();

        assert_eq!(competency.statement(), "Install a network printer");
        assert_eq!(competency.element(), Some("Driver setup"));
        assert_eq!(competency.specialty(), None);
        assert_eq!(competency.duration_minutes(), 90);
    }

    #[test]
    fn test_missing_fields_listed() {
        let args = CompetencyArgs {
            level: Some("  ".into()),
            ..full()
        };
        assert_eq!(args.missing(), vec!["level"]);

        let empty = CompetencyArgs::default();
        assert_eq!(empty.missing(), vec!["competency", "level", "track", "duration"]);
    }

    #[test]
    fn test_non_interactive_gap_is_input_error() {
        let args = CompetencyArgs {
            track: None,
            duration: None,
            ..full()
        };

        let err = collect(&args, false).unwrap_err();
        let input = err.downcast_ref::<InputError>().unwrap();
        assert!(matches!(input, InputError::EmptyFields(fields) if fields == &vec!["track", "duration"]));
    }

    #[test]
    fn test_bad_duration_is_input_error() {
        let args = CompetencyArgs {
            duration: Some("soon".into()),
            ..full()
        };
        assert!(collect(&args, false)
            .unwrap_err()
            .downcast_ref::<InputError>()
            .is_some());
    }
}
