use skillassess_model::Competency;

/// Canonical reply shape shown to the model
const GRID_SCHEMA: &str = r#"{
  "rubric": {
    "ND": [
      {"description": "Short criterion", "indicators": ["Observable indicator", "Observable indicator"], "points": 2}
    ],
    "NI": [
      {"description": "Short criterion", "indicators": ["Observable indicator", "Observable indicator"], "points": 3}
    ],
    "NA": [
      {"description": "Short criterion", "indicators": ["Observable indicator", "Observable indicator"], "points": 4}
    ]
  },
  "scenario": {
    "context": "Authentic professional context",
    "task": "The complex task the learner performs",
    "instructions": "Clear instructions for the learner"
  },
  "grading_scale": {
    "total_points": 20,
    "bands": {
      "ND": {"min": 0, "max": 9},
      "NI": {"min": 10, "max": 14},
      "NA": {"min": 15, "max": 20}
    }
  }
}"#;

/// Prompt templates for the generation agent
pub struct GenerationPrompts;

impl GenerationPrompts {
    /// Build the drafting prompt.
    ///
    /// `feedback` carries critique findings from a previous cycle and
    /// `repair` describes why the previous reply in this cycle was unusable.
    pub fn build(competency: &Competency, feedback: &[String], repair: Option<&str>) -> String {
        let mut prompt = format!(
            r#"You are an instructional designer specialised in competency-based assessment (APC).

Draft a complete assessment grid and an authentic evaluation scenario for the competency below.

## Competency
- **Statement**: {statement}
{element}- **Level**: {level}
- **Track**: {track}
{specialty}- **Duration**: {duration}

## Requirements
1. The rubric has exactly the three levels ND (not achieved), NI (in progress) and NA (achieved), each with 2 to 3 criteria.
2. Every criterion has a short description and at most 2 concise, observable indicators.
3. The scenario fits the level, the track and a {duration} session.
4. The grading scale bands start at 0, do not overlap or leave gaps, and end exactly at total_points.
5. Every criterion is worth more than 0 points.
6. Write all content in the language of the competency statement.

## Required Response Format
Reply with ONLY a JSON object of this shape, without commentary:

{schema}"#,
            statement = competency.statement(),
            element = optional_line("Element", competency.element()),
            level = competency.level(),
            track = competency.track(),
            specialty = optional_line("Specialty", competency.specialty()),
            duration = competency.duration_label(),
            schema = GRID_SCHEMA,
        );

        if !feedback.is_empty() {
            prompt.push_str(
                "\n\n## Reviewer Findings\nA previous draft was rejected. Address every finding:\n",
            );
            for finding in feedback {
                prompt.push_str("- ");
                prompt.push_str(finding);
                prompt.push('\n');
            }
        }

        if let Some(problem) = repair {
            prompt.push_str(&format!(
                "\n\n## Correction Needed\nYour previous reply could not be used:\n{}\n\nReturn the full corrected JSON object.",
                truncate_output(problem, 4000)
            ));
        }

        prompt
    }
}

fn optional_line(label: &str, value: Option<&str>) -> String {
    match value {
        Some(value) => format!("- **{}**: {}\n", label, value),
        None => String::new(),
    }
}

fn truncate_output(output: &str, max_len: usize) -> &str {
    if output.len() <= max_len {
        return output;
    }
    let mut end = max_len;
    while !output.is_char_boundary(end) {
        end -= 1;
    }
    match output[..end].rfind('\n') {
        Some(pos) => &output[..pos],
        None => &output[..end],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn competency() -> Competency {
        Competency::new("Configurer un réseau local", "BTS", "Réseaux", 90)
            .unwrap()
            .with_specialty("SISR")
    }

    #[test]
    fn test_prompt_carries_competency_fields() {
        let prompt = GenerationPrompts::build(&competency(), &[], None);
        assert!(prompt.contains("Configurer un réseau local"));
        assert!(prompt.contains("**Specialty**: SISR"));
        assert!(!prompt.contains("**Element**"));
        assert!(prompt.contains("1h30"));
        assert!(prompt.contains("\"grading_scale\""));
        assert!(!prompt.contains("Reviewer Findings"));
    }

    #[test]
    fn test_prompt_lists_feedback_and_repair() {
        let feedback = vec!["NI indicators are vague".to_string()];
        let prompt = GenerationPrompts::build(
            &competency(),
            &feedback,
            Some("rubric level NA is missing"),
        );
        assert!(prompt.contains("- NI indicators are vague"));
        assert!(prompt.contains("rubric level NA is missing"));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "é".repeat(10);
        assert!(truncate_output(&text, 5).len() <= 5);
    }
}
