use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use skillassess_agent::extract_json_payload;
use skillassess_model::{RubricLevel, ValidationError, Violation};

/// What kind of defect a finding reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefectCategory {
    /// Deterministic structural violation found by validation
    Structural,
    /// Criteria do not match the level they are filed under
    LevelAlignment,
    /// Indicators are generic or not observable
    IndicatorSpecificity,
    /// Scenario does not fit the duration or track
    ScenarioPlausibility,
    /// Bands are unfair, trivially overlapping or inverted
    GradingFairness,
    /// The critique itself could not be completed
    Unvalidated,
    Other,
}

impl DefectCategory {
    /// Map a free-form category label onto a known category
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "structural" | "structure" => DefectCategory::Structural,
            "level_alignment" | "alignment" | "coherence" | "coherence_issues" => {
                DefectCategory::LevelAlignment
            }
            "indicator_specificity" | "specificity" | "indicators" | "observability"
            | "observability_issues" => DefectCategory::IndicatorSpecificity,
            "scenario_plausibility" | "scenario" | "plausibility" | "situation" => {
                DefectCategory::ScenarioPlausibility
            }
            "grading_fairness" | "grading" | "fairness" | "grading_scale" | "scale" => {
                DefectCategory::GradingFairness
            }
            "unvalidated" => DefectCategory::Unvalidated,
            _ => DefectCategory::Other,
        }
    }
}

impl std::fmt::Display for DefectCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DefectCategory::Structural => "structural",
            DefectCategory::LevelAlignment => "level alignment",
            DefectCategory::IndicatorSpecificity => "indicator specificity",
            DefectCategory::ScenarioPlausibility => "scenario plausibility",
            DefectCategory::GradingFairness => "grading fairness",
            DefectCategory::Unvalidated => "unvalidated",
            DefectCategory::Other => "other",
        };
        write!(f, "{}", label)
    }
}

/// A single defect reported against a grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<RubricLevel>,
    /// 1-based position of the criterion within its level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criterion: Option<usize>,
    pub category: DefectCategory,
    pub message: String,
}

impl Finding {
    pub fn new(category: DefectCategory, message: impl Into<String>) -> Self {
        Self {
            level: None,
            criterion: None,
            category,
            message: message.into(),
        }
    }

    pub fn at(mut self, level: RubricLevel, criterion: Option<usize>) -> Self {
        self.level = Some(level);
        self.criterion = criterion;
        self
    }

    pub fn from_violation(violation: &Violation) -> Self {
        Self {
            level: violation.level(),
            criterion: violation.criterion_index().map(|index| index + 1),
            category: DefectCategory::Structural,
            message: violation.to_string(),
        }
    }
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.level, self.criterion) {
            (Some(level), Some(n)) => write!(f, "[{} #{}] ", level, n)?,
            (Some(level), None) => write!(f, "[{}] ", level)?,
            _ => {}
        }
        write!(f, "({}) {}", self.category, self.message)
    }
}

/// The critic's judgment of a candidate grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum CritiqueVerdict {
    /// The grid is pedagogically coherent
    Accepted { summary: String },
    /// The grid has defects; never empty
    Rejected { findings: Vec<Finding> },
}

#[derive(Error, Debug)]
pub enum VerdictParseError {
    #[error("No verdict found in critic output")]
    NoVerdictFound,

    #[error("Ambiguous verdict: both ACCEPTED and REJECTED markers found")]
    AmbiguousVerdict,

    #[error("Failed to parse verdict JSON: {0}")]
    JsonParseError(#[from] serde_json::Error),

    #[error("Invalid verdict format: {0}")]
    InvalidFormat(String),
}

impl CritiqueVerdict {
    /// Rejected verdict carrying every structural violation
    pub fn from_validation(error: &ValidationError) -> Self {
        CritiqueVerdict::Rejected {
            findings: error.violations.iter().map(Finding::from_violation).collect(),
        }
    }

    /// Conservative verdict when the critique could not be completed
    pub fn could_not_validate(detail: &str) -> Self {
        CritiqueVerdict::Rejected {
            findings: vec![Finding::new(
                DefectCategory::Unvalidated,
                format!("Could not validate the grid: {}", detail),
            )],
        }
    }

    /// Parse a verdict from critic output text.
    ///
    /// Preferred format:
    /// ```text
    /// <verdict>
    /// {"verdict": "rejected", "findings": [{"level": "NI", "criterion": 2, "category": "indicator_specificity", "message": "..."}]}
    /// </verdict>
    /// ```
    /// A bare JSON object, the `is_valid` / `*_issues` layout, and plain
    /// `VERDICT: ACCEPTED` style markers are accepted as well.
    pub fn parse(critic_output: &str) -> Result<Self, VerdictParseError> {
        debug!(output_len = critic_output.len(), "Parsing critique verdict");

        if let Some(verdict) = Self::parse_verdict_block(critic_output)? {
            return Ok(verdict);
        }

        if let Some(payload) = extract_json_payload(critic_output) {
            if let Ok(value) = serde_json::from_str::<Value>(payload) {
                return Self::from_json(&value);
            }
        }

        Self::parse_simple_markers(critic_output)
    }

    fn parse_verdict_block(output: &str) -> Result<Option<Self>, VerdictParseError> {
        let start = output.find("<verdict>");
        let end = output.find("</verdict>");

        match (start, end) {
            (Some(start), Some(end)) if start < end => {
                let body = output[start + "<verdict>".len()..end].trim();
                let json = extract_json_payload(body).unwrap_or(body);
                debug!(json, "Found verdict block");
                let value: Value = serde_json::from_str(json)?;
                Self::from_json(&value).map(Some)
            }
            (Some(_), Some(_)) => Err(VerdictParseError::InvalidFormat(
                "Malformed verdict block".to_string(),
            )),
            _ => Ok(None),
        }
    }

    fn from_json(value: &Value) -> Result<Self, VerdictParseError> {
        let obj = value
            .as_object()
            .ok_or_else(|| VerdictParseError::InvalidFormat("expected a JSON object".into()))?;

        let summary = ["summary", "feedback", "comment"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string();

        let accepted = if let Some(label) = ["verdict", "decision", "status", "type"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
        {
            match label.trim().to_lowercase().as_str() {
                "accepted" | "accept" | "valid" | "approved" | "done" => true,
                "rejected" | "reject" | "invalid" | "continue" | "needs_work" => false,
                other => {
                    return Err(VerdictParseError::InvalidFormat(format!(
                        "unknown verdict '{}'",
                        other
                    )))
                }
            }
        } else if let Some(valid) = obj.get("is_valid").and_then(Value::as_bool) {
            valid
        } else {
            return Err(VerdictParseError::InvalidFormat(
                "no verdict or is_valid field".into(),
            ));
        };

        if accepted {
            let summary = if summary.is_empty() {
                "Accepted by critic".to_string()
            } else {
                summary
            };
            return Ok(CritiqueVerdict::Accepted { summary });
        }

        let mut findings = collect_findings(obj);
        if findings.is_empty() {
            let message = if summary.is_empty() {
                "Rejected without stated findings".to_string()
            } else {
                summary
            };
            findings.push(Finding::new(DefectCategory::Other, message));
        }
        Ok(CritiqueVerdict::Rejected { findings })
    }

    fn parse_simple_markers(output: &str) -> Result<Self, VerdictParseError> {
        let upper = output.to_uppercase();

        let accept_markers = ["VERDICT: ACCEPTED", "[ACCEPTED]", "GRID IS VALID"];
        let reject_markers = ["VERDICT: REJECTED", "[REJECTED]", "GRID IS INVALID"];

        let has_accept = accept_markers.iter().any(|m| upper.contains(m));
        let has_reject = reject_markers.iter().any(|m| upper.contains(m));

        match (has_accept, has_reject) {
            (true, false) => Ok(CritiqueVerdict::Accepted {
                summary: "Grid marked as accepted by critic".into(),
            }),
            (false, true) => Ok(CritiqueVerdict::Rejected {
                findings: vec![Finding::new(DefectCategory::Other, excerpt(output))],
            }),
            (true, true) => Err(VerdictParseError::AmbiguousVerdict),
            (false, false) => Err(VerdictParseError::NoVerdictFound),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, CritiqueVerdict::Accepted { .. })
    }

    pub fn findings(&self) -> &[Finding] {
        match self {
            CritiqueVerdict::Accepted { .. } => &[],
            CritiqueVerdict::Rejected { findings } => findings,
        }
    }

    /// Findings rendered one per line, for regeneration feedback and summaries
    pub fn feedback_lines(&self) -> Vec<String> {
        self.findings().iter().map(ToString::to_string).collect()
    }

    /// Get a short description of the verdict for logging
    pub fn short_description(&self) -> String {
        match self {
            CritiqueVerdict::Accepted { .. } => "ACCEPTED".to_string(),
            CritiqueVerdict::Rejected { findings } => {
                format!("REJECTED ({} findings)", findings.len())
            }
        }
    }
}

fn collect_findings(obj: &Map<String, Value>) -> Vec<Finding> {
    let mut findings = Vec::new();

    if let Some(items) = ["findings", "issues", "defects"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_array))
    {
        findings.extend(items.iter().filter_map(|item| finding_from_json(item, DefectCategory::Other)));
    }

    for (key, category) in [
        ("observability_issues", DefectCategory::IndicatorSpecificity),
        ("coherence_issues", DefectCategory::LevelAlignment),
        ("scenario_issues", DefectCategory::ScenarioPlausibility),
        ("grading_issues", DefectCategory::GradingFairness),
    ] {
        if let Some(items) = obj.get(key).and_then(Value::as_array) {
            findings.extend(items.iter().filter_map(|item| finding_from_json(item, category)));
        }
    }

    findings
}

fn finding_from_json(item: &Value, default_category: DefectCategory) -> Option<Finding> {
    match item {
        Value::String(message) if !message.trim().is_empty() => {
            Some(Finding::new(default_category, message.trim()))
        }
        Value::Object(obj) => {
            let message = ["message", "description", "issue", "detail"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_str))?
                .trim();
            if message.is_empty() {
                return None;
            }
            let category = obj
                .get("category")
                .and_then(Value::as_str)
                .map(DefectCategory::from_label)
                .unwrap_or(default_category);
            let level = obj
                .get("level")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<RubricLevel>().ok());
            let criterion = obj
                .get("criterion")
                .and_then(|v| match v {
                    Value::Number(n) => n.as_u64(),
                    Value::String(s) => s.trim().trim_start_matches('#').parse().ok(),
                    _ => None,
                })
                .filter(|n| *n > 0)
                .map(|n| n as usize);
            Some(Finding {
                level,
                criterion: level.and(criterion),
                category,
                message: message.to_string(),
            })
        }
        _ => None,
    }
}

fn excerpt(output: &str) -> String {
    let trimmed = output.trim();
    match trimmed.char_indices().nth(500) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepted_block() {
        let output = r#"
The grid is coherent.

<verdict>
{"verdict": "accepted", "summary": "Levels progress clearly"}
</verdict>
"#;
        let verdict = CritiqueVerdict::parse(output).unwrap();
        assert_eq!(
            verdict,
            CritiqueVerdict::Accepted {
                summary: "Levels progress clearly".into()
            }
        );
    }

    #[test]
    fn test_parse_rejected_block_with_located_findings() {
        let output = r#"<verdict>
{"verdict": "rejected", "findings": [
  {"level": "NI", "criterion": 2, "category": "indicator_specificity", "message": "Indicator is generic"},
  {"category": "scenario plausibility", "message": "Too long for 60 minutes"}
]}
</verdict>"#;
        let verdict = CritiqueVerdict::parse(output).unwrap();
        let findings = verdict.findings();
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].level, Some(RubricLevel::InProgress));
        assert_eq!(findings[0].criterion, Some(2));
        assert_eq!(findings[0].category, DefectCategory::IndicatorSpecificity);
        assert_eq!(findings[1].category, DefectCategory::ScenarioPlausibility);
        assert_eq!(findings[1].level, None);
        assert_eq!(
            findings[0].to_string(),
            "[NI #2] (indicator specificity) Indicator is generic"
        );
    }

    #[test]
    fn test_parse_is_valid_layout() {
        let output = r#"```json
{"is_valid": false, "alignment_score": "weak",
 "observability_issues": ["'Understands' is not observable"],
 "coherence_issues": ["NA criteria repeat NI"],
 "feedback": "Rework indicators"}
```"#;
        let verdict = CritiqueVerdict::parse(output).unwrap();
        let categories: Vec<_> = verdict.findings().iter().map(|f| f.category).collect();
        assert_eq!(
            categories,
            vec![
                DefectCategory::IndicatorSpecificity,
                DefectCategory::LevelAlignment
            ]
        );

        let accepted = CritiqueVerdict::parse(r#"{"is_valid": true, "feedback": "Fine"}"#).unwrap();
        assert!(accepted.is_accepted());
    }

    #[test]
    fn test_rejection_without_findings_keeps_feedback() {
        let verdict =
            CritiqueVerdict::parse(r#"{"verdict": "rejected", "summary": "Scale is unfair"}"#)
                .unwrap();
        assert_eq!(verdict.findings().len(), 1);
        assert_eq!(verdict.findings()[0].message, "Scale is unfair");
    }

    #[test]
    fn test_parse_simple_markers() {
        assert!(CritiqueVerdict::parse("VERDICT: ACCEPTED").unwrap().is_accepted());
        assert!(!CritiqueVerdict::parse("Verdict: rejected, indicators vague")
            .unwrap()
            .is_accepted());
        assert!(matches!(
            CritiqueVerdict::parse("[ACCEPTED] ... [REJECTED]"),
            Err(VerdictParseError::AmbiguousVerdict)
        ));
        assert!(matches!(
            CritiqueVerdict::parse("The grid looks interesting."),
            Err(VerdictParseError::NoVerdictFound)
        ));
    }

    #[test]
    fn test_unknown_verdict_label_is_error() {
        assert!(matches!(
            CritiqueVerdict::parse(r#"{"verdict": "maybe"}"#),
            Err(VerdictParseError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_from_validation_maps_locations() {
        let error = ValidationError {
            violations: vec![
                Violation::NoIndicators {
                    level: RubricLevel::Achieved,
                    index: 0,
                },
                Violation::ZeroTotalPoints,
            ],
        };
        let verdict = CritiqueVerdict::from_validation(&error);
        let findings = verdict.findings();
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].level, Some(RubricLevel::Achieved));
        assert_eq!(findings[0].criterion, Some(1));
        assert!(findings
            .iter()
            .all(|f| f.category == DefectCategory::Structural));
    }

    #[test]
    fn test_structural_finding_position_matches_message() {
        let finding = Finding::from_violation(&Violation::NoIndicators {
            level: RubricLevel::Achieved,
            index: 0,
        });
        assert_eq!(
            finding.to_string(),
            "[NA #1] (structural) criterion 1 of level NA has no indicators"
        );
    }

    #[test]
    fn test_could_not_validate_is_rejected() {
        let verdict = CritiqueVerdict::could_not_validate("no verdict found");
        assert!(!verdict.is_accepted());
        assert_eq!(verdict.findings()[0].category, DefectCategory::Unvalidated);
        assert_eq!(verdict.short_description(), "REJECTED (1 findings)");
    }
}
