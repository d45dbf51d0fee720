//! Tolerant parsing of a drafted grid.
//!
//! Models drift from the requested shape: fenced JSON, an extra wrapping
//! object, `nd_criteria` instead of `ND`, a level list instead of a map,
//! `[min, max]` pairs instead of band objects, and so on. This module accepts
//! that wobble, but a reply that lacks the rubric, the scenario, or the
//! grading scale altogether is rejected.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use skillassess_agent::extract_json_payload;
use skillassess_model::{
    AssessmentGrid, Competency, Criterion, GradingScale, Rubric, RubricLevel, Scenario, ScoreBand,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("No JSON object found in model output")]
    NoJson,

    #[error("Model output is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Model output is missing the required '{0}' section")]
    MissingField(&'static str),

    #[error("Section '{field}' is malformed: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

const ENVELOPE_KEYS: &[&str] = &["assessment", "assessment_grid", "result", "output", "data"];
const RUBRIC_KEYS: &[&str] = &["rubric", "grid", "criteria", "levels", "apc_grid"];
const SCENARIO_KEYS: &[&str] = &["scenario", "situation", "evaluation_situation", "evaluation_scenario"];
const GRADING_KEYS: &[&str] = &["grading_scale", "grading", "scoring", "scale", "scoring_rubric"];

/// Parse raw model text into a grid for `competency`.
///
/// The competency is never taken from the model: the captured record is
/// attached as-is.
pub fn parse_grid(raw: &str, competency: &Competency) -> Result<AssessmentGrid, ParseError> {
    let payload = extract_json_payload(raw).ok_or(ParseError::NoJson)?;
    let value: Value =
        serde_json::from_str(payload).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
    let root = unwrap_envelope(&value).ok_or(ParseError::InvalidField {
        field: "root",
        reason: "expected a JSON object".into(),
    })?;

    let rubric = find_rubric(root)?;
    let scenario = find_scenario(root)?;
    let grading_scale = find_grading_scale(root)?;

    debug!(
        criteria = rubric.criterion_count(),
        total_points = grading_scale.total_points,
        "Parsed grid draft"
    );

    Ok(AssessmentGrid::new(
        competency.clone(),
        rubric,
        scenario,
        grading_scale,
    ))
}

/// Descend through single-key wrappers such as `{"assessment": {...}}`
fn unwrap_envelope(value: &Value) -> Option<&Map<String, Value>> {
    let mut current = value.as_object()?;
    for _ in 0..3 {
        let has_section = RUBRIC_KEYS
            .iter()
            .chain(SCENARIO_KEYS)
            .chain(GRADING_KEYS)
            .any(|k| current.contains_key(*k));
        if has_section {
            break;
        }
        let inner = ENVELOPE_KEYS
            .iter()
            .find_map(|k| current.get(*k).and_then(Value::as_object))
            .or_else(|| {
                let mut values = current.values();
                match (values.next(), values.next()) {
                    (Some(only), None) => only.as_object(),
                    _ => None,
                }
            });
        match inner {
            Some(inner) => current = inner,
            None => break,
        }
    }
    Some(current)
}

fn get_any<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

// ------------------------------------------------------------------
// Rubric
// ------------------------------------------------------------------

fn find_rubric(root: &Map<String, Value>) -> Result<Rubric, ParseError> {
    for key in RUBRIC_KEYS {
        if let Some(value) = root.get(*key) {
            if value.as_object().is_some_and(looks_like_scale) {
                continue;
            }
            if let Some(rubric) = rubric_from_value(value)? {
                return Ok(rubric);
            }
        }
    }
    // Levels placed directly at the top level
    let top_level = Value::Object(root.clone());
    rubric_from_value(&top_level)?.ok_or(ParseError::MissingField("rubric"))
}

/// `Ok(None)` when the value does not look like a rubric at all
fn rubric_from_value(value: &Value) -> Result<Option<Rubric>, ParseError> {
    let mut rubric = Rubric::new();
    match value {
        Value::Object(map) => {
            for (key, entry) in map {
                let Ok(level) = key.parse::<RubricLevel>() else {
                    continue;
                };
                let criteria = match entry {
                    Value::Array(items) => items,
                    Value::Object(inner) => match inner.get("criteria").and_then(Value::as_array) {
                        Some(items) => items,
                        None => continue,
                    },
                    _ => continue,
                };
                rubric.push(level, parse_criteria(criteria)?);
            }
        }
        Value::Array(entries) => {
            for entry in entries {
                let Some(obj) = entry.as_object() else {
                    continue;
                };
                let level = obj
                    .get("level")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<RubricLevel>().ok());
                let criteria = obj.get("criteria").and_then(Value::as_array);
                if let (Some(level), Some(criteria)) = (level, criteria) {
                    rubric.push(level, parse_criteria(criteria)?);
                }
            }
        }
        _ => return Ok(None),
    }

    if rubric.entries().is_empty() {
        Ok(None)
    } else {
        Ok(Some(rubric))
    }
}

fn parse_criteria(items: &[Value]) -> Result<Vec<Criterion>, ParseError> {
    items.iter().map(parse_criterion).collect()
}

fn parse_criterion(item: &Value) -> Result<Criterion, ParseError> {
    match item {
        Value::String(description) => Ok(Criterion::new(description.clone(), Vec::new())),
        Value::Object(obj) => {
            let description = get_any(obj, &["description", "criterion", "name", "title"])
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let indicators = match get_any(obj, &["indicators", "indicator", "indicateurs"]) {
                Some(Value::Array(items)) => items.iter().filter_map(text_of).collect(),
                Some(Value::String(single)) => vec![single.clone()],
                _ => Vec::new(),
            };
            let points = obj.get("points").map(number_of).transpose()?.unwrap_or(0);
            Ok(Criterion::new(description, indicators).with_points(points))
        }
        other => Err(ParseError::InvalidField {
            field: "rubric",
            reason: format!("criterion must be an object or string, got {}", other),
        }),
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => get_any(obj, &["description", "text", "indicator"])
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

fn number_of(value: &Value) -> Result<u32, ParseError> {
    let invalid = || ParseError::InvalidField {
        field: "points",
        reason: format!("expected a non-negative integer, got {}", value),
    };
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(invalid),
        Value::String(s) => s.trim().parse().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

// ------------------------------------------------------------------
// Scenario
// ------------------------------------------------------------------

fn find_scenario(root: &Map<String, Value>) -> Result<Scenario, ParseError> {
    match get_any(root, SCENARIO_KEYS) {
        Some(Value::Object(obj)) => {
            let field = |keys: &[&str]| {
                get_any(obj, keys)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            Ok(Scenario::new(
                field(&["context", "contexte"]),
                field(&["task", "tache"]),
                field(&["instructions", "consignes"]),
            ))
        }
        Some(Value::String(text)) => Ok(Scenario::new("", "", text.clone())),
        Some(other) => Err(ParseError::InvalidField {
            field: "scenario",
            reason: format!("expected an object or text, got {}", other),
        }),
        None => Err(ParseError::MissingField("scenario")),
    }
}

// ------------------------------------------------------------------
// Grading scale
// ------------------------------------------------------------------

fn find_grading_scale(root: &Map<String, Value>) -> Result<GradingScale, ParseError> {
    let candidate = get_any(root, GRADING_KEYS)
        .and_then(Value::as_object)
        // A scoring block filed under "rubric" next to a "grid"
        .or_else(|| {
            root.get("rubric")
                .and_then(Value::as_object)
                .filter(|obj| looks_like_scale(obj))
        })
        .ok_or(ParseError::MissingField("grading_scale"))?;

    let band_source = candidate
        .get("bands")
        .and_then(Value::as_object)
        .unwrap_or(candidate);

    let mut scale = GradingScale::default();
    for (key, value) in band_source {
        if let Ok(level) = key.parse::<RubricLevel>() {
            scale.bands.insert(level, parse_band(value)?);
        }
    }

    scale.total_points = match get_any(candidate, &["total_points", "total", "max_points"]) {
        Some(value) => number_of(value)?,
        None => scale.bands.values().map(|b| b.max).max().unwrap_or(0),
    };

    if scale.bands.is_empty() {
        return Err(ParseError::InvalidField {
            field: "grading_scale",
            reason: "no score bands found".into(),
        });
    }
    Ok(scale)
}

fn looks_like_scale(obj: &Map<String, Value>) -> bool {
    obj.contains_key("total_points") || obj.keys().any(|k| k.ends_with("_range"))
}

fn parse_band(value: &Value) -> Result<ScoreBand, ParseError> {
    let invalid = |reason: String| ParseError::InvalidField {
        field: "grading_scale",
        reason,
    };
    match value {
        Value::Array(pair) if pair.len() == 2 => {
            Ok(ScoreBand::new(number_of(&pair[0])?, number_of(&pair[1])?))
        }
        Value::Object(obj) => {
            let min = get_any(obj, &["min", "from", "low"]).ok_or_else(|| invalid("band without min".into()))?;
            let max = get_any(obj, &["max", "to", "high"]).ok_or_else(|| invalid("band without max".into()))?;
            Ok(ScoreBand::new(number_of(min)?, number_of(max)?))
        }
        Value::String(text) => {
            let (min, max) = text
                .split_once('-')
                .ok_or_else(|| invalid(format!("cannot read band '{}'", text)))?;
            Ok(ScoreBand::new(
                number_of(&Value::String(min.to_string()))?,
                number_of(&Value::String(max.to_string()))?,
            ))
        }
        other => Err(invalid(format!("cannot read band {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn competency() -> Competency {
        Competency::new("Configure a LAN", "intermediate", "networking", 60).unwrap()
    }

    const CANONICAL: &str = r#"{
        "rubric": {
            "ND": [{"description": "Cabling", "indicators": ["Wrong cable"], "points": 2}],
            "NI": [{"description": "Addressing", "indicators": ["Partial plan"], "points": 3}],
            "NA": [{"description": "VLANs", "indicators": ["All VLANs work"], "points": 5}]
        },
        "scenario": {"context": "A networking firm", "task": "Set up", "instructions": "Go"},
        "grading_scale": {"total_points": 20, "bands": {
            "ND": {"min": 0, "max": 9}, "NI": {"min": 10, "max": 14}, "NA": {"min": 15, "max": 20}
        }}
    }"#;

    #[test]
    fn test_parse_canonical_shape() {
        let grid = parse_grid(CANONICAL, &competency()).unwrap();
        assert_eq!(grid.rubric.criterion_count(), 3);
        assert_eq!(grid.scenario.task, "Set up");
        assert_eq!(grid.grading_scale.total_points, 20);
        assert_eq!(
            grid.grading_scale.band(RubricLevel::InProgress),
            Some(ScoreBand::new(10, 14))
        );
        assert_eq!(grid.competency, competency());
    }

    #[test]
    fn test_parse_fenced_and_wrapped() {
        let raw = format!("Sure!\n```json\n{{\"assessment\": {}}}\n```", CANONICAL);
        let grid = parse_grid(&raw, &competency()).unwrap();
        assert_eq!(grid.rubric.criterion_count(), 3);
    }

    #[test]
    fn test_parse_legacy_grid_and_rubric_layout() {
        let raw = r#"{
            "grid": {
                "nd_criteria": [{"description": "a", "indicators": ["x", "y"], "points": "2"}],
                "ni_criteria": [{"criterion": "b", "indicators": "single"}],
                "na_criteria": ["c"]
            },
            "situation": {"contexte": "networking lab", "task": "t", "instructions": "i"},
            "rubric": {"total_points": 20, "nd_range": [0, 6], "ni_range": [7, 13], "na_range": "14-20"}
        }"#;
        let grid = parse_grid(raw, &competency()).unwrap();

        let nd = grid.rubric.criteria(RubricLevel::NotAchieved).unwrap();
        assert_eq!(nd[0].points, 2);
        assert_eq!(nd[0].indicators, vec!["x", "y"]);
        let ni = grid.rubric.criteria(RubricLevel::InProgress).unwrap();
        assert_eq!(ni[0].description, "b");
        assert_eq!(ni[0].indicators, vec!["single"]);
        let na = grid.rubric.criteria(RubricLevel::Achieved).unwrap();
        assert!(na[0].indicators.is_empty());

        assert_eq!(grid.scenario.context, "networking lab");
        assert_eq!(
            grid.grading_scale.band(RubricLevel::Achieved),
            Some(ScoreBand::new(14, 20))
        );
    }

    #[test]
    fn test_parse_level_list_keeps_duplicates() {
        let raw = r#"{
            "rubric": [
                {"level": "ND", "criteria": [{"description": "a", "indicators": ["x"]}]},
                {"level": "ND", "criteria": [{"description": "b", "indicators": ["y"]}]},
                {"level": "NA", "criteria": [{"description": "c", "indicators": ["z"]}]}
            ],
            "scenario": "Networking instructions",
            "grading_scale": {"ND": [0, 9], "NI": [10, 14], "NA": [15, 20]}
        }"#;
        let grid = parse_grid(raw, &competency()).unwrap();
        assert_eq!(grid.rubric.occurrences(RubricLevel::NotAchieved), 2);
        assert_eq!(grid.rubric.occurrences(RubricLevel::InProgress), 0);
        assert_eq!(grid.scenario.instructions, "Networking instructions");
        assert_eq!(grid.grading_scale.total_points, 20);
    }

    #[test]
    fn test_rejects_missing_sections() {
        let raw = r#"{"rubric": {"ND": []}, "grading_scale": {"ND": [0, 20]}}"#;
        assert_eq!(
            parse_grid(raw, &competency()),
            Err(ParseError::MissingField("scenario"))
        );

        let raw = r#"{"scenario": "x", "grading_scale": {"ND": [0, 20]}}"#;
        assert_eq!(
            parse_grid(raw, &competency()),
            Err(ParseError::MissingField("rubric"))
        );

        let raw = r#"{"rubric": {"ND": []}, "scenario": "x"}"#;
        assert_eq!(
            parse_grid(raw, &competency()),
            Err(ParseError::MissingField("grading_scale"))
        );
    }

    #[test]
    fn test_rejects_non_json() {
        assert_eq!(parse_grid("I cannot help", &competency()), Err(ParseError::NoJson));
        assert!(matches!(
            parse_grid("{not json}", &competency()),
            Err(ParseError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_rejects_negative_points() {
        let raw = CANONICAL.replace("\"points\": 2", "\"points\": -2");
        assert!(matches!(
            parse_grid(&raw, &competency()),
            Err(ParseError::InvalidField { field: "points", .. })
        ));
    }
}
