use std::fmt::Write;

use skillassess_model::{Criterion, RubricLevel};

use crate::ExportDocument;

/// Render an export document as Markdown.
///
/// Every value of the JSON form appears in the output; only the layout differs.
pub fn render_markdown(doc: &ExportDocument) -> String {
    let mut out = String::new();
    let grid = &doc.grid;
    let competency = &grid.competency;

    let _ = writeln!(out, "# Assessment Grid\n");
    let _ = writeln!(out, "**Generated**: {}", doc.generated_at.to_rfc3339());
    let status = if doc.critique.accepted {
        "✅ Accepted"
    } else {
        "❌ Not accepted"
    };
    let _ = writeln!(out, "**Critique**: {}\n", status);
    let _ = writeln!(out, "---\n");

    let _ = writeln!(out, "## Competency\n");
    let _ = writeln!(out, "- **Competency**: {}", competency.statement());
    if let Some(element) = competency.element() {
        let _ = writeln!(out, "- **Element**: {}", element);
    }
    let _ = writeln!(out, "- **Level**: {}", competency.level());
    let _ = writeln!(out, "- **Track**: {}", competency.track());
    if let Some(specialty) = competency.specialty() {
        let _ = writeln!(out, "- **Specialty**: {}", specialty);
    }
    let _ = writeln!(
        out,
        "- **Duration**: {} ({} minutes)\n",
        competency.duration_label(),
        competency.duration_minutes()
    );

    let _ = writeln!(out, "## Rubric\n");
    for (level, criteria) in grid.rubric.entries() {
        let _ = writeln!(out, "### {} - {}\n", level, level.label());
        out.push_str(&criteria_table(criteria));
        out.push('\n');
    }

    let scenario = &grid.scenario;
    let _ = writeln!(out, "## Scenario\n");
    for (title, text) in [
        ("Context", &scenario.context),
        ("Task", &scenario.task),
        ("Instructions", &scenario.instructions),
    ] {
        if !text.trim().is_empty() {
            let _ = writeln!(out, "### {}\n\n{}\n", title, text.trim());
        }
    }
    let _ = writeln!(out, "**Duration**: {}\n", competency.duration_label());

    let scale = &grid.grading_scale;
    let _ = writeln!(out, "## Grading Scale\n");
    let _ = writeln!(out, "**Total points**: {}\n", scale.total_points);
    let _ = writeln!(out, "| Level | Range |");
    let _ = writeln!(out, "|-------|-------|");
    for level in RubricLevel::ALL {
        if let Some(band) = scale.band(level) {
            let _ = writeln!(out, "| {} - {} | {} |", level, level.label(), band);
        }
    }
    out.push('\n');

    let _ = writeln!(out, "## Critique\n");
    if let Some(summary) = &doc.critique.summary {
        let _ = writeln!(out, "{}\n", summary);
    }
    for finding in &doc.critique.findings {
        let _ = writeln!(out, "- {}", finding);
    }

    out
}

fn criteria_table(criteria: &[Criterion]) -> String {
    let mut table = String::from("| Criterion | Indicators | Points |\n|-----------|------------|--------|\n");
    for criterion in criteria {
        let indicators = criterion
            .indicators
            .iter()
            .map(|i| format!("• {}", cell(i)))
            .collect::<Vec<_>>()
            .join("<br>");
        let _ = writeln!(
            table,
            "| {} | {} | {} |",
            cell(&criterion.description),
            indicators,
            criterion.points
        );
    }
    table
}

/// Escape a value for use inside a table cell
fn cell(text: &str) -> String {
    text.trim().replace('|', "\\|").replace('\n', "<br>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_escapes_pipes_and_newlines() {
        assert_eq!(cell(" a | b\nc "), "a \\| b<br>c");
    }

    #[test]
    fn test_criteria_table_layout() {
        let table = criteria_table(&[Criterion::new(
            "Cabling",
            vec!["Uses cat6".into(), "Labels ports".into()],
        )
        .with_points(3)]);
        assert!(table.starts_with("| Criterion | Indicators | Points |"));
        assert!(table.contains("| Cabling | • Uses cat6<br>• Labels ports | 3 |"));
    }
}
