use skillassess_model::AssessmentGrid;

/// Prompt templates for the critic
pub struct CritiquePrompts;

impl CritiquePrompts {
    /// Build the critique prompt for a structurally valid grid.
    ///
    /// `grid_json` is the serialized form of `grid`.
    pub fn build_critique_prompt(grid: &AssessmentGrid, grid_json: &str) -> String {
        let competency = &grid.competency;
        format!(
            r#"You are a rigorous reviewer of competency-based (APC) assessment grids. Your job is to decide whether the grid below is pedagogically coherent.

## Context
- **Competency**: {statement}
- **Level**: {level}
- **Track**: {track}
- **Duration**: {duration}

## Candidate Grid
```json
{grid}
```

---

## Checklist

1. **Level alignment**: ND criteria describe what a learner who has not acquired the competency shows, NI partial mastery, NA full mastery. Criteria filed under the wrong level are defects.
2. **Indicator specificity**: Every indicator is observable and specific to this competency. Generic filler ("understands the topic", "works well") is a defect.
3. **Scenario plausibility**: The scenario can be completed in {duration} by a learner at the {level} level of the {track} track.
4. **Grading fairness**: Bands are ordered ND < NI < NA, neither trivially narrow nor overlapping, and criterion points are consistent with the band they lead to.

Structure has already been checked. Judge only the points above.

---

## Required Response Format

End your response with a verdict block.

**If the grid is coherent:**
<verdict>
{{"verdict": "accepted", "summary": "One or two sentences on why the grid is sound"}}
</verdict>

**If the grid has defects:**
<verdict>
{{"verdict": "rejected", "findings": [{{"level": "NI", "criterion": 2, "category": "indicator_specificity", "message": "What is wrong and how to fix it"}}]}}
</verdict>

`level` is ND, NI or NA and `criterion` is the 1-based position within that level; omit both for findings about the scenario or the whole scale. `category` is one of level_alignment, indicator_specificity, scenario_plausibility, grading_fairness."#,
            statement = competency.statement(),
            level = competency.level(),
            track = competency.track(),
            duration = competency.duration_label(),
            grid = grid_json,
        )
    }

    /// Build the corrective note appended after an unparseable critique
    pub fn build_repair_note(problem: &str) -> String {
        format!(
            "\n\n## Correction Needed\nYour previous reply could not be read: {}\nReply again and end with exactly one <verdict> block.",
            problem
        )
    }
}
