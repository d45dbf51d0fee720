use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

use skillassess_critic::{CritiqueVerdict, Finding};
use skillassess_model::AssessmentGrid;

use crate::{file_stem, render_markdown};

/// Critique attached to an exported grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CritiqueRecord {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub findings: Vec<Finding>,
}

impl From<&CritiqueVerdict> for CritiqueRecord {
    fn from(verdict: &CritiqueVerdict) -> Self {
        match verdict {
            CritiqueVerdict::Accepted { summary } => Self {
                accepted: true,
                summary: Some(summary.clone()),
                findings: Vec::new(),
            },
            CritiqueVerdict::Rejected { findings } => Self {
                accepted: false,
                summary: None,
                findings: findings.clone(),
            },
        }
    }
}

/// The JSON artifact: the grid's stable keys plus export metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    #[serde(flatten)]
    pub grid: AssessmentGrid,
    pub generated_at: DateTime<Utc>,
    pub critique: CritiqueRecord,
}

impl ExportDocument {
    pub fn new(grid: AssessmentGrid, critique: &CritiqueVerdict) -> Self {
        Self {
            grid,
            generated_at: Utc::now(),
            critique: critique.into(),
        }
    }
}

/// Paths of the artifacts written for one grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportPaths {
    pub json: PathBuf,
    pub markdown: PathBuf,
}

/// Writing the artifacts failed. The grid is kept so export can be retried
/// without regenerating it.
#[derive(Error, Debug)]
#[error("Failed to export grid to {}: {source}", path.display())]
pub struct ExportError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
    pub grid: Box<AssessmentGrid>,
}

impl ExportError {
    pub fn into_grid(self) -> AssessmentGrid {
        *self.grid
    }
}

/// Writes grids as JSON and Markdown into an output directory
pub struct Exporter {
    output_dir: PathBuf,
}

impl Exporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Paths the artifacts for `grid` would be written to
    pub fn paths_for(&self, grid: &AssessmentGrid) -> ExportPaths {
        let stem = file_stem(&grid.competency);
        ExportPaths {
            json: self.output_dir.join(format!("{}.json", stem)),
            markdown: self.output_dir.join(format!("{}.md", stem)),
        }
    }

    /// Write both artifacts.
    ///
    /// Each file is written to a temporary file in the output directory and
    /// renamed into place, so a failure never leaves a partial artifact.
    pub fn export(
        &self,
        grid: &AssessmentGrid,
        critique: &CritiqueVerdict,
    ) -> Result<ExportPaths, ExportError> {
        let paths = self.paths_for(grid);
        let fail = |path: &Path, source: io::Error| ExportError {
            path: path.to_path_buf(),
            source,
            grid: Box::new(grid.clone()),
        };

        std::fs::create_dir_all(&self.output_dir).map_err(|e| fail(&self.output_dir, e))?;

        let doc = ExportDocument::new(grid.clone(), critique);
        let json = serde_json::to_string_pretty(&doc)
            .map_err(|e| fail(&paths.json, io::Error::new(io::ErrorKind::InvalidData, e)))?;
        let markdown = render_markdown(&doc);

        let json_tmp = self
            .stage(json.as_bytes())
            .map_err(|e| fail(&paths.json, e))?;
        let markdown_tmp = self
            .stage(markdown.as_bytes())
            .map_err(|e| fail(&paths.markdown, e))?;

        json_tmp
            .persist(&paths.json)
            .map_err(|e| fail(&paths.json, e.error))?;
        if let Err(e) = markdown_tmp.persist(&paths.markdown) {
            // Keep the pair consistent: no JSON without its Markdown
            let _ = std::fs::remove_file(&paths.json);
            return Err(fail(&paths.markdown, e.error));
        }

        info!(
            json = %paths.json.display(),
            markdown = %paths.markdown.display(),
            "Exported assessment grid"
        );
        Ok(paths)
    }

    fn stage(&self, content: &[u8]) -> io::Result<NamedTempFile> {
        let mut file = NamedTempFile::new_in(&self.output_dir)?;
        file.write_all(content)?;
        file.as_file().sync_all()?;
        debug!(path = %file.path().display(), bytes = content.len(), "Staged export");
        Ok(file)
    }
}
