//! # skillassess-export
//!
//! Writes accepted assessment grids to disk as a JSON document and a Markdown
//! rendering of the same content.

mod exporter;
mod markdown;
mod naming;

pub use exporter::{CritiqueRecord, ExportDocument, ExportError, ExportPaths, Exporter};
pub use markdown::render_markdown;
pub use naming::file_stem;
