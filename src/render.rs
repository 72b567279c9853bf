//! Report rendering.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::pipeline::report::ReportPayload;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A rendered report file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedReport {
    pub path: PathBuf,
    pub file_name: String,
    pub size_bytes: u64,
}

pub trait ReportRenderer: Send + Sync {
    fn render(&self, payload: &ReportPayload) -> Result<RenderedReport, RenderError>;

    /// Delete a report that will not be delivered.
    fn discard(&self, report: &RenderedReport) -> Result<(), RenderError> {
        match std::fs::remove_file(&report.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Writes the payload as pretty JSON to
/// `<dir>/conclusion_<YYYYmmdd_HHMMSS>_<id>.json`.
pub struct JsonReportRenderer {
    output_dir: PathBuf,
}

impl JsonReportRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self, RenderError> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

pub fn report_file_name(payload: &ReportPayload) -> String {
    let id = payload.header.report_id.simple().to_string();
    format!(
        "conclusion_{}_{}.json",
        payload.header.generated_at.format("%Y%m%d_%H%M%S"),
        &id[..8]
    )
}

impl ReportRenderer for JsonReportRenderer {
    fn render(&self, payload: &ReportPayload) -> Result<RenderedReport, RenderError> {
        let file_name = report_file_name(payload);
        let path = self.output_dir.join(&file_name);
        let bytes = serde_json::to_vec_pretty(payload)?;
        std::fs::write(&path, &bytes)?;

        tracing::info!(
            path = %path.display(),
            size = bytes.len(),
            "Report written"
        );
        Ok(RenderedReport {
            path,
            file_name,
            size_bytes: bytes.len() as u64,
        })
    }
}
