//! Overall technical conclusion from all element analyses.

use std::sync::Arc;

use serde_json::Value;

use super::client::{GenerationOptions, VisionClient};
use super::parser::parse_reply;
use crate::models::analysis::{normalize_defects, text_value, DEFECT_SEPARATOR, EMPTY_MARKER};
use crate::models::{ConclusionSummary, ElementAnalysis};

const CONCLUSION_SYSTEM_PROMPT: &str = "You are a building technical inspection engineer \
writing the conclusion of an inspection report. Be concise and factual.";

/// Text material handed to the model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisDigest {
    /// One line per analyzed photo: `"{label} (photo {n}): {description}"`.
    pub summary_lines: Vec<String>,
    /// One entry per element that has defects: `"{label}: {defects}"`.
    pub defects: Vec<String>,
}

impl AnalysisDigest {
    pub fn is_empty(&self) -> bool {
        self.summary_lines.is_empty()
    }
}

pub fn digest(analyses: &[ElementAnalysis]) -> AnalysisDigest {
    let mut out = AnalysisDigest::default();
    for analysis in analyses {
        let label = analysis.category.label();
        let mut element_defects = Vec::new();
        for record in &analysis.records {
            out.summary_lines.push(format!(
                "{label} (photo {}): {}",
                record.index + 1,
                record.description
            ));
            if !record.defects.is_empty() {
                element_defects.push(record.defects.as_str());
            }
        }
        if !element_defects.is_empty() {
            out.defects
                .push(format!("{label}: {}", element_defects.join(DEFECT_SEPARATOR)));
        }
    }
    out
}

pub fn conclusion_prompt(digest: &AnalysisDigest) -> String {
    let defects = if digest.defects.is_empty() {
        "none recorded".to_string()
    } else {
        digest.defects.join(DEFECT_SEPARATOR)
    };
    format!(
        "Inspection findings by photo:\n{summary}\n\nDefects by element: {defects}\n\n\
         Write the overall conclusion as a JSON object with the keys:\n\
         - overall_state: condition of the building as a whole\n\
         - defects: the main defects, or an empty string\n\
         - recommendations: what should be done\n\
         Reply with the JSON object only.",
        summary = digest.summary_lines.join("\n"),
    )
}

pub struct ConclusionSynthesizer {
    client: Arc<dyn VisionClient>,
}

impl ConclusionSynthesizer {
    pub fn new(client: Arc<dyn VisionClient>) -> Self {
        Self { client }
    }

    /// Build the conclusion. No model call is made when nothing was analyzed;
    /// a failed call or unreadable reply yields the error summary.
    pub fn synthesize(&self, analyses: &[ElementAnalysis]) -> ConclusionSummary {
        let digest = digest(analyses);
        if digest.is_empty() {
            return ConclusionSummary::no_data();
        }

        let _span = tracing::info_span!(
            "conclusion",
            photos = digest.summary_lines.len(),
            elements_with_defects = digest.defects.len(),
        )
        .entered();

        let raw = match self.client.chat_with_images(
            &conclusion_prompt(&digest),
            &[],
            Some(CONCLUSION_SYSTEM_PROMPT),
            &GenerationOptions::CONCLUSION,
        ) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "Conclusion call failed");
                return ConclusionSummary::generation_failed();
            }
        };

        match summary_from_reply(&raw) {
            Some(summary) => summary,
            None => {
                tracing::warn!(raw = %raw, "Conclusion reply unreadable");
                ConclusionSummary::generation_failed()
            }
        }
    }
}

fn summary_from_reply(raw: &str) -> Option<ConclusionSummary> {
    let Value::Object(map) = parse_reply(raw).ok()? else {
        return None;
    };
    let text_or_marker = |key: &str| {
        map.get(key)
            .and_then(text_value)
            .unwrap_or_else(|| EMPTY_MARKER.to_string())
    };
    let defects = map
        .get("defects")
        .map(normalize_defects)
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| EMPTY_MARKER.to_string());

    Some(ConclusionSummary {
        overall_state: text_or_marker("overall_state"),
        defects,
        recommendations: text_or_marker("recommendations"),
    })
}
