//! Report assembly.
//!
//! Turns a finished session into the structured conclusion: object details
//! from the extracted fields, one section per building element with its
//! photo analyses, the element states, the overall conclusion and the
//! signature block. Rendering the payload to a file is the renderer's job.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::batch::BatchAnalyzer;
use super::client::VisionClient;
use super::conclusion::ConclusionSynthesizer;
use crate::models::{AnalysisRecord, Category, ConclusionSummary, ElementAnalysis};
use crate::session::Session;
use crate::storage::{PhotoStore, StorageError};

pub const REPORT_TITLE: &str = "TECHNICAL CONCLUSION № QAZ-__/__-__";
pub const SUBJECT: &str = "Technical inspection of the condition of building structures";

const NOT_RECOGNIZED: &str = "not recognized";
const NOT_SPECIFIED: &str = "not specified";
const DEFAULT_ELEMENT_STATE: &str = "unsatisfactory";
const COMPLEXITY_UNDETERMINED: &str = "not determined";

// ──────────────────────────────────────────────
// Payload
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ReportPayload {
    pub header: ReportHeader,
    pub organization: Organization,
    pub object: ObjectDetails,
    pub sections: Vec<ElementSection>,
    pub element_states: Vec<ElementState>,
    pub conclusion: ConclusionSummary,
    pub signatures: Vec<SignatureLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportHeader {
    pub title: &'static str,
    pub subject: &'static str,
    pub report_id: Uuid,
    pub client_id: String,
    pub generated_at: DateTime<Utc>,
}

/// Owner and property details. Missing values carry a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectDetails {
    pub full_name: String,
    pub id_number: String,
    pub id_date: String,
    pub address: String,
    pub cadastral_number: String,
    pub build_year: String,
    pub purpose: String,
    /// Not read from any document; the inspector fills it in.
    pub complexity_category: String,
}

/// The inspecting organization and its accreditation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Organization {
    pub name: &'static str,
    pub bin: &'static str,
    pub accreditation: &'static str,
    pub scope: &'static str,
}

pub fn organization() -> Organization {
    Organization {
        name: "Qazlife LLP",
        bin: "171140033560",
        accreditation: "KZ23VWC00067014 of 09.04.2024",
        scope: "Technical inspection of the reliability and stability of buildings and structures \
                on technically and technologically complex objects of the first and second levels of responsibility",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    NoPhotosProvided,
    Analyzed,
    AnalysisUnavailable,
}

impl SectionStatus {
    pub fn as_text(&self) -> &'static str {
        match self {
            Self::NoPhotosProvided => "no photos provided",
            Self::Analyzed => "analyzed",
            Self::AnalysisUnavailable => "analysis unavailable",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ElementSection {
    pub category: Category,
    pub label: &'static str,
    pub status: SectionStatus,
    pub status_text: &'static str,
    pub photos: Vec<PhotoBlock>,
}

/// One photo and the analysis matched to it by index, if any.
#[derive(Debug, Clone, Serialize)]
pub struct PhotoBlock {
    pub sequence: u32,
    pub storage_key: String,
    pub analysis: Option<AnalysisRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementState {
    pub category: Category,
    pub label: &'static str,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureLine {
    pub role: &'static str,
    pub name: &'static str,
    pub credential: Option<&'static str>,
}

pub fn signature_block() -> Vec<SignatureLine> {
    vec![
        SignatureLine {
            role: "Expert engineer",
            name: "Kapas A.S.",
            credential: Some("Certificate KZ14VJE00052616 of 04.02.2020"),
        },
        SignatureLine {
            role: "Expert engineer",
            name: "Zhalgasbay K.R.",
            credential: Some("Certificate KZ13VJE00050985 of 25.11.2019"),
        },
        SignatureLine {
            role: "Survey engineer",
            name: "Kirbasov E.R.",
            credential: None,
        },
    ]
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to load photo for analysis: {0}")]
    Storage(#[from] StorageError),
}

// ──────────────────────────────────────────────
// Assembler
// ──────────────────────────────────────────────

pub struct ReportAssembler {
    batch: BatchAnalyzer,
    synthesizer: ConclusionSynthesizer,
    photos: Arc<dyn PhotoStore>,
}

impl ReportAssembler {
    pub fn new(client: Arc<dyn VisionClient>, photos: Arc<dyn PhotoStore>) -> Self {
        Self {
            batch: BatchAnalyzer::new(Arc::clone(&client)),
            synthesizer: ConclusionSynthesizer::new(client),
            photos,
        }
    }

    /// Analyze every structural element with photos, synthesize the
    /// conclusion and build the payload. Blocking; run off the async runtime.
    pub fn assemble(&self, session: &Session) -> Result<ReportPayload, ReportError> {
        let _span = tracing::info_span!(
            "report_assembly",
            client = %session.id(),
            photos = session.total_photos(),
        )
        .entered();
        let start = Instant::now();

        let mut analyses = Vec::new();
        for category in Category::structural() {
            let refs = session.photos(category);
            if refs.is_empty() {
                continue;
            }
            let images = refs
                .iter()
                .map(|p| self.photos.load(&p.storage_key))
                .collect::<Result<Vec<_>, _>>()?;
            analyses.push(self.batch.analyze_batch(&images, category));
        }

        let conclusion = self.synthesizer.synthesize(&analyses);
        let payload = build_payload(session, &analyses, conclusion);

        tracing::info!(
            elements = analyses.len(),
            elapsed_ms = %start.elapsed().as_millis(),
            "Report assembled"
        );
        Ok(payload)
    }
}

/// Build the payload from already computed analyses. Pure.
pub fn build_payload(
    session: &Session,
    analyses: &[ElementAnalysis],
    conclusion: ConclusionSummary,
) -> ReportPayload {
    let analysis_for = |category: Category| analyses.iter().find(|a| a.category == category);

    let sections = Category::structural()
        .map(|category| {
            let photos = session.photos(category);
            let analysis = analysis_for(category);
            let status = if photos.is_empty() {
                SectionStatus::NoPhotosProvided
            } else if analysis.map_or(true, ElementAnalysis::is_empty) {
                SectionStatus::AnalysisUnavailable
            } else {
                SectionStatus::Analyzed
            };
            let blocks = photos
                .iter()
                .enumerate()
                .map(|(position, photo)| PhotoBlock {
                    sequence: photo.sequence,
                    storage_key: photo.storage_key.clone(),
                    analysis: analysis.and_then(|a| a.record_for(position)).cloned(),
                })
                .collect();
            ElementSection {
                category,
                label: category.label(),
                status,
                status_text: status.as_text(),
                photos: blocks,
            }
        })
        .collect();

    let element_states = Category::structural()
        .map(|category| ElementState {
            category,
            label: category.label(),
            state: analysis_for(category)
                .and_then(ElementAnalysis::first_state)
                .unwrap_or(DEFAULT_ELEMENT_STATE)
                .to_string(),
        })
        .collect();

    ReportPayload {
        header: ReportHeader {
            title: REPORT_TITLE,
            subject: SUBJECT,
            report_id: Uuid::new_v4(),
            client_id: session.id().to_string(),
            generated_at: Utc::now(),
        },
        organization: organization(),
        object: object_details(session),
        sections,
        element_states,
        conclusion,
        signatures: signature_block(),
    }
}

fn object_details(session: &Session) -> ObjectDetails {
    let fields = session.fields();
    let or = |value: &Option<String>, default: &str| {
        value.clone().unwrap_or_else(|| default.to_string())
    };
    ObjectDetails {
        full_name: or(&fields.identity.full_name, NOT_RECOGNIZED),
        id_number: or(&fields.identity.id_number, ""),
        id_date: or(&fields.identity.id_date, ""),
        address: or(&fields.property.address, NOT_RECOGNIZED),
        cadastral_number: or(&fields.property.cadastral_number, NOT_SPECIFIED),
        build_year: or(&fields.property.build_year, NOT_SPECIFIED),
        purpose: or(&fields.property.purpose, NOT_SPECIFIED),
        complexity_category: COMPLEXITY_UNDETERMINED.to_string(),
    }
}
