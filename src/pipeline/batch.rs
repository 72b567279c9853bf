//! Batch analysis of building element photos.
//!
//! All photos of one element go to the model in a single call. If that call
//! fails or yields nothing usable and there is more than one photo, each
//! photo is retried on its own, in submission order. Records always carry
//! the zero-based position of the photo they describe.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use super::client::{encode_image, GenerationOptions, VisionClient};
use super::error::ExtractionError;
use super::parser::{parse_reply, ParseError};
use crate::models::{AnalysisRecord, Category, ElementAnalysis};

const ANALYSIS_SYSTEM_PROMPT: &str = "You are a building technical inspection engineer. \
Describe only what is visible in the photos and use plain technical language.";

/// Prompt for `photo_count` photos of one element, indexed from 0.
pub fn batch_prompt(photo_count: usize, category: Category) -> String {
    format!(
        "You are given {photo_count} photo(s) of the building element \"{label}\".\n\
         For each photo return an object with:\n\
         - index: position of the photo, starting from 0\n\
         - description: what the photo shows\n\
         - defects: visible defects, or an empty string if none\n\
         - overall_state: condition of the element (good, satisfactory, unsatisfactory, critical)\n\n\
         Reply with a JSON array only, one object per photo, in photo order.\n\
         Example:\n\
         [{{\"index\":0,\"description\":\"...\",\"defects\":\"...\",\"overall_state\":\"...\"}}]",
        label = category.label(),
    )
}

pub struct BatchAnalyzer {
    client: Arc<dyn VisionClient>,
}

impl BatchAnalyzer {
    pub fn new(client: Arc<dyn VisionClient>) -> Self {
        Self { client }
    }

    /// Analyze every photo of one element. Never fails: an element whose
    /// photos could not be analyzed comes back with no records.
    pub fn analyze_batch(&self, photos: &[Vec<u8>], category: Category) -> ElementAnalysis {
        if photos.is_empty() {
            return ElementAnalysis::empty(category);
        }

        let _span = tracing::info_span!(
            "batch_analysis",
            category = %category,
            photos = photos.len(),
        )
        .entered();
        let start = Instant::now();

        let encoded: Vec<String> = photos.iter().map(|p| encode_image(p)).collect();

        match self.request(&encoded, category) {
            Ok(records) => {
                tracing::info!(
                    records = records.len(),
                    elapsed_ms = %start.elapsed().as_millis(),
                    "Batch analysis complete"
                );
                return ElementAnalysis::new(category, records);
            }
            Err(e) => {
                tracing::warn!(error = %e, raw = e.raw_reply().unwrap_or_default(), "Batch analysis failed");
            }
        }

        if encoded.len() == 1 {
            return ElementAnalysis::empty(category);
        }

        tracing::info!("Falling back to per-photo analysis");
        let mut records = Vec::with_capacity(encoded.len());
        for (position, image) in encoded.iter().enumerate() {
            match self.request(std::slice::from_ref(image), category) {
                Ok(found) => {
                    if let Some(mut record) = found.into_iter().next() {
                        record.index = position;
                        records.push(record);
                    }
                }
                Err(e) => {
                    tracing::warn!(position, error = %e, "Per-photo analysis failed");
                }
            }
        }

        tracing::info!(
            records = records.len(),
            elapsed_ms = %start.elapsed().as_millis(),
            "Per-photo analysis complete"
        );
        ElementAnalysis::new(category, records)
    }

    /// One model call over `images`. An empty or non-array result is an error.
    fn request(
        &self,
        images: &[String],
        category: Category,
    ) -> Result<Vec<AnalysisRecord>, ExtractionError> {
        let raw = self.client.chat_with_images(
            &batch_prompt(images.len(), category),
            images,
            Some(ANALYSIS_SYSTEM_PROMPT),
            &GenerationOptions::BATCH_ANALYSIS,
        )?;
        records_from_reply(&raw, images.len())
    }
}

/// Read analysis records from a reply. At most `photo_count` records are kept.
pub fn records_from_reply(
    raw: &str,
    photo_count: usize,
) -> Result<Vec<AnalysisRecord>, ExtractionError> {
    let Value::Array(items) = parse_reply(raw)? else {
        return Err(ParseError::new("expected a JSON array", raw).into());
    };

    let mut records: Vec<AnalysisRecord> = items
        .iter()
        .enumerate()
        .filter_map(|(position, item)| AnalysisRecord::from_value(item, position, photo_count))
        .collect();
    records.truncate(photo_count);

    if records.is_empty() {
        return Err(ExtractionError::Empty("no analysis records in reply".into()));
    }
    reconcile_indexes(&mut records, photo_count);
    Ok(records)
}

/// Keep the model's indexes only if they name distinct photos. Otherwise
/// (1-based numbering, repeats) every record takes its list position.
fn reconcile_indexes(records: &mut [AnalysisRecord], photo_count: usize) {
    let mut seen = vec![false; photo_count];
    let distinct = records.iter().all(|r| {
        r.index < photo_count && !std::mem::replace(&mut seen[r.index], true)
    });
    if !distinct {
        tracing::debug!("Model indexes unusable, numbering records by position");
        for (position, record) in records.iter_mut().enumerate() {
            record.index = position;
        }
    }
    records.sort_by_key(|r| r.index);
}
