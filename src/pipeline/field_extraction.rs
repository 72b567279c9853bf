//! Document field extraction.
//!
//! Sends one document photo to the vision model with a prompt naming the
//! fields to read, and maps the JSON reply onto `ExtractedDocument`.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};

use super::client::{encode_image, GenerationOptions, VisionClient};
use super::error::ExtractionError;
use super::parser::{parse_reply, ParseError};
use crate::models::analysis::text_value;
use crate::models::{DocType, ExtractedDocument, IdentityFields, PropertyTitleFields};

// ──────────────────────────────────────────────
// Prompts
// ──────────────────────────────────────────────

const EXTRACTION_SYSTEM_PROMPT: &str = "You read scanned Kazakhstan identity and property \
documents. Copy values exactly as printed, keep the original language, and never invent data.";

const IDENTITY_PROMPT: &str = r#"Extract the following fields from this identity card photo:
- full_name: surname, given name and patronymic
- id_number: document number
- id_date: date of issue (DD.MM.YYYY)

Reply with a single JSON object and nothing else. Use null for any field you cannot read.
Example:
{ "full_name": "Иванов Иван Иванович", "id_number": "123456789", "id_date": "12.03.2020" }"#;

const PROPERTY_TITLE_PROMPT: &str = r#"Extract the following fields from this technical passport photo:
- address: full address of the property
- cadastral_number: cadastral number
- build_year: year of construction
- purpose: purpose of the building (residential, commercial, ...)

Reply with a single JSON object and nothing else. Use null for any field you cannot read.
Example:
{ "address": "г. Алматы, ул. Ключевая, дом 14, кв. 3", "cadastral_number": "03-046-140-1757", "build_year": "2010", "purpose": "жилое" }"#;

pub fn extraction_prompt(doc_type: DocType) -> &'static str {
    match doc_type {
        DocType::Identity => IDENTITY_PROMPT,
        DocType::PropertyTitle => PROPERTY_TITLE_PROMPT,
    }
}

// ──────────────────────────────────────────────
// Extractor
// ──────────────────────────────────────────────

pub struct FieldExtractor {
    client: Arc<dyn VisionClient>,
}

impl FieldExtractor {
    pub fn new(client: Arc<dyn VisionClient>) -> Self {
        Self { client }
    }

    /// Read the fields of `doc_type` from one photo.
    ///
    /// Fails with `Parse` when the reply is not a JSON object and with
    /// `Empty` when the object carries none of the requested fields.
    pub fn extract_fields(
        &self,
        image_bytes: &[u8],
        doc_type: DocType,
    ) -> Result<ExtractedDocument, ExtractionError> {
        let _span = tracing::info_span!(
            "field_extraction",
            model = %self.client.model_name(),
            doc_type = %doc_type,
            image_size = image_bytes.len(),
        )
        .entered();
        let start = Instant::now();

        let images = vec![encode_image(image_bytes)];
        let raw = self.client.chat_with_images(
            extraction_prompt(doc_type),
            &images,
            Some(EXTRACTION_SYSTEM_PROMPT),
            &GenerationOptions::FIELD_EXTRACTION,
        )?;

        let document = document_from_reply(&raw, doc_type)?;

        tracing::info!(
            elapsed_ms = %start.elapsed().as_millis(),
            fields = document.entries().len(),
            "Field extraction complete"
        );
        Ok(document)
    }
}

/// Map a raw reply onto the typed document.
pub fn document_from_reply(raw: &str, doc_type: DocType) -> Result<ExtractedDocument, ExtractionError> {
    let value = parse_reply(raw)?;
    let Value::Object(map) = value else {
        return Err(ParseError::new("expected a JSON object", raw).into());
    };

    let document = match doc_type {
        DocType::Identity => ExtractedDocument::Identity(IdentityFields {
            full_name: field(&map, &["full_name", "fio"]),
            id_number: field(&map, &["id_number"]),
            id_date: field(&map, &["id_date"]),
        }),
        DocType::PropertyTitle => ExtractedDocument::PropertyTitle(PropertyTitleFields {
            address: field(&map, &["address"]),
            cadastral_number: field(&map, &["cadastral_number"]),
            build_year: field(&map, &["build_year"]),
            purpose: field(&map, &["purpose"]),
        }),
    };

    if document.is_empty() {
        return Err(ExtractionError::Empty(format!(
            "no {doc_type} fields in reply"
        )));
    }
    Ok(document)
}

fn field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| map.get(*k).and_then(text_value))
}
