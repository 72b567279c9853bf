use serde::{Deserialize, Serialize};

use super::enums::DocType;

/// Fields read from an identity card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityFields {
    pub full_name: Option<String>,
    pub id_number: Option<String>,
    pub id_date: Option<String>,
}

/// Fields read from a property technical passport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyTitleFields {
    pub address: Option<String>,
    pub cadastral_number: Option<String>,
    pub build_year: Option<String>,
    pub purpose: Option<String>,
}

/// Result of field extraction, typed by the document that was read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "doc_type", rename_all = "snake_case")]
pub enum ExtractedDocument {
    Identity(IdentityFields),
    PropertyTitle(PropertyTitleFields),
}

impl ExtractedDocument {
    pub fn doc_type(&self) -> DocType {
        match self {
            Self::Identity(_) => DocType::Identity,
            Self::PropertyTitle(_) => DocType::PropertyTitle,
        }
    }

    /// Labelled non-empty values, in display order.
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        let pairs: Vec<(&'static str, &Option<String>)> = match self {
            Self::Identity(f) => vec![
                ("Full name", &f.full_name),
                ("ID number", &f.id_number),
                ("Issue date", &f.id_date),
            ],
            Self::PropertyTitle(f) => vec![
                ("Address", &f.address),
                ("Cadastral number", &f.cadastral_number),
                ("Year built", &f.build_year),
                ("Purpose", &f.purpose),
            ],
        };
        pairs
            .into_iter()
            .filter_map(|(label, value)| value.as_deref().map(|v| (label, v)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// One-line summary for the chat reply.
    pub fn summary(&self) -> String {
        self.entries()
            .into_iter()
            .map(|(label, value)| format!("{label}: {value}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Fields accumulated over a session. Each document fills its own half.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedFields {
    pub identity: IdentityFields,
    pub property: PropertyTitleFields,
}

impl ExtractedFields {
    pub fn apply(&mut self, document: &ExtractedDocument) {
        match document {
            ExtractedDocument::Identity(f) => self.identity = f.clone(),
            ExtractedDocument::PropertyTitle(f) => self.property = f.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> ExtractedDocument {
        ExtractedDocument::Identity(IdentityFields {
            full_name: Some("Иванов Иван Иванович".into()),
            id_number: Some("123456789".into()),
            id_date: None,
        })
    }

    #[test]
    fn summary_skips_missing_values() {
        assert_eq!(
            identity().summary(),
            "Full name: Иванов Иван Иванович, ID number: 123456789"
        );
    }

    #[test]
    fn empty_document_detected() {
        let doc = ExtractedDocument::PropertyTitle(PropertyTitleFields::default());
        assert!(doc.is_empty());
        assert_eq!(doc.summary(), "");
        assert_eq!(doc.doc_type(), DocType::PropertyTitle);
    }

    #[test]
    fn apply_fills_matching_half_only() {
        let mut fields = ExtractedFields::default();
        fields.apply(&identity());
        assert_eq!(
            fields.identity.full_name.as_deref(),
            Some("Иванов Иван Иванович")
        );
        assert_eq!(fields.property, PropertyTitleFields::default());
    }
}
