pub mod analysis;
pub mod document;
pub mod enums;
pub mod step;

pub use analysis::{AnalysisRecord, ConclusionSummary, ElementAnalysis};
pub use document::{ExtractedDocument, ExtractedFields, IdentityFields, PropertyTitleFields};
pub use enums::{Category, DocType, SessionPhase, UnknownVariant};
pub use step::{Step, STEPS};
