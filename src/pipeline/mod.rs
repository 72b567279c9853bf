pub mod batch; // Per-element defect analysis with per-photo fallback
pub mod client;
pub mod conclusion;
pub mod error;
pub mod field_extraction; // Identity / property title fields from document photos
pub mod parser;
pub mod report;

pub use batch::BatchAnalyzer;
pub use conclusion::ConclusionSynthesizer;
pub use error::ExtractionError;
pub use field_extraction::FieldExtractor;
pub use parser::{parse_reply, ParseError};
pub use report::{ReportAssembler, ReportError, ReportPayload};
