use super::client::ClientError;
use super::parser::ParseError;

/// Failure of a single model-backed step (field extraction or analysis).
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Model reply contained no usable data: {0}")]
    Empty(String),

    #[error("Model call timed out after {0} seconds")]
    Timeout(u64),

    #[error("Vision service error: {0}")]
    Client(ClientError),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<ClientError> for ExtractionError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Timeout(secs) => ExtractionError::Timeout(secs),
            other => ExtractionError::Client(other),
        }
    }
}

impl ExtractionError {
    /// Raw model text behind a parse failure, for diagnostics.
    pub fn raw_reply(&self) -> Option<&str> {
        match self {
            ExtractionError::Parse(e) => Some(&e.raw),
            _ => None,
        }
    }
}
