use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::intake::IntakeService;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ApiContext {
    pub intake: Arc<IntakeService>,
}

impl ApiContext {
    pub fn new(intake: Arc<IntakeService>) -> Self {
        Self { intake }
    }
}

/// Body of `POST /api/sessions/:id/photos`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PhotoUpload {
    /// Base64 image, optionally as a `data:` URL. Missing reads as empty.
    #[serde(default)]
    pub data: String,
}
