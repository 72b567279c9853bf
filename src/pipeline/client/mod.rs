//! Vision model clients.
//!
//! The pipeline talks to a multimodal chat model through `VisionClient`.
//! Implementations are blocking (reqwest::blocking); async callers wrap
//! them in `spawn_blocking`.

pub mod mock;
pub mod ollama;
pub mod openai;

use std::sync::Arc;

use base64::Engine;
use serde::Serialize;

use crate::config::{AppConfig, VisionBackend};

pub use mock::{MockVisionClient, RecordedCall};
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

/// Maximum base64 payload accepted per image (20 MB).
pub const MAX_IMAGE_BASE64_BYTES: usize = 20 * 1024 * 1024;

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Vision service is not reachable at {0}")]
    NotReachable(String),

    #[error("Vision service returned an error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response from vision service: {0}")]
    InvalidResponse(String),

    #[error("Image too large ({0} bytes), maximum is 20 MB")]
    ImageTooLarge(usize),

    #[error("No API key configured for {0}")]
    MissingApiKey(&'static str),
}

impl ClientError {
    pub(crate) fn from_reqwest(err: reqwest::Error, base_url: &str, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            ClientError::Timeout(timeout_secs)
        } else if err.is_connect() {
            ClientError::NotReachable(base_url.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

// ──────────────────────────────────────────────
// Generation options
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationOptions {
    pub const FIELD_EXTRACTION: Self = Self {
        temperature: 0.2,
        max_tokens: 700,
    };
    pub const BATCH_ANALYSIS: Self = Self {
        temperature: 0.2,
        max_tokens: 800,
    };
    /// Deterministic: the conclusion must be reproducible for the same input.
    pub const CONCLUSION: Self = Self {
        temperature: 0.0,
        max_tokens: 400,
    };
}

// ──────────────────────────────────────────────
// Trait
// ──────────────────────────────────────────────

/// A multimodal chat model that answers a text prompt about zero or more images.
pub trait VisionClient: Send + Sync {
    /// Send one user turn with base64-encoded images and return the reply text.
    fn chat_with_images(
        &self,
        user_prompt: &str,
        images: &[String],
        system: Option<&str>,
        options: &GenerationOptions,
    ) -> Result<String, ClientError>;

    fn model_name(&self) -> &str;
}

/// Base64-encode raw image bytes for a request.
pub fn encode_image(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Reject oversized payloads before they go over the wire.
pub fn check_image_sizes(images: &[String]) -> Result<(), ClientError> {
    match images.iter().find(|img| img.len() > MAX_IMAGE_BASE64_BYTES) {
        Some(img) => Err(ClientError::ImageTooLarge(img.len())),
        None => Ok(()),
    }
}

/// Build the client selected by configuration.
///
/// Must be called outside the async runtime: blocking reqwest clients
/// cannot be constructed from within a tokio worker.
pub fn build_client(config: &AppConfig) -> Result<Arc<dyn VisionClient>, ClientError> {
    let timeout_secs = config.request_timeout.as_secs();
    let client: Arc<dyn VisionClient> = match config.backend {
        VisionBackend::OpenAi => {
            let api_key = config
                .api_key
                .clone()
                .ok_or(ClientError::MissingApiKey("openai"))?;
            Arc::new(OpenAiClient::new(
                &config.base_url,
                &api_key,
                &config.model,
                timeout_secs,
            )?)
        }
        VisionBackend::Ollama => Arc::new(OllamaClient::new(
            &config.base_url,
            &config.model,
            timeout_secs,
        )?),
    };
    tracing::info!(
        backend = ?config.backend,
        model = client.model_name(),
        base_url = %config.base_url,
        "Vision client ready"
    );
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_match_call_kinds() {
        assert_eq!(GenerationOptions::FIELD_EXTRACTION.max_tokens, 700);
        assert_eq!(GenerationOptions::BATCH_ANALYSIS.max_tokens, 800);
        assert_eq!(GenerationOptions::CONCLUSION.temperature, 0.0);
        assert_eq!(GenerationOptions::CONCLUSION.max_tokens, 400);
    }

    #[test]
    fn encode_image_is_standard_base64() {
        assert_eq!(encode_image(b"hello"), "aGVsbG8=");
    }

    #[test]
    fn oversized_image_rejected() {
        let big = "A".repeat(MAX_IMAGE_BASE64_BYTES + 1);
        let small = "A".repeat(16);
        assert!(check_image_sizes(&[small.clone()]).is_ok());
        match check_image_sizes(&[small, big]) {
            Err(ClientError::ImageTooLarge(n)) => assert_eq!(n, MAX_IMAGE_BASE64_BYTES + 1),
            other => panic!("expected ImageTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn openai_backend_requires_api_key() {
        let config = AppConfig::from_lookup(|_| None);
        match build_client(&config) {
            Err(ClientError::MissingApiKey(backend)) => assert_eq!(backend, "openai"),
            Err(other) => panic!("expected MissingApiKey, got {other:?}"),
            Ok(_) => panic!("expected MissingApiKey, got a client"),
        }
    }

    #[test]
    fn ollama_backend_builds_without_key() {
        let config = AppConfig::from_lookup(|key| match key {
            "INTAKE_BACKEND" => Some("ollama".into()),
            _ => None,
        });
        let client = build_client(&config).unwrap();
        assert_eq!(client.model_name(), "llava");
    }
}
