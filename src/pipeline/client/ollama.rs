use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::{check_image_sizes, ClientError, GenerationOptions, VisionClient};

/// Ollama HTTP client for local vision models, via `/api/chat`.
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, ClientError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ClientError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Chat request for `/api/chat`. Chat-template vision models (LLaVA, Gemma)
/// expect images attached to a message rather than the generate endpoint.
#[derive(Debug, Clone, Serialize)]
struct VisionChatRequest<'a> {
    model: &'a str,
    messages: Vec<VisionChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Clone, Serialize)]
struct VisionChatMessage<'a> {
    role: &'static str,
    content: &'a str,
    /// Base64-encoded images (only for user messages).
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<&'a [String]>,
}

#[derive(Debug, Clone, Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: i32,
}

#[derive(Deserialize)]
struct VisionChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl VisionClient for OllamaClient {
    fn chat_with_images(
        &self,
        user_prompt: &str,
        images: &[String],
        system: Option<&str>,
        options: &GenerationOptions,
    ) -> Result<String, ClientError> {
        check_image_sizes(images)?;

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(VisionChatMessage {
                role: "system",
                content: system,
                images: None,
            });
        }
        messages.push(VisionChatMessage {
            role: "user",
            content: user_prompt,
            images: (!images.is_empty()).then_some(images),
        });

        let body = VisionChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: ChatOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens as i32,
            },
        };

        let url = format!("{}/api/chat", self.base_url);
        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| ClientError::from_reqwest(e, &self.base_url, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(ClientError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: VisionChatResponse = response
            .json()
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        tracing::debug!(
            model = %self.model,
            images = images.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Ollama chat completed"
        );
        Ok(parsed.message.content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
