use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::{check_image_sizes, ClientError, GenerationOptions, VisionClient};

/// Client for OpenAI-compatible `/chat/completions` endpoints with image input.
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OpenAiClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout_secs: u64,
    ) -> Result<Self, ClientError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ClientError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Guess the media type from the first base64 characters of the payload.
fn media_type(image_b64: &str) -> &'static str {
    if image_b64.starts_with("iVBOR") {
        "image/png"
    } else if image_b64.starts_with("UklGR") {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

fn build_messages<'a>(
    user_prompt: &'a str,
    images: &[String],
    system: Option<&'a str>,
) -> Vec<ChatMessage<'a>> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system {
        messages.push(ChatMessage {
            role: "system",
            content: MessageContent::Text(system),
        });
    }

    let mut parts = Vec::with_capacity(images.len() + 1);
    parts.push(ContentPart::Text { text: user_prompt });
    parts.extend(images.iter().map(|img| ContentPart::ImageUrl {
        image_url: ImageUrl {
            url: format!("data:{};base64,{}", media_type(img), img),
        },
    }));
    messages.push(ChatMessage {
        role: "user",
        content: MessageContent::Parts(parts),
    });
    messages
}

impl VisionClient for OpenAiClient {
    fn chat_with_images(
        &self,
        user_prompt: &str,
        images: &[String],
        system: Option<&str>,
        options: &GenerationOptions,
    ) -> Result<String, ClientError> {
        check_image_sizes(images)?;

        let body = ChatCompletionRequest {
            model: &self.model,
            messages: build_messages(user_prompt, images, system),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
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

        let parsed: ChatCompletionResponse = response
            .json()
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ClientError::InvalidResponse("reply has no message content".into()))?;

        tracing::debug!(
            model = %self.model,
            images = images.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Chat completion finished"
        );
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_become_data_urls_after_prompt() {
        let images = vec!["/9j/4AAQ".to_string(), "iVBORw0K".to_string()];
        let messages = build_messages("describe", &images, Some("expert"));
        let json = serde_json::to_value(&messages).unwrap();

        assert_eq!(json[0]["role"], "system");
        assert_eq!(json[0]["content"], "expert");

        let parts = &json[1]["content"];
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[0]["text"], "describe");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/jpeg;base64,/9j/4AAQ");
        assert_eq!(parts[2]["image_url"]["url"], "data:image/png;base64,iVBORw0K");
    }

    #[test]
    fn no_system_message_when_absent() {
        let messages = build_messages("summarize", &[], None);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
    }

    #[test]
    fn request_carries_generation_options() {
        let body = ChatCompletionRequest {
            model: "gpt-4o",
            messages: build_messages("x", &[], None),
            temperature: GenerationOptions::CONCLUSION.temperature,
            max_tokens: GenerationOptions::CONCLUSION.max_tokens,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["max_tokens"], 400);
        assert_eq!(json["temperature"], 0.0);
    }

    #[test]
    fn constructor_keeps_model_and_trims_url() {
        let client = OpenAiClient::new("https://api.openai.com/v1/", "sk-test", "gpt-4o", 30).unwrap();
        assert_eq!(client.base_url(), "https://api.openai.com/v1");
        assert_eq!(client.model_name(), "gpt-4o");
    }
}
