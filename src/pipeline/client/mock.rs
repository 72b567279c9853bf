use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use super::{ClientError, GenerationOptions, VisionClient};

/// One call seen by `MockVisionClient`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub prompt: String,
    pub images: Vec<String>,
    pub system: Option<String>,
    pub options: GenerationOptions,
}

type Responder = Box<dyn Fn(&RecordedCall) -> Result<String, ClientError> + Send + Sync>;

enum Script {
    Fixed(String),
    Queue(Mutex<VecDeque<Result<String, ClientError>>>),
    Function(Responder),
}

/// Scripted vision client for tests. Records every call it receives.
pub struct MockVisionClient {
    script: Script,
    delay: Option<Duration>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockVisionClient {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with the same text.
    pub fn new(response: &str) -> Self {
        Self::with_script(Script::Fixed(response.to_string()))
    }

    /// Answer with queued results in order; an exhausted queue is a network error.
    pub fn scripted(replies: Vec<Result<String, ClientError>>) -> Self {
        Self::with_script(Script::Queue(Mutex::new(replies.into())))
    }

    /// Answer by inspecting the call.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&RecordedCall) -> Result<String, ClientError> + Send + Sync + 'static,
    {
        Self::with_script(Script::Function(Box::new(f)))
    }

    /// Block each call for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }
}

impl VisionClient for MockVisionClient {
    fn chat_with_images(
        &self,
        user_prompt: &str,
        images: &[String],
        system: Option<&str>,
        options: &GenerationOptions,
    ) -> Result<String, ClientError> {
        let call = RecordedCall {
            prompt: user_prompt.to_string(),
            images: images.to_vec(),
            system: system.map(str::to_string),
            options: *options,
        };
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.clone());
        }

        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        match &self.script {
            Script::Fixed(text) => Ok(text.clone()),
            Script::Queue(queue) => queue
                .lock()
                .ok()
                .and_then(|mut q| q.pop_front())
                .unwrap_or_else(|| Err(ClientError::Network("mock reply queue exhausted".into()))),
            Script::Function(f) => f(&call),
        }
    }

    fn model_name(&self) -> &str {
        "mock-vision"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_reply_and_call_log() {
        let mock = MockVisionClient::new("{}");
        let images = vec!["abc".to_string()];
        let reply = mock
            .chat_with_images("p", &images, Some("s"), &GenerationOptions::BATCH_ANALYSIS)
            .unwrap();
        assert_eq!(reply, "{}");
        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].images, images);
        assert_eq!(calls[0].system.as_deref(), Some("s"));
    }

    #[test]
    fn scripted_replies_then_exhaustion() {
        let mock = MockVisionClient::scripted(vec![
            Ok("first".into()),
            Err(ClientError::Timeout(5)),
        ]);
        let opts = GenerationOptions::CONCLUSION;
        assert_eq!(mock.chat_with_images("a", &[], None, &opts).unwrap(), "first");
        assert!(matches!(
            mock.chat_with_images("b", &[], None, &opts),
            Err(ClientError::Timeout(5))
        ));
        assert!(matches!(
            mock.chat_with_images("c", &[], None, &opts),
            Err(ClientError::Network(_))
        ));
        assert_eq!(mock.call_count(), 3);
    }

    #[test]
    fn function_responder_sees_images() {
        let mock = MockVisionClient::from_fn(|call| Ok(format!("{} images", call.images.len())));
        let images = vec!["a".to_string(), "b".to_string()];
        let reply = mock
            .chat_with_images("x", &images, None, &GenerationOptions::BATCH_ANALYSIS)
            .unwrap();
        assert_eq!(reply, "2 images");
    }
}
