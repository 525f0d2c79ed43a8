use std::sync::Mutex;

use async_trait::async_trait;

use super::{AiError, TextGenerator};

type Responder = Box<dyn Fn(&str) -> Result<String, AiError> + Send + Sync>;

/// Deterministic [`TextGenerator`] that records every prompt it receives.
///
/// Used by the test suites and selected at startup when the configured API
/// key is the literal string `mock`.
pub struct MockGenerator {
    responder: Responder,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    /// Answers every prompt with the same text.
    pub fn replying(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::with(move |_| Ok(text.clone()))
    }

    /// Fails every call with [`AiError::EmptyResponse`].
    pub fn failing() -> Self {
        Self::with(|_| Err(AiError::EmptyResponse))
    }

    /// Answers with whatever `responder` computes from the prompt.
    pub fn with<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<String, AiError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Number of `generate` calls so far.
    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Copies of all prompts received, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, AiError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        (self.responder)(prompt)
    }
}
