//! Generative-AI access.
//!
//! Everything that asks a language model for text goes through the
//! [`TextGenerator`] trait so the category normalizer and the analytics
//! generators can be exercised against [`MockGenerator`] in tests.
//!
//! - [`GeminiClient`] talks to the Gemini REST API
//! - [`extract_json`] turns a model reply (often wrapped in a Markdown fence)
//!   into a typed value

mod gemini;
mod mock;

pub use gemini::GeminiClient;
pub use mock::MockGenerator;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors from a generation call or from decoding its reply.
#[derive(Debug, Error)]
pub enum AiError {
    /// Transport failure (DNS, TLS, connection reset, body read)
    #[error("AI request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// The API answered with a non-2xx status
    #[error("AI service returned status {status}: {body}")]
    Status { status: u16, body: String },
    /// A 2xx reply with no text in it (blocked prompt, empty candidate list)
    #[error("AI service returned no text")]
    EmptyResponse,
    /// Reply text that doesn't match the structure the caller asked for
    #[error("Malformed AI response: {0}")]
    MalformedResponse(String),
    /// No API key configured
    #[error("AI service is not configured")]
    NotConfigured,
}

/// Something that can turn a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AiError>;
}

/// Stand-in used when no API key is configured: every call fails with
/// [`AiError::NotConfigured`], so category resolution falls back to the
/// default category and analytics report the missing key.
pub struct UnconfiguredGenerator;

#[async_trait]
impl TextGenerator for UnconfiguredGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, AiError> {
        Err(AiError::NotConfigured)
    }
}

/// Decodes a JSON value out of model output.
///
/// Models frequently wrap JSON in a ```` ```json ```` fence or add a sentence
/// before it. The fence is stripped first; if the remainder still doesn't
/// decode, the outermost `{...}` or `[...]` span is tried.
pub fn extract_json<T: DeserializeOwned>(text: &str) -> Result<T, AiError> {
    let body = strip_code_fence(text);
    match serde_json::from_str(body) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            let span = outer_json_span(body).ok_or_else(|| {
                AiError::MalformedResponse(format!("no JSON found: {first_err}"))
            })?;
            serde_json::from_str(span).map_err(|e| AiError::MalformedResponse(e.to_string()))
        }
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json", "JSON", ...) up to the first newline
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_end()
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

fn outer_json_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let close = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}
