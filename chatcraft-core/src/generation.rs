//! Text generation for chatbot replies via the Gemini API.
//!
//! Provides a `GenerationBackend` trait with:
//! - **Gemini**: `models/{model}:generateContent`
//! - **Fallback**: wraps an optional backend and turns every failure into a
//!   fixed apology so callers never see a structured error

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::GenerationConfig;
use crate::models::Chatbot;
use crate::onboarding::DEFAULT_TONE;

pub const APOLOGY_REPLY: &str =
    "I'm sorry, I'm having trouble responding right now. Please try again later.";
pub const EMPTY_MESSAGE_REPLY: &str = "Please enter a message.";

// ============================================================================
// GenerationBackend trait
// ============================================================================

/// Abstraction over text-generation providers.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Response contained no text")]
    EmptyResponse,

    #[error("Missing API key")]
    MissingApiKey,
}

// ============================================================================
// Prompt
// ============================================================================

/// Render the reply prompt from the chatbot's stored business profile.
pub fn build_prompt(chatbot: &Chatbot, message: &str) -> String {
    let business_name = chatbot.config_str("name").unwrap_or(&chatbot.name);
    let description = chatbot.config_str("description").unwrap_or("");
    let tone = chatbot.config_str("tone").unwrap_or(DEFAULT_TONE);

    let faqs = chatbot
        .chatbot_config
        .as_ref()
        .and_then(|c| c.get("faqs"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut faq_text = String::new();
    if !faqs.is_empty() {
        faq_text.push_str("\nFrequently Asked Questions:\n");
        for faq in faqs.iter().filter(|f| f.is_object()) {
            let q = faq.get("q").and_then(Value::as_str).unwrap_or("");
            let a = faq.get("a").and_then(Value::as_str).unwrap_or("");
            faq_text.push_str(&format!("Q: {q}\nA: {a}\n"));
        }
    }

    format!(
        "You are a helpful chatbot for {business_name}.\n\
         Business Description: {description}\n\
         Tone: Please respond in a {tone} manner.\n\
         {faq_text}\n\
         \n\
         User message: {message}\n\
         \n\
         Please provide a helpful response based on the business information above."
    )
}

// ============================================================================
// Gemini API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    code: u16,
    message: String,
}

// ============================================================================
// GeminiGenerationClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct GeminiGenerationClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiGenerationClient {
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let api_key = config
            .resolved_api_key()
            .ok_or(GenerationError::MissingApiKey)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn generate_once(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let request = GenerateRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: Some(prompt.to_string()),
                }],
            }],
        };

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let error_detail = serde_json::from_str::<GeminiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error);

            let (code, message) = error_detail
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), error_body));

            tracing::error!(code = code, message = %message, "Gemini API error");

            return Err(GenerationError::Api { code, message });
        }

        let body: GenerateResponse = response.json().await?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        Ok(text)
    }
}

#[async_trait]
impl GenerationBackend for GeminiGenerationClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.generate_once(prompt).await
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ============================================================================
// FallbackGenerationClient
// ============================================================================

/// Never fails: a missing backend or any backend error yields [`APOLOGY_REPLY`].
pub struct FallbackGenerationClient {
    inner: Option<Box<dyn GenerationBackend>>,
}

impl FallbackGenerationClient {
    pub fn new(inner: Option<Box<dyn GenerationBackend>>) -> Self {
        Self { inner }
    }

    /// Build a Gemini-backed client; a missing API key leaves it without a backend.
    pub fn from_config(config: &GenerationConfig) -> Self {
        match GeminiGenerationClient::new(config) {
            Ok(client) => Self::new(Some(Box::new(client))),
            Err(e) => {
                tracing::warn!(error = %e, "Generation backend unavailable; replies will use the fallback message");
                Self::new(None)
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }

    pub async fn reply(&self, prompt: &str) -> String {
        let Some(backend) = &self.inner else {
            tracing::warn!("No generation backend configured");
            return APOLOGY_REPLY.to_string();
        };
        match backend.generate(prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(backend = backend.name(), error = %e, "Generation failed");
                APOLOGY_REPLY.to_string()
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
