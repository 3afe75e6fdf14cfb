//! LLM backend trait and concrete implementations.
//!
//! Backends:
//!   GeminiBackend           - Google Gemini `generateContent` with `responseSchema`
//!   OpenAiCompatibleBackend - any OpenAI-compatible chat endpoint (OpenAI,
//!                             OpenRouter, Groq, vLLM, LMStudio, …) with
//!                             `response_format = json_schema`
//!
//! Backends hold no credential; the caller passes the key on every call so
//! the owner of the key decides when a request may be made at all.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::schema::StructuredSchema;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("API error [{status}]: {message}")]
    ApiError { status: u16, message: String },
}

impl LlmError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LlmError::Http(e) if e.is_timeout())
    }
}

// ── Request / Response ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub model: Option<String>,
    /// When set, the provider is asked for JSON output constrained to this schema.
    pub response_schema: Option<StructuredSchema>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            model: None,
            response_schema: None,
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_schema(mut self, schema: StructuredSchema) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmResponse {
    /// Generated text; `None` when the provider returned no text part.
    pub text: Option<String>,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

// ── Trait ─────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn generate(&self, api_key: &SecretString, req: LlmRequest) -> Result<LlmResponse, LlmError>;
    /// Human-facing provider name, e.g. "Gemini".
    fn provider_name(&self) -> &str;
    fn model_id(&self) -> &str;
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn build_client(timeout: Duration) -> Result<reqwest::Client, LlmError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

async fn check_response_status(resp: reqwest::Response) -> Result<serde_json::Value, LlmError> {
    let status = resp.status().as_u16();
    let raw = resp.text().await?;
    if status >= 400 {
        let msg = serde_json::from_str::<serde_json::Value>(&raw)
            .ok()
            .and_then(|body| {
                body["error"]["message"]
                    .as_str()
                    .or_else(|| body["message"].as_str())
                    .map(String::from)
            })
            .unwrap_or_else(|| if raw.is_empty() { "unknown API error".to_string() } else { raw });
        return Err(LlmError::ApiError { status, message: msg });
    }
    Ok(serde_json::from_str(&raw)?)
}

// ── 1. Google Gemini ──────────────────────────────────────────────────────────

pub struct GeminiBackend {
    pub model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(model: impl Into<String>, timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self {
            model: model.into(),
            base_url: GEMINI_BASE_URL.to_string(),
            client: build_client(timeout)?,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn body(&self, req: &LlmRequest) -> serde_json::Value {
        let mut generation = serde_json::json!({
            "maxOutputTokens": req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "temperature":     req.temperature.unwrap_or(0.1),
        });
        if let Some(schema) = &req.response_schema {
            generation["responseMimeType"] = serde_json::json!("application/json");
            generation["responseSchema"] = schema.to_gemini();
        }

        let mut body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": req.prompt }] }],
            "generationConfig": generation,
        });
        if let Some(sys) = &req.system {
            body["systemInstruction"] = serde_json::json!({ "parts": [{ "text": sys }] });
        }
        body
    }
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    async fn generate(&self, api_key: &SecretString, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let model = req.model.clone().unwrap_or_else(|| self.model.clone());
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        );

        let resp = self.client
            .post(&url)
            .header("x-goog-api-key", api_key.expose_secret())
            .json(&self.body(&req))
            .send()
            .await?;
        let json = check_response_status(resp).await?;

        // A blocked prompt comes back with no candidates at all.
        if let Some(reason) = json["promptFeedback"]["blockReason"].as_str() {
            debug!(block_reason = reason, "Gemini blocked the prompt");
        }

        let text: Option<String> = json["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts.iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<String>()
            })
            .filter(|t| !t.is_empty());

        Ok(LlmResponse {
            text,
            model,
            prompt_tokens:     json["usageMetadata"]["promptTokenCount"].as_u64().unwrap_or(0) as u32,
            completion_tokens: json["usageMetadata"]["candidatesTokenCount"].as_u64().unwrap_or(0) as u32,
        })
    }

    fn provider_name(&self) -> &str { "Gemini" }
    fn model_id(&self) -> &str { &self.model }
}

// ── 2. OpenAI-Compatible ──────────────────────────────────────────────────────

pub struct OpenAiCompatibleBackend {
    pub base_url: String,
    pub model: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleBackend {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            base_url: base_url.into(),
            model: model.into(),
            client: build_client(timeout)?,
        })
    }

    fn body(&self, req: &LlmRequest) -> serde_json::Value {
        let mut messages = Vec::new();
        if let Some(sys) = &req.system {
            messages.push(serde_json::json!({ "role": "system", "content": sys }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": req.prompt }));

        let mut body = serde_json::json!({
            "model":       req.model.as_deref().unwrap_or(&self.model),
            "messages":    messages,
            "max_tokens":  req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "temperature": req.temperature.unwrap_or(0.1),
        });
        if let Some(schema) = &req.response_schema {
            // strict mode needs every property listed as required
            let strict = schema.required_keys().len() == schema.properties.len();
            body["response_format"] = serde_json::json!({
                "type": "json_schema",
                "json_schema": {
                    "name":   schema.name,
                    "schema": schema.to_json_schema(),
                    "strict": strict,
                }
            });
        }
        body
    }
}

#[async_trait]
impl LlmBackend for OpenAiCompatibleBackend {
    async fn generate(&self, api_key: &SecretString, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let resp = self.client
            .post(&url)
            .bearer_auth(api_key.expose_secret())
            .json(&self.body(&req))
            .send()
            .await?;
        let json = check_response_status(resp).await?;

        Ok(LlmResponse {
            text: json["choices"][0]["message"]["content"]
                .as_str()
                .map(String::from),
            model: json["model"]
                .as_str()
                .unwrap_or(&self.model)
                .to_string(),
            prompt_tokens:     json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            completion_tokens: json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
        })
    }

    fn provider_name(&self) -> &str { "OpenAI-compatible" }
    fn model_id(&self) -> &str { &self.model }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
