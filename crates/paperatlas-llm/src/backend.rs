//! Generative text backends.
//!
//! Backends:
//!   OpenAiResponsesBackend:  OpenAI Responses API (`/responses`)
//!   OpenAiCompatibleBackend: any `/v1/chat/completions` endpoint
//!                              (LMStudio, vLLM, OpenRouter, Groq, …)
//!   OllamaBackend:           local Ollama `/api/chat`
//!
//! Every backend exposes the same `generate(system, user) -> text` call.
//! Failures are returned, never retried here.

use std::time::Duration;

use async_trait::async_trait;
use paperatlas_common::{sandbox::SandboxClient, PaperAtlasError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("API error [{status}]: {message}")]
    ApiError { status: u16, message: String },
    #[error("No text output found in response")]
    EmptyOutput,
}

impl From<PaperAtlasError> for LlmError {
    fn from(err: PaperAtlasError) -> Self {
        match err {
            PaperAtlasError::Http(e) => LlmError::Http(e),
            other => LlmError::Unavailable(other.to_string()),
        }
    }
}

// ── Messages ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,   // "system" | "user" | "assistant"
    pub content: String,
}

impl Message {
    pub fn system(content: &str) -> Self {
        Self { role: "system".to_string(), content: content.to_string() }
    }

    pub fn user(content: &str) -> Self {
        Self { role: "user".to_string(), content: content.to_string() }
    }
}

// ── Trait ─────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Send one system + user prompt pair and return the model's text.
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError>;
    fn model_id(&self) -> &str;
    fn is_local(&self) -> bool;
}

// ── Helpers ───────────────────────────────────────────────────────────────────

async fn check_response_status(resp: reqwest::Response) -> Result<serde_json::Value, LlmError> {
    let status = resp.status().as_u16();
    let text = resp.text().await?;
    if status >= 400 {
        let body: serde_json::Value = serde_json::from_str(&text).unwrap_or_default();
        let msg = body["error"]["message"]
            .as_str()
            .or_else(|| body["error"].as_str())
            .or_else(|| body["message"].as_str())
            .map(str::to_string)
            .unwrap_or(text);
        return Err(LlmError::ApiError { status, message: msg });
    }
    Ok(serde_json::from_str(&text)?)
}

/// First `output_text` item across the Responses API `output` blocks.
fn parse_responses_output(json: &serde_json::Value) -> Result<String, LlmError> {
    json["output"]
        .as_array()
        .into_iter()
        .flatten()
        .flat_map(|block| block["content"].as_array().into_iter().flatten())
        .find(|item| item["type"].as_str() == Some("output_text"))
        .map(|item| item["text"].as_str().unwrap_or("").to_string())
        .ok_or(LlmError::EmptyOutput)
}

fn parse_chat_output(json: &serde_json::Value) -> Result<String, LlmError> {
    json["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or(LlmError::EmptyOutput)
}

fn build_client(base_url: &str, timeout: Duration) -> Result<SandboxClient, LlmError> {
    let mut client = SandboxClient::with_timeout(timeout)?;
    client.allow_url_host(base_url);
    Ok(client)
}

// ── 1. OpenAI Responses API ───────────────────────────────────────────────────

pub struct OpenAiResponsesBackend {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    api_key: String,
    client: SandboxClient,
}

impl OpenAiResponsesBackend {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let base_url = base_url.into();
        let client = build_client(&base_url, timeout)?;
        Ok(Self {
            base_url,
            model: model.into(),
            temperature: 0.3,
            api_key: api_key.into(),
            client,
        })
    }
}

#[async_trait]
impl LlmBackend for OpenAiResponsesBackend {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/responses", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": &self.model,
            "input": [
                {"role": "system", "content": [{"type": "input_text", "text": system_prompt}]},
                {"role": "user",   "content": [{"type": "input_text", "text": user_prompt}]},
            ],
            "temperature": self.temperature,
        });
        let resp = self.client.post(&url)?.bearer_auth(&self.api_key).json(&body).send().await?;
        let json = check_response_status(resp).await?;
        let text = parse_responses_output(&json)?;
        debug!(chars = text.len(), "Responses API returned text");
        Ok(text)
    }

    fn model_id(&self) -> &str { &self.model }
    fn is_local(&self) -> bool { false }
}

// ── 2. OpenAI-Compatible chat completions ─────────────────────────────────────

pub struct OpenAiCompatibleBackend {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    api_key: Option<String>,
    client: SandboxClient,
}

impl OpenAiCompatibleBackend {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let base_url = base_url.into();
        let client = build_client(&base_url, timeout)?;
        Ok(Self { base_url, model: model.into(), temperature: 0.3, api_key, client })
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(k) => req.bearer_auth(k),
            None    => req,
        }
    }
}

/// Chat endpoints are addressed relative to a base that may or may not
/// already end in `/v1`.
fn chat_completions_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/v1") {
        format!("{base}/chat/completions")
    } else {
        format!("{base}/v1/chat/completions")
    }
}

#[async_trait]
impl LlmBackend for OpenAiCompatibleBackend {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
        let url = chat_completions_url(&self.base_url);
        let body = serde_json::json!({
            "model":       &self.model,
            "messages":    [Message::system(system_prompt), Message::user(user_prompt)],
            "temperature": self.temperature,
        });
        let resp = self.auth(self.client.post(&url)?).json(&body).send().await?;
        let json = check_response_status(resp).await?;
        parse_chat_output(&json)
    }

    fn model_id(&self) -> &str { &self.model }
    fn is_local(&self) -> bool { false }
}

// ── 3. Ollama (local) ─────────────────────────────────────────────────────────

pub struct OllamaBackend {
    pub base_url: String,
    pub model: String,
    client: SandboxClient,
}

impl OllamaBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self, LlmError> {
        let base_url = base_url.into();
        let client = build_client(&base_url, timeout)?;
        Ok(Self { base_url, model: model.into(), client })
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model":    &self.model,
            "messages": [Message::system(system_prompt), Message::user(user_prompt)],
            "stream":   false,
            "options":  {"temperature": 0.3},
        });
        let resp = self.client.post(&url)?.json(&body).send().await?;
        let json = check_response_status(resp).await?;
        json["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or(LlmError::EmptyOutput)
    }

    fn model_id(&self) -> &str { &self.model }
    fn is_local(&self) -> bool { true }
}
