// Gemini-specific client implementation (generateContent REST API)

use crate::error::{non_blank, CompletionError};
use crate::traits::{Completion, CompletionClient, CompletionRequest, GenerationConfig, TokenUsage};
use crate::types::{HistoryEntry, ModelRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini client (HTTP direct, no SDK)
///
/// History goes into `contents` with roles `user`/`model`; the current prompt is
/// appended once as the final `user` content, matching what a chat session's
/// `sendMessage` does.
#[derive(Debug)]
pub struct GeminiClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl GeminiClient {
    pub fn builder() -> GeminiClientBuilder {
        GeminiClientBuilder::default()
    }

    /// Create client against the public endpoint
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder().api_key(api_key).build()
    }

    /// Build generateContent payload
    pub(crate) fn build_request(&self, request: &CompletionRequest) -> Value {
        let mut contents: Vec<Value> = request
            .history
            .iter()
            .map(convert_entry)
            .collect();

        contents.push(serde_json::json!({
            "role": ModelRole::User.as_str(),
            "parts": [{ "text": request.prompt }],
        }));

        let mut payload = serde_json::json!({ "contents": contents });

        let generation_config = convert_config(&request.config);
        if !generation_config.is_empty() {
            payload["generationConfig"] = Value::Object(generation_config);
        }

        payload
    }
}

fn convert_entry(entry: &HistoryEntry) -> Value {
    serde_json::json!({
        "role": entry.role.as_str(),
        "parts": [{ "text": entry.text }],
    })
}

fn convert_config(config: &GenerationConfig) -> serde_json::Map<String, Value> {
    let mut obj = serde_json::Map::new();

    if let Some(temp) = config.temperature {
        obj.insert("temperature".to_string(), serde_json::json!(temp));
    }
    if let Some(max_tokens) = config.max_output_tokens {
        obj.insert("maxOutputTokens".to_string(), serde_json::json!(max_tokens));
    }
    if let Some(top_p) = config.top_p {
        obj.insert("topP".to_string(), serde_json::json!(top_p));
    }
    if let Some(top_k) = config.top_k {
        obj.insert("topK".to_string(), serde_json::json!(top_k));
    }

    obj
}

#[derive(Default)]
pub struct GeminiClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout: Option<Duration>,
}

impl GeminiClientBuilder {
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Override the API base (defaults to the public v1beta endpoint)
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<GeminiClient> {
        let api_key = self.api_key.context("API key is required")?;
        anyhow::ensure!(!api_key.trim().is_empty(), "API key is required");

        let base_url = self
            .base_url
            .unwrap_or_else(|| GEMINI_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&api_key).context("Invalid API key format")?,
        );

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build().context("Failed to create HTTP client")?;

        Ok(GeminiClient {
            http_client,
            base_url,
        })
    }
}

// ============================================================================
// TRAIT IMPLEMENTATIONS
// ============================================================================

#[async_trait]
impl CompletionClient for GeminiClient {
    fn provider(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, CompletionError> {
        let payload = self.build_request(&request);
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);

        tracing::debug!(
            model = %request.model,
            history_len = request.history.len(),
            "Sending Gemini generateContent request"
        );

        let response = self
            .http_client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(CompletionError::from_transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let headers = response.headers().clone();
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %error_text, "Gemini API error");
            return Err(CompletionError::from_status(status, &headers, error_text));
        }

        let raw: GeminiResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Decode(e.to_string()))?;

        let candidate = raw.candidates.into_iter().next();
        let finish_reason = candidate.as_ref().and_then(|c| c.finish_reason.clone());
        let text = candidate.and_then(|c| c.content).map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<String>()
        });

        Ok(Completion {
            text: non_blank(text)?,
            usage: raw.usage_metadata.map(|u| TokenUsage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            }),
            finish_reason,
        })
    }
}

// ============================================================================
// GEMINI-SPECIFIC RESPONSE TYPES
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}
