// OpenAI-compatible chat completions client

use crate::error::{non_blank, CompletionError};
use crate::traits::{Completion, CompletionClient, CompletionRequest, TokenUsage};
use crate::types::{HistoryEntry, ModelRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Chat completions client for any endpoint speaking the OpenAI wire format
/// (OpenAI itself, Gemini's `/v1beta/openai` compatibility layer, local servers).
pub struct OpenAICompatClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl OpenAICompatClient {
    /// Create new client with API key
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::new_with_timeout(api_key, None)
    }

    /// Create new client whose requests give up after `timeout`
    pub fn new_with_timeout(api_key: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let api_key = api_key.into();
        anyhow::ensure!(!api_key.trim().is_empty(), "API key is required");

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .context("Invalid API key format")?,
        );

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: OPENAI_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build chat completion request payload
    pub(crate) fn build_chat_request(&self, request: &CompletionRequest) -> Value {
        let mut messages: Vec<Value> = request.history.iter().map(convert_entry).collect();
        messages.push(serde_json::json!({
            "role": "user",
            "content": request.prompt,
        }));

        let mut payload = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "stream": false,
        });

        let config = &request.config;
        if let Some(temp) = config.temperature {
            payload["temperature"] = serde_json::json!(temp);
        }
        if let Some(max_tokens) = config.max_output_tokens {
            payload["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(top_p) = config.top_p {
            payload["top_p"] = serde_json::json!(top_p);
        }
        // top_k has no chat-completions equivalent

        payload
    }
}

/// `model` turns become `assistant` in this wire format
fn convert_entry(entry: &HistoryEntry) -> Value {
    let role = match entry.role {
        ModelRole::User => "user",
        ModelRole::Model => "assistant",
    };
    serde_json::json!({
        "role": role,
        "content": entry.text,
    })
}

// ============================================================================
// TRAIT IMPLEMENTATIONS
// ============================================================================

#[async_trait]
impl CompletionClient for OpenAICompatClient {
    fn provider(&self) -> &str {
        "openai_compat"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, CompletionError> {
        let payload = self.build_chat_request(&request);

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&payload)
            .send()
            .await
            .map_err(CompletionError::from_transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let headers = response.headers().clone();
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %error_text, "Chat completions API error");
            return Err(CompletionError::from_status(status, &headers, error_text));
        }

        let raw: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Decode(e.to_string()))?;

        // Convert to provider-agnostic response
        let choice = raw.choices.into_iter().next();
        let finish_reason = choice.as_ref().and_then(|c| c.finish_reason.clone());
        let text = choice.and_then(|c| c.message.content);

        Ok(Completion {
            text: non_blank(text)?,
            usage: raw.usage.map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason,
        })
    }
}

// ============================================================================
// WIRE RESPONSE TYPES
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
