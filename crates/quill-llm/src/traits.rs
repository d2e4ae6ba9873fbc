use crate::error::CompletionError;
use crate::types::HistoryEntry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Adapter to an external generative-text service.
///
/// Implementations send `history` as prior context and `prompt` as the single
/// new user message. The prompt must not be repeated inside the history.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Short provider name used in logs
    fn provider(&self) -> &str;

    /// Non-streaming completion
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, CompletionError>;
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub history: Vec<HistoryEntry>,
    pub prompt: String,
    pub config: GenerationConfig,
}

impl CompletionRequest {
    pub fn new(
        model: impl Into<String>,
        history: Vec<HistoryEntry>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            history,
            prompt: prompt.into(),
            config: GenerationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }
}

/// Sampling parameters, passed through to the provider untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
}

impl GenerationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: Option<TokenUsage>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}
