// Configuration layer for provider-agnostic completion client creation

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::traits::CompletionClient;

/// Base URL of Gemini's OpenAI-compatible surface
pub const GEMINI_OPENAI_COMPAT_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Type of completion provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    #[default]
    Gemini,
    #[serde(rename = "openai_compat")]
    OpenAICompat,
}

/// Configuration for the native Gemini provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Configuration for an OpenAI-compatible provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAICompatConfig {
    pub api_key: String,
    /// Defaults to Gemini's compatibility endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Provider-specific configuration details
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderDetails {
    Gemini(GeminiConfig),
    #[serde(rename = "openai_compat")]
    OpenAICompat(OpenAICompatConfig),
}

/// Complete provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(flatten)]
    pub details: ProviderDetails,
    /// Per-request HTTP timeout applied to the underlying client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ProviderConfig {
    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self {
            details: ProviderDetails::Gemini(GeminiConfig {
                api_key: api_key.into(),
                base_url: None,
            }),
            timeout_secs: None,
        }
    }

    pub fn openai_compat(api_key: impl Into<String>) -> Self {
        Self {
            details: ProviderDetails::OpenAICompat(OpenAICompatConfig {
                api_key: api_key.into(),
                base_url: None,
            }),
            timeout_secs: None,
        }
    }

    /// Build from a provider type plus the common key/base pair
    pub fn from_parts(
        provider: ProviderType,
        api_key: impl Into<String>,
        base_url: Option<String>,
    ) -> Self {
        let api_key = api_key.into();
        let details = match provider {
            ProviderType::Gemini => ProviderDetails::Gemini(GeminiConfig { api_key, base_url }),
            ProviderType::OpenAICompat => {
                ProviderDetails::OpenAICompat(OpenAICompatConfig { api_key, base_url })
            }
        };
        Self {
            details,
            timeout_secs: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs());
        self
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn provider_type(&self) -> ProviderType {
        match self.details {
            ProviderDetails::Gemini(_) => ProviderType::Gemini,
            ProviderDetails::OpenAICompat(_) => ProviderType::OpenAICompat,
        }
    }
}

/// Factory for creating completion clients from configuration
pub struct ClientFactory;

impl ClientFactory {
    pub fn create_client(config: ProviderConfig) -> Result<Arc<dyn CompletionClient>> {
        let timeout = config.timeout();
        match config.details {
            ProviderDetails::Gemini(gemini) => {
                let mut builder = crate::gemini::GeminiClient::builder().api_key(gemini.api_key);
                if let Some(base_url) = gemini.base_url {
                    builder = builder.base_url(base_url);
                }
                if let Some(timeout) = timeout {
                    builder = builder.timeout(timeout);
                }
                Ok(Arc::new(builder.build()?))
            }
            ProviderDetails::OpenAICompat(compat) => {
                let base_url = compat
                    .base_url
                    .unwrap_or_else(|| GEMINI_OPENAI_COMPAT_BASE.to_string());
                let client =
                    crate::openai::OpenAICompatClient::new_with_timeout(compat.api_key, timeout)?
                    .with_base_url(base_url);
                Ok(Arc::new(client))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_config() {
        let config = ProviderConfig::gemini("test-key");
        assert_eq!(config.provider_type(), ProviderType::Gemini);
    }

    #[test]
    fn test_from_parts() {
        let config = ProviderConfig::from_parts(
            ProviderType::OpenAICompat,
            "test-key",
            Some("http://localhost:8080/v1".to_string()),
        );
        assert_eq!(config.provider_type(), ProviderType::OpenAICompat);
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = ProviderConfig::openai_compat("test-key");

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"type\":\"openai_compat\""));
        let deserialized: ProviderConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config.provider_type(), deserialized.provider_type());
    }

    #[test]
    fn test_factory_creates_client() {
        let client = ClientFactory::create_client(ProviderConfig::gemini("test-key")).unwrap();
        assert_eq!(client.provider(), "gemini");
    }

    #[test]
    fn test_timeout_carried_into_factory() {
        let config = ProviderConfig::openai_compat("test-key").with_timeout(Duration::from_secs(45));
        assert_eq!(config.timeout_secs, Some(45));

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"timeout_secs\":45"));

        let client = ClientFactory::create_client(config).unwrap();
        assert_eq!(client.provider(), "openai_compat");
    }

    #[test]
    fn test_factory_rejects_empty_key() {
        assert!(ClientFactory::create_client(ProviderConfig::gemini("")).is_err());
    }
}
