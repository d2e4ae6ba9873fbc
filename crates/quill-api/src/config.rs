use config::{Config as ConfigLoader, ConfigError, File};
use quill_llm::{GenerationConfig, ProviderConfig, ProviderType};
use quill_pipeline::{PipelineConfig, RateLimitConfig, RetryPolicy};
use serde::Deserialize;
use std::time::Duration;

/// Environment variables that override single keys of the file config
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("SERVER_HOST", "server.host"),
    ("SERVER_PORT", "server.port"),
    ("SERVER_DEV_MODE", "server.dev_mode"),
    ("SERVER_REQUEST_TIMEOUT_SECS", "server.request_timeout_secs"),
    ("MONGODB_DATABASE", "mongodb.database"),
    ("LLM_PROVIDER", "llm.provider"),
    ("LLM_MODEL", "llm.model"),
    ("LLM_BASE_URL", "llm.base_url"),
    ("LLM_TEMPERATURE", "llm.temperature"),
    ("LLM_MAX_OUTPUT_TOKENS", "llm.max_output_tokens"),
    ("LLM_TOP_P", "llm.top_p"),
    ("LLM_TOP_K", "llm.top_k"),
    ("LLM_TIMEOUT_SECS", "llm.timeout_secs"),
    ("RATE_LIMIT_WINDOW_SECS", "rate_limit.window_secs"),
    ("RATE_LIMIT_MAX_REQUESTS", "rate_limit.max_requests"),
    ("PERSISTENCE_MAX_ATTEMPTS", "persistence.max_attempts"),
    ("PERSISTENCE_BACKOFF_MS", "persistence.backoff_ms"),
    ("LOG_LEVEL", "logging.level"),
    ("LOG_FORMAT", "logging.format"),
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub mongodb: MongoDbConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub persistence: PersistenceSettings,
    #[serde(default)]
    pub logging: LoggingConfig,

    // Secrets (from ENV only)
    #[serde(skip)]
    pub mongodb_uri: String,
    #[serde(skip)]
    pub llm_api_key: String,
    #[serde(skip)]
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Adds internal diagnostics (`error` field) to error envelopes
    pub dev_mode: bool,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            dev_mode: false,
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    pub origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            origins: vec!["http://localhost:5173".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MongoDbConfig {
    pub database: String,
}

impl Default for MongoDbConfig {
    fn default() -> Self {
        Self {
            database: "quill".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ProviderType,
    pub model: String,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    /// Upper bound on a single completion call
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderType::Gemini,
            model: "gemini-1.5-flash".to_string(),
            base_url: None,
            temperature: Some(0.7),
            max_output_tokens: Some(1000),
            top_p: Some(0.8),
            top_k: Some(40),
            timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    pub fn generation(&self) -> GenerationConfig {
        GenerationConfig {
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            top_p: self.top_p,
            top_k: self.top_k,
        }
    }

    pub fn provider_config(&self, api_key: &str) -> ProviderConfig {
        ProviderConfig::from_parts(self.provider.clone(), api_key, self.base_url.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub window_secs: u64,
    pub max_requests: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_requests: 10,
        }
    }
}

impl From<&RateLimitSettings> for RateLimitConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        RateLimitConfig::new(Duration::from_secs(settings.window_secs), settings.max_requests)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceSettings {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 100,
        }
    }
}

impl From<&PersistenceSettings> for RetryPolicy {
    fn from(settings: &PersistenceSettings) -> Self {
        RetryPolicy::new(settings.max_attempts, Duration::from_millis(settings.backoff_ms))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. Environment variables (SERVER_, MONGODB_, LLM_, RATE_LIMIT_,
    ///    PERSISTENCE_, LOG_ prefixes)
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let mut builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false));

        for (var, key) in ENV_OVERRIDES {
            builder = builder.set_override_option(*key, std::env::var(var).ok())?;
        }

        let mut cfg: Config = builder.build()?.try_deserialize()?;

        // Secrets never live in TOML
        cfg.mongodb_uri = required_env("MONGODB_URI")?;
        cfg.llm_api_key = std::env::var("LLM_API_KEY")
            .or_else(|_| std::env::var("GEMINI_API_KEY"))
            .map_err(|_| {
                ConfigError::Message(
                    "LLM_API_KEY (or GEMINI_API_KEY) environment variable is required".to_string(),
                )
            })?;
        cfg.jwt_secret = required_env("JWT_SECRET")?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings that cannot work together
    ///
    /// The request timeout must outlast the completion timeout, otherwise the
    /// HTTP layer answers with a bare 408 before the pipeline can report the
    /// upstream timeout in its own envelope.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.request_timeout_secs <= self.llm.timeout_secs {
            return Err(ConfigError::Message(format!(
                "server.request_timeout_secs ({}) must be greater than llm.timeout_secs ({})",
                self.server.request_timeout_secs, self.llm.timeout_secs
            )));
        }
        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            model: self.llm.model.clone(),
            generation: self.llm.generation(),
            completion_timeout: Duration::from_secs(self.llm.timeout_secs),
        }
    }
}

fn required_env(var: &str) -> Result<String, ConfigError> {
    std::env::var(var)
        .map_err(|_| ConfigError::Message(format!("{} environment variable is required", var)))
}
