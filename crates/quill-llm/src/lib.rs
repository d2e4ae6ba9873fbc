pub mod types;
pub mod traits;
pub mod error;
pub mod config;
pub mod gemini;
pub mod openai;

pub use traits::{
    CompletionClient,
    CompletionRequest, Completion, GenerationConfig,
    TokenUsage,
};

pub use error::{CompletionError, DEFAULT_RETRY_AFTER_SECS};
pub use config::{ClientFactory, ProviderConfig, ProviderType};
pub use gemini::GeminiClient;
pub use openai::OpenAICompatClient;
pub use types::{HistoryEntry, ModelRole};
