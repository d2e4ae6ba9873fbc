pub mod error;
pub mod rate_limit;
pub mod validate;
pub mod credit;
pub mod history;
pub mod committer;
pub mod pipeline;

pub use error::{FieldError, PipelineError, Result};
pub use rate_limit::{InMemoryRateLimiter, RateLimitConfig, RateLimitExceeded, RateLimiter};
pub use validate::{validate, MessageRequest, ValidatedMessage};
pub use credit::{CreditGate, CreditLedger, TurnKind};
pub use history::{project, ProjectedContext};
pub use committer::{PersistenceCommitter, RetryPolicy};
pub use pipeline::{MessageOutcome, MessagePipeline, MessagePipelineBuilder, PipelineConfig, Stage};
