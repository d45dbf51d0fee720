//! # skillassess-agent
//!
//! Model-call layer for skillassess: a [`ModelClient`] abstraction over hosted
//! language models, concrete providers, bounded retry with backoff, and a
//! shared [`ThrottledClient`] for concurrent runs.

mod deepseek;
mod gemini;
mod output;
mod retry;
mod throttle;
mod traits;

use std::sync::Arc;

pub use deepseek::DeepSeekClient;
pub use gemini::GeminiClient;
pub use output::{extract_json_payload, ModelResponse};
pub use retry::RetryPolicy;
pub use throttle::{Throttle, ThrottledClient};
pub use traits::{
    FailureKind, ModelClient, ModelError, ModelRequest, ProviderConfig, ProviderType,
    RetryCallback, RetryNotice, RetryReason, SchemaHint,
};

/// Create a client for the configured provider
pub fn create_client(config: &ProviderConfig) -> Result<Arc<dyn ModelClient>, ModelError> {
    match config.provider {
        ProviderType::Gemini => Ok(Arc::new(GeminiClient::new(config)?)),
        ProviderType::DeepSeek => Ok(Arc::new(DeepSeekClient::new(config)?)),
    }
}
