use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::ModelResponse;

/// Errors that can occur during a model call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Request to model provider failed: {0}")]
    Transport(String),

    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Model provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Model response incomplete: {0}")]
    Incomplete(String),

    #[error("Model client configuration error: {0}")]
    Config(String),
}

impl ModelError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ModelError::Transport(_) | ModelError::Timeout(_) | ModelError::Incomplete(_) => true,
            ModelError::Status { status, .. } => *status == 429 || *status >= 500,
            ModelError::Config(_) => false,
        }
    }
}

/// The shape the caller expects the response text to parse into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaHint {
    /// A full assessment grid
    AssessmentGrid,
    /// A critique verdict
    CritiqueVerdict,
}

impl std::fmt::Display for SchemaHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaHint::AssessmentGrid => write!(f, "assessment-grid"),
            SchemaHint::CritiqueVerdict => write!(f, "critique-verdict"),
        }
    }
}

/// A single outbound model request
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub prompt: String,
    pub schema: SchemaHint,
    /// Sampling temperature
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl ModelRequest {
    /// Request for a grid draft (higher temperature, larger budget)
    pub fn generation(prompt: String) -> Self {
        Self {
            prompt,
            schema: SchemaHint::AssessmentGrid,
            temperature: 0.7,
            max_output_tokens: 6000,
        }
    }

    /// Request for a critique (lower temperature for consistent judgments)
    pub fn critique(prompt: String) -> Self {
        Self {
            prompt,
            schema: SchemaHint::CritiqueVerdict,
            temperature: 0.3,
            max_output_tokens: 2000,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Supported hosted model providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderType {
    Gemini,
    DeepSeek,
}

impl ProviderType {
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderType::Gemini => "gemini-2.5-flash",
            ProviderType::DeepSeek => "deepseek-chat",
        }
    }

    /// Environment variables consulted for the API key, in priority order
    pub fn api_key_vars(&self) -> &'static [&'static str] {
        match self {
            ProviderType::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            ProviderType::DeepSeek => &["DEEPSEEK_API_KEY"],
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderType::Gemini => write!(f, "gemini"),
            ProviderType::DeepSeek => write!(f, "deepseek"),
        }
    }
}

impl std::str::FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(ProviderType::Gemini),
            "deepseek" | "deep-seek" => Ok(ProviderType::DeepSeek),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// Configuration for a hosted model client.
///
/// The API key is passed in explicitly; clients never read the environment.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider: ProviderType,
    pub api_key: String,
    /// Model to use (None = provider default)
    pub model: Option<String>,
    /// Override of the provider endpoint, mainly for proxies
    pub base_url: Option<String>,
    /// HTTP-level timeout for a single request
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn new(provider: ProviderType, api_key: String) -> Self {
        Self {
            provider,
            api_key,
            model: None,
            base_url: None,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model_name(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }
}

/// How a generation or critique call ultimately failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Responses never parsed or validated within the repair bound
    MalformedOutput,
    /// The provider could not be reached within the retry bound
    Unavailable,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::MalformedOutput => write!(f, "malformed output"),
            FailureKind::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Why a call is being retried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryReason {
    /// The provider could not be reached or failed transiently
    Transport,
    /// The response did not parse or failed structural validation
    MalformedOutput,
}

/// Notice passed to a [`RetryCallback`] before each retry
#[derive(Debug, Clone)]
pub struct RetryNotice {
    pub schema: SchemaHint,
    pub reason: RetryReason,
    /// Attempt number that just failed (1-based)
    pub attempt: u32,
    pub error: String,
}

/// Callback invoked before each retry, e.g. to log it
pub type RetryCallback = Arc<dyn Fn(&RetryNotice) + Send + Sync>;

/// The core abstraction over a hosted language model
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Human-readable provider name
    fn name(&self) -> &str;

    /// Model identifier sent to the provider
    fn model(&self) -> &str;

    /// Send one request and return the raw response text
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError>;
}
