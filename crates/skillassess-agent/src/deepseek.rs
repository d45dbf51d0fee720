use async_trait::async_trait;
use serde::Deserialize;
use std::time::Instant;
use tracing::debug;

use crate::{ModelClient, ModelError, ModelRequest, ModelResponse, ProviderConfig};

const DEFAULT_BASE_URL: &str = "https://api.deepseek.com/v1";

/// DeepSeek client (OpenAI-compatible chat completions)
pub struct DeepSeekClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl DeepSeekClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, ModelError> {
        if config.api_key.trim().is_empty() {
            return Err(ModelError::Config("DeepSeek API key is empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ModelError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model_name().to_string(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<Message>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

fn extract_text(body: ChatResponse) -> Result<String, ModelError> {
    let choice = body
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ModelError::Incomplete("response contained no choices".into()))?;

    match choice.finish_reason.as_deref() {
        None | Some("stop") => {}
        Some("length") => {
            return Err(ModelError::Incomplete(
                "response exceeded the output token limit".into(),
            ))
        }
        Some(other) => {
            return Err(ModelError::Incomplete(format!(
                "generation stopped early ({})",
                other
            )))
        }
    }

    let text = choice.message.and_then(|m| m.content).unwrap_or_default();
    if text.trim().is_empty() {
        return Err(ModelError::Incomplete("response contained no text".into()));
    }
    Ok(text)
}

#[async_trait]
impl ModelClient for DeepSeekClient {
    fn name(&self) -> &str {
        "DeepSeek"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError> {
        let start = Instant::now();
        debug!(
            provider = self.name(),
            model = %self.model,
            schema = %request.schema,
            prompt_len = request.prompt.len(),
            "Calling model"
        );

        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": request.prompt }],
            "temperature": request.temperature,
            "max_tokens": request.max_output_tokens,
            "response_format": { "type": "json_object" }
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Transport(format!("Invalid response body: {}", e)))?;

        let text = extract_text(parsed)?;
        Ok(ModelResponse::new(text, start.elapsed()))
    }
}
