use async_trait::async_trait;
use serde::Deserialize;
use std::time::Instant;
use tracing::debug;

use crate::{ModelClient, ModelError, ModelRequest, ModelResponse, ProviderConfig};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini client using the `generateContent` REST endpoint
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, ModelError> {
        if config.api_key.trim().is_empty() {
            return Err(ModelError::Config("Gemini API key is empty".into()));
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

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

/// Pull the text out of a `generateContent` body, rejecting blocked or
/// truncated candidates.
fn extract_text(body: GenerateResponse) -> Result<String, ModelError> {
    let candidate = body
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ModelError::Incomplete("response was blocked or empty".into()))?;

    match candidate.finish_reason.as_deref() {
        None | Some("STOP") => {}
        Some("MAX_TOKENS") => {
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

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ModelError::Incomplete("response contained no text".into()));
    }
    Ok(text)
}

#[async_trait]
impl ModelClient for GeminiClient {
    fn name(&self) -> &str {
        "Gemini"
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
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.prompt }]
            }],
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_output_tokens,
                "responseMimeType": "application/json"
            }
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
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

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Transport(format!("Invalid response body: {}", e)))?;

        let text = extract_text(parsed)?;
        let duration = start.elapsed();
        debug!(duration_ms = duration.as_millis(), "Model call completed");
        Ok(ModelResponse::new(text, duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProviderType;

    fn parse(json: &str) -> GenerateResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let body = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"text":"1}"}]},"finishReason":"STOP"}]}"#,
        );
        assert_eq!(extract_text(body).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_extract_text_rejects_truncation() {
        let body = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"{"}]},"finishReason":"MAX_TOKENS"}]}"#,
        );
        assert!(matches!(extract_text(body), Err(ModelError::Incomplete(_))));
    }

    #[test]
    fn test_extract_text_rejects_blocked() {
        assert!(matches!(
            extract_text(parse(r#"{"candidates":[]}"#)),
            Err(ModelError::Incomplete(_))
        ));
        let body = parse(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#);
        assert!(matches!(extract_text(body), Err(ModelError::Incomplete(_))));
    }

    #[test]
    fn test_rejects_empty_key() {
        let config = ProviderConfig::new(ProviderType::Gemini, "  ".into());
        assert!(matches!(GeminiClient::new(&config), Err(ModelError::Config(_))));
    }

    #[test]
    fn test_endpoint_uses_model() {
        let config = ProviderConfig::new(ProviderType::Gemini, "key".into())
            .with_base_url("http://localhost:9000/v1beta/".into());
        let client = GeminiClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint(),
            "http://localhost:9000/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }
}
