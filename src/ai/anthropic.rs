//! Claude (Anthropic) mapping provider.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::env;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

use super::{parse_suggestions, prompt::mapping_prompt, MappingProvider, MappingSuggestion};

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const MAX_TOKENS: u32 = 2048;

#[derive(Debug)]
pub struct AnthropicProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

/// Anthropic API response structure
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client: reqwest::Client::new(),
        }
    }

    /// Create a provider from the `ANTHROPIC_API_KEY` environment variable.
    pub fn from_env(model: Option<String>) -> ProviderResult<Self> {
        let _ = dotenvy::dotenv();
        let api_key = env::var("ANTHROPIC_API_KEY")
            .map_err(|_| ProviderError::Configuration("ANTHROPIC_API_KEY is required".into()))?;
        Ok(Self::new(api_key, model))
    }

    async fn call_api(&self, prompt: String) -> ProviderResult<String> {
        debug!(model = %self.model, "calling Anthropic API");

        let request_body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "temperature": 0,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .client
            .post(API_URL)
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<AnthropicError>(&body) {
                return Err(ProviderError::Transport(error.error.message));
            }
            return Err(ProviderError::Transport(format!("HTTP {}: {}", status, body)));
        }

        let response: AnthropicResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let text = response
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(ProviderError::InvalidResponse("Empty response".into()));
        }
        Ok(text)
    }
}

#[async_trait]
impl MappingProvider for AnthropicProvider {
    fn provider_name(&self) -> &'static str {
        "anthropic"
    }

    async fn suggest_column_mappings(
        &self,
        headers: &[String],
        column_samples: &HashMap<String, String>,
        schema_description: &Value,
    ) -> ProviderResult<Vec<MappingSuggestion>> {
        let prompt = mapping_prompt(headers, column_samples, schema_description);
        let text = self.call_api(prompt).await?;
        parse_suggestions(&text)
    }
}
