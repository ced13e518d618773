//! OpenAI mapping provider.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::env;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

use super::{parse_suggestions, prompt::mapping_prompt, MappingProvider, MappingSuggestion};

pub const DEFAULT_MODEL: &str = "gpt-4o";

const API_URL: &str = "https://api.openai.com/v1/chat/completions";
const MAX_TOKENS: u32 = 8192;

#[derive(Debug)]
pub struct OpenAiProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client: reqwest::Client::new(),
        }
    }

    /// Create a provider from the `OPENAI_API_KEY` environment variable.
    pub fn from_env(model: Option<String>) -> ProviderResult<Self> {
        let _ = dotenvy::dotenv();
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| ProviderError::Configuration("OPENAI_API_KEY is required".into()))?;
        Ok(Self::new(api_key, model))
    }

    async fn call_api(&self, prompt: String) -> ProviderResult<String> {
        debug!(model = %self.model, "calling OpenAI API");

        let request_body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{"role": "user", "content": prompt}],
            "response_format": {"type": "json_object"},
        });

        let response = self
            .client
            .post(API_URL)
            .bearer_auth(&self.api_key)
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
            return Err(ProviderError::Transport(format!("HTTP {}: {}", status, body)));
        }

        let response: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let text = response
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ProviderError::InvalidResponse("Empty response".into()));
        }
        Ok(text)
    }
}

#[async_trait]
impl MappingProvider for OpenAiProvider {
    fn provider_name(&self) -> &'static str {
        "openai"
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
