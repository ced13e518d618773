//! AI column-mapping providers.
//!
//! The mapping oracle sits behind one trait, [`MappingProvider`], with
//! interchangeable backends (Anthropic, OpenAI). All providers accept the
//! same schema-description shape (`field -> {type, required, description}`)
//! so prompts stay consistent, and all return the same
//! [`MappingSuggestion`] list.
//!
//! Provider selection is per tenant and feature: the `ai_config` store
//! table names a provider (and optionally a model); anything missing or
//! unreadable falls back to the default provider.

pub mod anthropic;
pub mod openai;
pub mod prompt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use crate::error::{ProviderError, ProviderResult};
use crate::store::RecordStore;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

/// Default provider when a tenant has no configuration.
const DEFAULT_PROVIDER: &str = "anthropic";

/// One column-mapping suggestion from the AI provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingSuggestion {
    /// Original CSV header.
    pub csv_column: String,
    /// Suggested store field. `None` means skip/discard.
    pub db_field: Option<String>,
    /// Confidence 0.0-1.0.
    pub confidence: f64,
    /// Provider's explanation.
    pub reasoning: String,
}

/// An AI backend capable of suggesting column mappings.
#[async_trait]
pub trait MappingProvider: Send + Sync + std::fmt::Debug {
    /// Short provider identifier ("anthropic", "openai").
    fn provider_name(&self) -> &'static str;

    /// Suggest a mapping for each of `headers`.
    ///
    /// `column_samples` carries one representative non-empty value per
    /// column (not full row dumps), keeping token cost proportional to the
    /// number of uncertain columns rather than rows.
    async fn suggest_column_mappings(
        &self,
        headers: &[String],
        column_samples: &HashMap<String, String>,
        schema_description: &Value,
    ) -> ProviderResult<Vec<MappingSuggestion>>;
}

/// Instantiate a provider by name.
pub fn create_provider(
    name: &str,
    model: Option<String>,
) -> ProviderResult<Arc<dyn MappingProvider>> {
    match name.to_lowercase().as_str() {
        "anthropic" => Ok(Arc::new(AnthropicProvider::from_env(model)?)),
        "openai" => Ok(Arc::new(OpenAiProvider::from_env(model)?)),
        other => Err(ProviderError::Configuration(format!(
            "Unknown AI provider: {}",
            other
        ))),
    }
}

/// Resolve the provider configured for a tenant and feature.
///
/// Reads the `ai_config` table through the record store. A failed or empty
/// lookup falls back to the default provider; a configured provider that
/// cannot be constructed (missing API key, unknown name) is a hard
/// configuration error.
pub async fn resolve_provider(
    store: &dyn RecordStore,
    tenant_id: &str,
    feature: &str,
) -> ProviderResult<Arc<dyn MappingProvider>> {
    let lookup = store
        .select(
            "ai_config",
            &["provider", "model", "feature"],
            "company_id",
            tenant_id,
        )
        .await;

    if let Ok(rows) = lookup {
        if let Some(row) = rows
            .iter()
            .find(|r| r.get("feature").and_then(Value::as_str) == Some(feature))
        {
            let name = row
                .get("provider")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_PROVIDER);
            let model = row
                .get("model")
                .and_then(Value::as_str)
                .map(str::to_string);
            return create_provider(name, model);
        }
    }

    create_provider(DEFAULT_PROVIDER, None)
}

/// Availability info for one provider, for the `/api/providers` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub name: &'static str,
    pub display_name: &'static str,
    pub available: bool,
    pub default_model: &'static str,
}

/// List known providers and whether their API keys are present.
pub fn available_providers() -> Vec<ProviderInfo> {
    vec![
        ProviderInfo {
            name: "anthropic",
            display_name: "Claude (Anthropic)",
            available: env::var("ANTHROPIC_API_KEY").is_ok(),
            default_model: anthropic::DEFAULT_MODEL,
        },
        ProviderInfo {
            name: "openai",
            display_name: "GPT (OpenAI)",
            available: env::var("OPENAI_API_KEY").is_ok(),
            default_model: openai::DEFAULT_MODEL,
        },
    ]
}

/// Parse a provider's text response into suggestions.
///
/// Tolerates markdown code fences around the JSON payload.
pub(crate) fn parse_suggestions(text: &str) -> ProviderResult<Vec<MappingSuggestion>> {
    let json_str = extract_json(text);
    let data: Value = serde_json::from_str(&json_str)
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

    let items = data
        .get("mappings")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::InvalidResponse("missing 'mappings' array".into()))?;

    let mut suggestions = Vec::with_capacity(items.len());
    for item in items {
        let csv_column = item
            .get("csv_column")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::InvalidResponse("mapping missing 'csv_column'".into()))?
            .to_string();
        suggestions.push(MappingSuggestion {
            csv_column,
            db_field: item
                .get("db_field")
                .and_then(Value::as_str)
                .map(str::to_string),
            confidence: item.get("confidence").and_then(Value::as_f64).unwrap_or(0.5),
            reasoning: item
                .get("reasoning")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }
    Ok(suggestions)
}

/// Extract JSON from a response that may contain markdown code blocks.
fn extract_json(text: &str) -> String {
    if let Some(start) = text.find("```json") {
        let json_start = start + 7;
        if let Some(end) = text[json_start..].find("```") {
            return text[json_start..json_start + end].trim().to_string();
        }
    }

    if let Some(start) = text.find("```") {
        let after_start = start + 3;
        let content_start = text[after_start..]
            .find('\n')
            .map(|i| after_start + i + 1)
            .unwrap_or(after_start);
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim().to_string();
        }
    }

    if let Some(start) = text.find('{') {
        if let Some(end) = text.rfind('}') {
            if start < end {
                return text[start..=end].to_string();
            }
        }
    }

    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_suggestions_plain_json() {
        let text = r#"{"mappings": [
            {"csv_column": "Company", "db_field": "name", "confidence": 0.9, "reasoning": "direct match"},
            {"csv_column": "Junk", "db_field": null, "confidence": 0.0, "reasoning": "no mapping"}
        ]}"#;

        let suggestions = parse_suggestions(text).unwrap();
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].db_field.as_deref(), Some("name"));
        assert_eq!(suggestions[1].db_field, None);
    }

    #[test]
    fn test_parse_suggestions_in_code_fence() {
        let text = "Here you go:\n```json\n{\"mappings\": [{\"csv_column\": \"A\", \"db_field\": null, \"confidence\": 0.2, \"reasoning\": \"unclear\"}]}\n```\nDone.";
        let suggestions = parse_suggestions(text).unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].confidence, 0.2);
    }

    #[test]
    fn test_parse_suggestions_rejects_garbage() {
        let err = parse_suggestions("sorry, I cannot do that").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn test_unknown_provider_name() {
        let err = create_provider("mystery", None).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert!(err.to_string().contains("mystery"));
    }

    #[tokio::test]
    async fn test_resolve_falls_back_without_config() {
        // No ai_config rows: resolution falls back to the default provider.
        // Without an API key in the environment this is a configuration
        // error, which is exactly what the analyze call must surface.
        let store = crate::store::MemoryStore::new();
        let result = resolve_provider(&store, "t1", "csv_mapping").await;
        match result {
            Ok(p) => assert_eq!(p.provider_name(), "anthropic"),
            Err(e) => assert!(matches!(e, ProviderError::Configuration(_))),
        }
    }
}
