//! Generic import pipeline: analyze, validate, execute.
//!
//! One [`ImportService`] per configured module drives the whole import:
//!
//! 1. `analyze`: hybrid column classification. Rules resolve the obvious
//!    columns; only the uncertain remainder goes to the AI provider, behind
//!    a response cache and a per-tenant rate limit.
//! 2. `validate`: required fields, intra-file duplicates, store conflicts,
//!    numeric checks, and dependent-group collection. Returns structured
//!    data, never errors, for anything the caller can act on per row.
//! 3. `execute`: re-validates, gates on conflicts, builds records, and
//!    bulk-inserts in one store call with exact accounting.

mod execute;
mod validate;

pub(crate) use validate::parse_number;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use crate::ai::{resolve_provider, MappingProvider, MappingSuggestion};
use crate::cache::{cache_key, AnalysisCache};
use crate::classifier::{classify_columns, detect_column_pairs, prefilter_columns};
use crate::config::ImportModuleConfig;
use crate::error::{ImportError, ImportResult, ProviderError};
use crate::limiter::RateLimiter;
use crate::store::RecordStore;

/// Provider feature key used for ai_config lookups.
const MAPPING_FEATURE: &str = "csv_mapping";

/// One parsed CSV row: column name -> raw value.
pub type Row = HashMap<String, String>;

/// A column mapping in an analyze response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub csv_column: String,
    pub db_field: Option<String>,
    pub confidence: f64,
    pub reasoning: String,
    /// True when the mapping needs human review (confidence < 0.7).
    pub needs_review: bool,
}

/// A detected qty/price column pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPair {
    pub qty_column: String,
    pub price_column: String,
}

/// Analyze result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeOutcome {
    pub mappings: Vec<ColumnMapping>,
    /// Required fields no column mapped to.
    pub unmapped_required: Vec<String>,
    /// Columns that will not be imported.
    pub discarded_columns: Vec<String>,
    /// "rule-based" or "hybrid (<provider>)".
    pub ai_provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_pairs: Option<Vec<ColumnPair>>,
}

/// A uniqueness collision the caller may choose to skip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub row_number: usize,
    /// "csv_duplicate", "duplicate_<field>", "customer_not_found", ...
    pub conflict_type: String,
    pub field: String,
    pub value: String,
    /// Id of the colliding store record; empty for intra-file duplicates.
    #[serde(default)]
    pub existing_id: String,
    pub message: String,
}

/// An unconditional per-row defect (missing required value, bad number).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowError {
    pub row_number: usize,
    /// "missing_<field>" or "invalid_<field>".
    pub error_type: String,
    pub field: String,
    pub message: String,
}

/// Validate result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateOutcome {
    pub has_conflicts: bool,
    pub conflicts: Vec<Conflict>,
    pub validation_errors: Vec<RowError>,
    pub valid_rows_count: usize,
    pub conflict_rows_count: usize,
    pub error_rows_count: usize,
    pub skipped_rows_count: usize,
    /// Group names queued for auto-creation, sorted. Present only for
    /// modules with a group config when the caller opted in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups_to_create: Option<Vec<String>>,
}

/// Execute result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteOutcome {
    pub success: bool,
    pub imported_count: usize,
    pub skipped_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups_created: Option<usize>,
    pub errors: Vec<RowError>,
}

/// How rows bind to customers for composite-unique modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerMatchMode {
    /// Every row belongs to one selected customer.
    AllToOne,
    /// Each row resolves its customer by a code column.
    ByColumn,
    /// No customer binding; records are generic.
    #[default]
    AllGeneric,
}

/// Module-specific options for validate/execute.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportOptions {
    /// Auto-create missing dependent groups (group modules only).
    #[serde(default)]
    pub create_groups: bool,
    #[serde(default)]
    pub customer_match_mode: CustomerMatchMode,
    #[serde(default)]
    pub selected_customer_id: Option<String>,
    /// Detected pricing pairs, echoed back from the analyze response.
    #[serde(default)]
    pub pricing_pairs: Vec<ColumnPair>,
}

/// Import pipeline for one configured module.
pub struct ImportService {
    config: Arc<ImportModuleConfig>,
    store: Arc<dyn RecordStore>,
    cache: AnalysisCache,
    limiter: RateLimiter,
    /// Fixed provider instead of per-tenant resolution (tests).
    provider_override: Option<Arc<dyn MappingProvider>>,
}

impl ImportService {
    pub fn new(config: Arc<ImportModuleConfig>, store: Arc<dyn RecordStore>) -> Self {
        let cache = AnalysisCache::from_env(&config.module_name);
        Self {
            config,
            store,
            cache,
            limiter: RateLimiter::default(),
            provider_override: None,
        }
    }

    /// Override the cache (tests).
    pub fn with_cache(mut self, cache: AnalysisCache) -> Self {
        self.cache = cache;
        self
    }

    /// Override the rate limiter (tests).
    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// Pin the AI provider, bypassing per-tenant resolution (tests).
    pub fn with_provider(mut self, provider: Arc<dyn MappingProvider>) -> Self {
        self.provider_override = Some(provider);
        self
    }

    pub fn config(&self) -> &ImportModuleConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    /// Analyze CSV headers and sample rows, returning mapping suggestions.
    ///
    /// A cache hit short-circuits everything, including the rate limiter.
    /// Provider transport/parse failures degrade the uncertain columns to
    /// zero-confidence discards instead of failing the call; provider
    /// configuration failures are hard errors.
    pub async fn analyze(
        &self,
        tenant_id: &str,
        headers: &[String],
        sample_rows: &[Vec<String>],
    ) -> ImportResult<AnalyzeOutcome> {
        let key = cache_key(&self.config.module_name, tenant_id, headers);
        if let Some(cached) = self.cache.get::<AnalyzeOutcome>(&key) {
            info!(module = %self.config.module_name, "analyze cache hit");
            return Ok(cached);
        }

        if !self.limiter.check(tenant_id) {
            return Err(ImportError::RateLimited);
        }

        // 1. Claim pricing pairs before anything else sees those columns
        let (detected_pairs, pair_columns) = match &self.config.column_pair_config {
            Some(cfg) => detect_column_pairs(headers, &cfg.qty_pattern, &cfg.price_pattern),
            None => (Vec::new(), HashSet::new()),
        };

        // 2. Drop empty columns and cap the width of the AI request
        let prefiltered = prefilter_columns(headers, sample_rows, &pair_columns);

        // 3. Rule-based classification of what's left
        let (rule_resolved, uncertain) = classify_columns(
            &prefiltered.headers,
            &prefiltered.sample_rows,
            &self.config,
            &pair_columns,
        );
        let mut resolved = prefiltered.resolved;
        resolved.extend(rule_resolved);

        // 4. AI pass over the uncertain columns only
        let mut ai_suggestions: Vec<MappingSuggestion> = Vec::new();
        let mut ai_provider_name = "rule-based".to_string();

        if !uncertain.is_empty() {
            let samples =
                column_samples(&prefiltered.headers, &prefiltered.sample_rows, &uncertain);
            let schema_description = self.config.schema_description();

            let provider = match &self.provider_override {
                Some(provider) => provider.clone(),
                None => resolve_provider(self.store.as_ref(), tenant_id, MAPPING_FEATURE).await?,
            };
            ai_provider_name = format!("hybrid ({})", provider.provider_name());

            match provider
                .suggest_column_mappings(&uncertain, &samples, &schema_description)
                .await
            {
                Ok(suggestions) => ai_suggestions = suggestions,
                Err(ProviderError::Configuration(msg)) => {
                    return Err(ProviderError::Configuration(msg).into());
                }
                Err(e) => {
                    // Degrade: the rule-resolved mappings are still useful
                    warn!(module = %self.config.module_name, error = %e, "provider failed, degrading uncertain columns");
                    ai_suggestions = uncertain
                        .iter()
                        .map(|h| MappingSuggestion {
                            csv_column: h.clone(),
                            db_field: None,
                            confidence: 0.0,
                            reasoning: format!("AI response parsing failed: {}", e),
                        })
                        .collect();
                }
            }
        }

        // 5. Merge rule and AI results into one mapping list
        let mut mappings = Vec::new();
        let mut discarded_columns = Vec::new();
        let mut mapped_db_fields: HashSet<String> = HashSet::new();

        for c in resolved {
            match &c.db_field {
                Some(field) => {
                    mapped_db_fields.insert(field.clone());
                }
                None => discarded_columns.push(c.csv_column.clone()),
            }
            mappings.push(ColumnMapping {
                needs_review: c.confidence < 0.7,
                csv_column: c.csv_column,
                db_field: c.db_field,
                confidence: c.confidence,
                reasoning: c.reasoning,
            });
        }

        for s in ai_suggestions {
            match &s.db_field {
                Some(field) => {
                    mapped_db_fields.insert(field.clone());
                }
                None => discarded_columns.push(s.csv_column.clone()),
            }
            mappings.push(ColumnMapping {
                needs_review: s.confidence < 0.7,
                csv_column: s.csv_column,
                db_field: s.db_field,
                confidence: s.confidence,
                reasoning: format!("{} (AI)", s.reasoning),
            });
        }

        // Pair-claimed columns are imported through the pricing array, not
        // as regular fields
        for col in headers.iter().filter(|h| pair_columns.contains(*h)) {
            if !discarded_columns.contains(col) {
                discarded_columns.push(col.clone());
            }
        }

        let unmapped_required: Vec<String> = self
            .config
            .required_fields()
            .into_iter()
            .filter(|f| !mapped_db_fields.contains(*f))
            .map(str::to_string)
            .collect();

        let outcome = AnalyzeOutcome {
            mappings,
            unmapped_required,
            discarded_columns,
            ai_provider: ai_provider_name,
            column_pairs: self.config.column_pair_config.as_ref().map(|_| {
                detected_pairs
                    .iter()
                    .map(|(qty, price)| ColumnPair {
                        qty_column: qty.clone(),
                        price_column: price.clone(),
                    })
                    .collect()
            }),
        };

        self.cache.put(&key, &outcome);
        Ok(outcome)
    }
}

/// One representative non-empty sample value per wanted column.
fn column_samples(
    headers: &[String],
    sample_rows: &[Vec<String>],
    wanted: &[String],
) -> HashMap<String, String> {
    let wanted_set: HashSet<&str> = wanted.iter().map(String::as_str).collect();
    let mut samples: HashMap<String, String> = HashMap::new();

    for row in sample_rows {
        for (i, header) in headers.iter().enumerate() {
            if !wanted_set.contains(header.as_str()) || samples.contains_key(header) {
                continue;
            }
            if let Some(value) = row.get(i) {
                let value = value.trim();
                if !value.is_empty() {
                    samples.insert(header.clone(), value.to_string());
                }
            }
        }
        if samples.len() >= wanted.len() {
            break;
        }
    }
    samples
}

/// "material_cost" -> "Material Cost", for user-facing messages.
pub(crate) fn title_case(field: &str) -> String {
    field
        .split('_')
        .filter(|s| !s.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// db_field -> csv_column, dropping unmapped entries.
pub(crate) fn reverse_mappings(mappings: &HashMap<String, String>) -> HashMap<String, String> {
    mappings
        .iter()
        .filter(|(_, db)| !db.is_empty())
        .map(|(csv, db)| (db.clone(), csv.clone()))
        .collect()
}

/// Trimmed value of `field`'s mapped column in `row`, if any.
pub(crate) fn mapped_value<'a>(
    row: &'a Row,
    reverse: &HashMap<String, String>,
    field: &str,
) -> Option<&'a str> {
    reverse
        .get(field)
        .and_then(|csv_col| row.get(csv_col))
        .map(|v| v.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnPairConfig, FieldDefinition, FieldType};
    use crate::error::ProviderResult;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use tempfile::tempdir;

    /// Canned or failing provider for analyze tests.
    #[derive(Debug)]
    struct StubProvider {
        suggestions: Option<Vec<MappingSuggestion>>,
    }

    #[async_trait]
    impl MappingProvider for StubProvider {
        fn provider_name(&self) -> &'static str {
            "stub"
        }

        async fn suggest_column_mappings(
            &self,
            headers: &[String],
            _column_samples: &HashMap<String, String>,
            _schema_description: &serde_json::Value,
        ) -> ProviderResult<Vec<MappingSuggestion>> {
            match &self.suggestions {
                Some(s) => Ok(s
                    .iter()
                    .filter(|s| headers.contains(&s.csv_column))
                    .cloned()
                    .collect()),
                None => Err(ProviderError::Transport("connection reset".into())),
            }
        }
    }

    fn test_config() -> ImportModuleConfig {
        let schema = vec![
            FieldDefinition::new("customer_code", FieldType::String)
                .required()
                .patterns(&[r"(customer[_\s-]?code|code)$"]),
            FieldDefinition::new("name", FieldType::String)
                .required()
                .patterns(&[r"(name|company[_\s-]?name)$"]),
            FieldDefinition::new("tier", FieldType::String),
        ];
        let mut config = ImportModuleConfig::new("widgets", "widgets", schema);
        config.domain_hints = vec!["customer".into()];
        config
    }

    fn service(config: ImportModuleConfig) -> ImportService {
        ImportService::new(Arc::new(config), Arc::new(MemoryStore::new()))
            .with_cache(AnalysisCache::disabled())
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[tokio::test]
    async fn test_analyze_rule_only() {
        let svc = service(test_config());
        let hdrs = headers(&["Code", "Company Name", "created_at"]);
        let samples = rows(&[&["C1", "Acme", "2024-01-01"], &["C2", "Globex", "2024-01-02"]]);

        let out = svc.analyze("t1", &hdrs, &samples).await.unwrap();
        assert_eq!(out.ai_provider, "rule-based");
        assert_eq!(out.mappings.len(), 3);
        assert_eq!(out.discarded_columns, vec!["created_at"]);
        // Required name field was matched; tier was not declared required
        assert!(out.unmapped_required.is_empty());
        assert!(out.column_pairs.is_none());
        for m in &out.mappings {
            assert_eq!(m.needs_review, m.confidence < 0.7);
        }
    }

    #[tokio::test]
    async fn test_analyze_reports_unmapped_required() {
        let svc = service(test_config());
        let hdrs = headers(&["Company Name"]);
        let samples = rows(&[&["Acme"]]);

        let out = svc.analyze("t1", &hdrs, &samples).await.unwrap();
        assert_eq!(out.unmapped_required, vec!["customer_code"]);
    }

    #[tokio::test]
    async fn test_analyze_merges_ai_suggestions() {
        let stub = StubProvider {
            suggestions: Some(vec![MappingSuggestion {
                csv_column: "customer_tier".to_string(),
                db_field: Some("tier".to_string()),
                confidence: 0.65,
                reasoning: "sample values look like tier labels".to_string(),
            }]),
        };
        let svc = service(test_config()).with_provider(Arc::new(stub));
        let hdrs = headers(&["Code", "Company Name", "customer_tier"]);
        let samples = rows(&[&["C1", "Acme", "gold"], &["C2", "Globex", "silver"]]);

        let out = svc.analyze("t1", &hdrs, &samples).await.unwrap();
        assert_eq!(out.ai_provider, "hybrid (stub)");
        let tier = out
            .mappings
            .iter()
            .find(|m| m.csv_column == "customer_tier")
            .unwrap();
        assert_eq!(tier.db_field.as_deref(), Some("tier"));
        assert!(tier.reasoning.ends_with("(AI)"));
        // 0.65 < 0.7: flagged for human review
        assert!(tier.needs_review);
    }

    #[tokio::test]
    async fn test_analyze_degrades_on_provider_failure() {
        let svc = service(test_config())
            .with_provider(Arc::new(StubProvider { suggestions: None }));
        let hdrs = headers(&["Code", "customer_tier"]);
        let samples = rows(&[&["C1", "gold"], &["C2", "silver"]]);

        let out = svc.analyze("t1", &hdrs, &samples).await.unwrap();
        // Rule-resolved mapping survives, the uncertain column degrades
        assert_eq!(out.ai_provider, "hybrid (stub)");
        let code = out.mappings.iter().find(|m| m.csv_column == "Code").unwrap();
        assert_eq!(code.db_field.as_deref(), Some("customer_code"));
        let tier = out
            .mappings
            .iter()
            .find(|m| m.csv_column == "customer_tier")
            .unwrap();
        assert_eq!(tier.db_field, None);
        assert_eq!(tier.confidence, 0.0);
        assert!(out.discarded_columns.contains(&"customer_tier".to_string()));
    }

    #[tokio::test]
    async fn test_analyze_pair_columns_claimed_and_discarded() {
        let mut config = test_config();
        config.column_pair_config = Some(ColumnPairConfig::new(
            r"qty(\d+)$",
            r"price(\d+)$",
            "pricing",
        ));
        let svc = service(config);
        let hdrs = headers(&["Code", "qty1", "price1", "qty2", "price2"]);
        let samples = rows(&[&["C1", "10", "5.00", "100", "4.00"]]);

        let out = svc.analyze("t1", &hdrs, &samples).await.unwrap();
        let pairs = out.column_pairs.unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].qty_column, "qty1");
        assert_eq!(pairs[1].price_column, "price2");
        for col in ["qty1", "price1", "qty2", "price2"] {
            assert!(out.discarded_columns.contains(&col.to_string()));
        }
    }

    #[tokio::test]
    async fn test_analyze_cache_short_circuits_rate_limit() {
        let dir = tempdir().unwrap();
        let cache = AnalysisCache::with_dir(dir.path(), true);
        // Limiter that always rejects: only a cache hit can succeed
        let svc = ImportService::new(Arc::new(test_config()), Arc::new(MemoryStore::new()))
            .with_cache(cache)
            .with_limiter(RateLimiter::new(0, std::time::Duration::from_secs(60)));

        let hdrs = headers(&["Code", "Company Name"]);
        let samples = rows(&[&["C1", "Acme"]]);

        let err = svc.analyze("t1", &hdrs, &samples).await.unwrap_err();
        assert!(matches!(err, ImportError::RateLimited));

        // Seed the cache entry and retry: the limiter is never consulted
        let cached = AnalyzeOutcome {
            mappings: vec![],
            unmapped_required: vec![],
            discarded_columns: vec![],
            ai_provider: "rule-based".to_string(),
            column_pairs: None,
        };
        let key = cache_key("widgets", "t1", &hdrs);
        AnalysisCache::with_dir(dir.path(), true).put(&key, &cached);

        let out = svc.analyze("t1", &hdrs, &samples).await.unwrap();
        assert_eq!(out.ai_provider, "rule-based");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("customer_code"), "Customer Code");
        assert_eq!(title_case("name"), "Name");
    }

    #[test]
    fn test_column_samples_picks_first_non_empty() {
        let headers = vec!["a".to_string(), "b".to_string()];
        let rows = vec![
            vec!["".to_string(), "x".to_string()],
            vec!["1".to_string(), "y".to_string()],
        ];
        let samples = column_samples(&headers, &rows, &headers);
        assert_eq!(samples["a"], "1");
        assert_eq!(samples["b"], "x");
    }

    #[test]
    fn test_reverse_mappings_skips_unmapped() {
        let mut m = HashMap::new();
        m.insert("Code".to_string(), "customer_code".to_string());
        m.insert("Junk".to_string(), "".to_string());
        let rev = reverse_mappings(&m);
        assert_eq!(rev.get("customer_code").unwrap(), "Code");
        assert_eq!(rev.len(), 1);
    }
}
