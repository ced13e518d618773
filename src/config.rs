//! Per-module import configuration.
//!
//! Each import module (customers, parts, resources, ...) is described by an
//! [`ImportModuleConfig`]: the target table, the field schema with
//! auto-mapping patterns, uniqueness rules, and optional hooks for
//! module-specific behavior (pricing pairs, group auto-creation, customer
//! linking, pre-insert record transforms).
//!
//! Configs are built once at process start and shared read-only across
//! requests via `Arc`; mapping patterns are compiled here, never per call.

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// Target field type in the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Json,
}

/// Optional value transform applied when building a record for insert.
pub type FieldTransform = fn(&str) -> Value;

/// Definition of one target field.
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    /// Store field name.
    pub name: String,
    /// Field type, drives value coercion at insert time.
    pub field_type: FieldType,
    /// Required fields block a row when their mapped column is blank.
    pub required: bool,
    /// Human-readable description, included in the AI prompt.
    pub description: String,
    /// Auto-mapping patterns, tried in order. First match wins.
    pub mapping_patterns: Vec<Regex>,
    /// Optional transform from raw CSV value to stored value.
    pub transform: Option<FieldTransform>,
}

impl FieldDefinition {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            required: false,
            description: String::new(),
            mapping_patterns: Vec::new(),
            transform: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Add auto-mapping patterns. Patterns are matched against normalized
    /// headers (lowercased, whitespace/hyphens collapsed to `_`), anchored
    /// at the start of the header.
    pub fn patterns(mut self, patterns: &[&str]) -> Self {
        for pattern in patterns {
            self.mapping_patterns.push(compile_anchored(pattern));
        }
        self
    }

    pub fn transform(mut self, transform: FieldTransform) -> Self {
        self.transform = Some(transform);
        self
    }
}

/// Compile a case-insensitive pattern anchored at the start of the input.
///
/// Anchoring keeps `(timestamp)$`-style patterns from matching in the middle
/// of a longer header name.
pub(crate) fn compile_anchored(pattern: &str) -> Regex {
    RegexBuilder::new(&format!("^(?:{})", pattern))
        .case_insensitive(true)
        .build()
        .unwrap_or_else(|e| panic!("invalid mapping pattern '{}': {}", pattern, e))
}

/// Configuration for detecting column pairs like `qty1`/`price1`.
///
/// Both patterns must carry one capture group yielding the tier number.
#[derive(Debug, Clone)]
pub struct ColumnPairConfig {
    pub qty_pattern: Regex,
    pub price_pattern: Regex,
    /// Store field that receives the materialized tier array.
    pub output_field: String,
}

impl ColumnPairConfig {
    pub fn new(qty_pattern: &str, price_pattern: &str, output_field: &str) -> Self {
        Self {
            qty_pattern: compile_anchored(qty_pattern),
            price_pattern: compile_anchored(price_pattern),
            output_field: output_field.to_string(),
        }
    }
}

/// Configuration for dependent-entity auto-creation (e.g. resource groups).
#[derive(Debug, Clone)]
pub struct GroupConfig {
    /// Schema field holding the group name in the CSV.
    pub field: String,
    /// Store table the groups live in.
    pub table: String,
    /// Record field that receives the resolved group id.
    pub target_field: String,
}

/// Configuration for composite uniqueness scoped to a customer.
///
/// Parts are unique per `(part_number, customer_id)`; the customer half of
/// the key is resolved per [`crate::import::CustomerMatchMode`].
#[derive(Debug, Clone)]
pub struct CustomerLinkConfig {
    /// Schema field holding the customer code column (ByColumn mode).
    pub code_field: String,
    /// Store table customers live in.
    pub customer_table: String,
    /// Column in the customer table holding the code.
    pub code_column: String,
    /// Record field that receives the resolved customer id.
    pub target_field: String,
}

/// Context handed to a module's pre-insert transform.
pub struct TransformContext<'a> {
    /// Original CSV row (column name -> raw value).
    pub row: &'a HashMap<String, String>,
    /// Detected (qty_column, price_column) pairs, sorted by tier.
    pub pricing_pairs: &'a [(String, String)],
    /// Lowercased group name -> group id, merged from existing and
    /// freshly created groups.
    pub group_ids: &'a HashMap<String, String>,
}

/// Final record hook, applied after field mapping and defaults.
pub type PreInsertTransform = fn(&mut Map<String, Value>, &TransformContext);

/// Immutable per-module import configuration.
///
/// Constructed once per entity type at startup; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ImportModuleConfig {
    /// Module identity (e.g. "customers").
    pub module_name: String,
    /// Store table inserts go to.
    pub table_name: String,
    /// Target fields in declared order. Order matters: schema mapping
    /// patterns are evaluated field by field, first match wins.
    pub schema: Vec<FieldDefinition>,
    /// Fields with simple per-tenant uniqueness.
    pub unique_fields: Vec<String>,
    /// Field tuples with compound uniqueness (e.g. part_number + customer_id).
    pub composite_unique: Vec<Vec<String>>,
    /// Optional qty/price pair detection.
    pub column_pair_config: Option<ColumnPairConfig>,
    /// Optional dependent-group auto-creation.
    pub group_config: Option<GroupConfig>,
    /// Optional customer scoping for composite uniqueness.
    pub customer_link: Option<CustomerLinkConfig>,
    /// Terms that force AI review when found in a header.
    pub domain_hints: Vec<String>,
    /// Defaults applied to fields still absent after mapping.
    pub default_values: Vec<(String, Value)>,
    /// Final record hook.
    pub pre_insert_transform: Option<PreInsertTransform>,
    /// Tenant scope column (company id).
    pub tenant_field: String,
}

impl ImportModuleConfig {
    pub fn new(module_name: &str, table_name: &str, schema: Vec<FieldDefinition>) -> Self {
        Self {
            module_name: module_name.to_string(),
            table_name: table_name.to_string(),
            schema,
            unique_fields: Vec::new(),
            composite_unique: Vec::new(),
            column_pair_config: None,
            group_config: None,
            customer_link: None,
            domain_hints: Vec::new(),
            default_values: Vec::new(),
            pre_insert_transform: None,
            tenant_field: "company_id".to_string(),
        }
    }

    /// Look up a field definition by name.
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.schema.iter().find(|f| f.name == name)
    }

    /// Names of required fields, in schema order.
    pub fn required_fields(&self) -> Vec<&str> {
        self.schema
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect()
    }

    /// Schema description in the shape all AI providers accept:
    /// field name -> `{type, required, description}`.
    pub fn schema_description(&self) -> Value {
        let mut out = Map::new();
        for field in &self.schema {
            out.insert(
                field.name.clone(),
                json!({
                    "type": field.field_type,
                    "required": field.required,
                    "description": field.description,
                }),
            );
        }
        Value::Object(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> ImportModuleConfig {
        let schema = vec![
            FieldDefinition::new("code", FieldType::String)
                .required()
                .describe("Unique code")
                .patterns(&[r"^(code|id)$"]),
            FieldDefinition::new("rate", FieldType::Number).patterns(&[r"^(rate|hourly_rate)$"]),
        ];
        ImportModuleConfig::new("widgets", "widgets", schema)
    }

    #[test]
    fn test_required_fields_in_schema_order() {
        let config = sample_config();
        assert_eq!(config.required_fields(), vec!["code"]);
    }

    #[test]
    fn test_schema_description_shape() {
        let config = sample_config();
        let desc = config.schema_description();
        assert_eq!(desc["code"]["type"], "string");
        assert_eq!(desc["code"]["required"], true);
        assert_eq!(desc["rate"]["type"], "number");
        assert_eq!(desc["rate"]["required"], false);
    }

    #[test]
    fn test_anchored_pattern_does_not_match_mid_string() {
        let re = compile_anchored(r"(timestamp|datetime)$");
        assert!(re.is_match("timestamp"));
        assert!(!re.is_match("created_timestamp"));
    }

    #[test]
    fn test_patterns_are_case_insensitive() {
        let config = sample_config();
        let code = config.field("code").unwrap();
        assert!(code.mapping_patterns[0].is_match("CODE"));
    }
}
