//! Validation engine: required fields, duplicate detection, numeric
//! checks, and dependent-group collection.
//!
//! Per row, the first failed check wins and the rest are skipped, so a
//! row lands in exactly one of: valid, conflicted, or errored.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::config::FieldType;
use crate::error::{ImportError, ImportResult};
use crate::import::{
    mapped_value, reverse_mappings, title_case, Conflict, CustomerMatchMode, ImportOptions,
    ImportService, Row, RowError, ValidateOutcome,
};

/// Customer binding of one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CustomerResolution {
    /// Generic record, no customer.
    None,
    Id(String),
    /// The row named a customer code the store does not have.
    NotFound(String),
}

/// Per-request customer lookup state for composite-unique modules.
pub(crate) struct CustomerContext {
    mode: CustomerMatchMode,
    selected_id: Option<String>,
    /// Lowercased customer code -> id.
    code_to_id: HashMap<String, String>,
    /// CSV column carrying the customer code, when mapped.
    code_column: Option<String>,
}

impl CustomerContext {
    pub(crate) fn resolve(&self, row: &Row) -> CustomerResolution {
        match self.mode {
            CustomerMatchMode::AllToOne => match &self.selected_id {
                Some(id) => CustomerResolution::Id(id.clone()),
                None => CustomerResolution::None,
            },
            CustomerMatchMode::ByColumn => {
                let code = self
                    .code_column
                    .as_ref()
                    .and_then(|col| row.get(col))
                    .map(|v| v.trim())
                    .unwrap_or("");
                if code.is_empty() {
                    return CustomerResolution::None;
                }
                match self.code_to_id.get(&code.to_lowercase()) {
                    Some(id) => CustomerResolution::Id(id.clone()),
                    None => CustomerResolution::NotFound(code.to_string()),
                }
            }
            CustomerMatchMode::AllGeneric => CustomerResolution::None,
        }
    }

    fn scope_of(resolution: &CustomerResolution) -> Option<String> {
        match resolution {
            CustomerResolution::Id(id) => Some(id.clone()),
            _ => None,
        }
    }
}

impl ImportService {
    /// Build the customer lookup state, verifying the options up front.
    pub(crate) async fn customer_context(
        &self,
        tenant_id: &str,
        reverse: &HashMap<String, String>,
        options: &ImportOptions,
    ) -> ImportResult<Option<CustomerContext>> {
        let link = match &self.config().customer_link {
            Some(link) => link,
            None => return Ok(None),
        };
        let cfg = self.config();

        let selected_id = match options.customer_match_mode {
            CustomerMatchMode::AllToOne => {
                let id = options.selected_customer_id.clone().ok_or_else(|| {
                    ImportError::InvalidOptions(
                        "selected_customer_id is required for all_to_one".to_string(),
                    )
                })?;
                let customers = self
                    .store()
                    .select(&link.customer_table, &["id"], &cfg.tenant_field, tenant_id)
                    .await?;
                let known = customers
                    .iter()
                    .any(|c| c.get("id").and_then(|v| v.as_str()) == Some(id.as_str()));
                if !known {
                    return Err(ImportError::InvalidOptions(
                        "Selected customer not found".to_string(),
                    ));
                }
                Some(id)
            }
            _ => None,
        };

        let mut code_to_id = HashMap::new();
        if options.customer_match_mode == CustomerMatchMode::ByColumn {
            let customers = self
                .store()
                .select(
                    &link.customer_table,
                    &["id", &link.code_column],
                    &cfg.tenant_field,
                    tenant_id,
                )
                .await?;
            for c in &customers {
                if let (Some(id), Some(code)) = (
                    c.get("id").and_then(|v| v.as_str()),
                    c.get(link.code_column.as_str()).and_then(|v| v.as_str()),
                ) {
                    code_to_id.insert(code.trim().to_lowercase(), id.to_string());
                }
            }
        }

        Ok(Some(CustomerContext {
            mode: options.customer_match_mode,
            selected_id,
            code_to_id,
            code_column: reverse.get(&link.code_field).cloned(),
        }))
    }

    /// Validate mapped rows against the schema and the store.
    pub async fn validate(
        &self,
        tenant_id: &str,
        mappings: &HashMap<String, String>,
        rows: &[Row],
        options: &ImportOptions,
    ) -> ImportResult<ValidateOutcome> {
        let cfg = self.config();
        let reverse = reverse_mappings(mappings);
        let required = cfg.required_fields();

        let customer_ctx = self.customer_context(tenant_id, &reverse, options).await?;
        let resolutions: Vec<CustomerResolution> = match &customer_ctx {
            Some(ctx) => rows.iter().map(|row| ctx.resolve(row)).collect(),
            None => Vec::new(),
        };

        // Existing store records keyed by their unique values
        let mut existing_simple: HashMap<&str, HashMap<String, String>> = HashMap::new();
        if !cfg.unique_fields.is_empty() {
            let mut fields: Vec<&str> = vec!["id"];
            fields.extend(cfg.unique_fields.iter().map(String::as_str));
            let records = self
                .store()
                .select(&cfg.table_name, &fields, &cfg.tenant_field, tenant_id)
                .await?;
            for field in &cfg.unique_fields {
                let by_value = existing_simple.entry(field.as_str()).or_default();
                for r in &records {
                    if let (Some(value), Some(id)) = (
                        r.get(field.as_str()).and_then(|v| v.as_str()),
                        r.get("id").and_then(|v| v.as_str()),
                    ) {
                        by_value.insert(value.trim().to_lowercase(), id.to_string());
                    }
                }
            }
        }

        let composite = cfg
            .composite_unique
            .first()
            .and_then(|pair| match pair.as_slice() {
                [value_field, scope_field] => Some((value_field.as_str(), scope_field.as_str())),
                _ => None,
            });
        let mut existing_composite: HashMap<(String, Option<String>), String> = HashMap::new();
        if let Some((value_field, scope_field)) = composite {
            let records = self
                .store()
                .select(
                    &cfg.table_name,
                    &["id", value_field, scope_field],
                    &cfg.tenant_field,
                    tenant_id,
                )
                .await?;
            for r in &records {
                if let (Some(value), Some(id)) = (
                    r.get(value_field).and_then(|v| v.as_str()),
                    r.get("id").and_then(|v| v.as_str()),
                ) {
                    let scope = r
                        .get(scope_field)
                        .and_then(|v| v.as_str())
                        .map(str::to_string);
                    existing_composite.insert((value.trim().to_lowercase(), scope), id.to_string());
                }
            }
        }

        // Existing group names, for the auto-create preview
        let collect_groups = cfg.group_config.is_some() && options.create_groups;
        let mut existing_groups: HashSet<String> = HashSet::new();
        if let Some(group) = cfg.group_config.as_ref().filter(|_| collect_groups) {
            let records = self
                .store()
                .select(&group.table, &["id", "name"], &cfg.tenant_field, tenant_id)
                .await?;
            for r in &records {
                if let Some(name) = r.get("name").and_then(|v| v.as_str()) {
                    existing_groups.insert(name.trim().to_lowercase());
                }
            }
        }

        // Pass 1: occurrence counts of unique values within the file
        let mut simple_occurrences: HashMap<&str, HashMap<String, Vec<usize>>> = HashMap::new();
        for field in &cfg.unique_fields {
            let by_value = simple_occurrences.entry(field.as_str()).or_default();
            for (i, row) in rows.iter().enumerate() {
                if let Some(value) = mapped_value(row, &reverse, field).filter(|v| !v.is_empty()) {
                    by_value.entry(value.to_lowercase()).or_default().push(i + 1);
                }
            }
        }
        let mut composite_occurrences: HashMap<(String, Option<String>), Vec<usize>> =
            HashMap::new();
        if let Some((value_field, _)) = composite {
            for (i, row) in rows.iter().enumerate() {
                if let Some(value) =
                    mapped_value(row, &reverse, value_field).filter(|v| !v.is_empty())
                {
                    let scope = resolutions
                        .get(i)
                        .map(CustomerContext::scope_of)
                        .unwrap_or(None);
                    composite_occurrences
                        .entry((value.to_lowercase(), scope))
                        .or_default()
                        .push(i + 1);
                }
            }
        }

        // Pass 2: per-row checks, first match wins
        let mut conflicts = Vec::new();
        let mut validation_errors = Vec::new();
        let mut conflict_rows: HashSet<usize> = HashSet::new();
        let mut error_rows: HashSet<usize> = HashSet::new();
        let mut groups_to_create: Vec<String> = Vec::new();
        let mut queued_groups: HashSet<String> = HashSet::new();

        'rows: for (i, row) in rows.iter().enumerate() {
            let row_number = i + 1;

            // Required fields; a row missing any skips every later check
            let mut missing = false;
            for field in &required {
                let blank = mapped_value(row, &reverse, field)
                    .map(str::is_empty)
                    .unwrap_or(true);
                if blank {
                    validation_errors.push(RowError {
                        row_number,
                        error_type: format!("missing_{}", field),
                        field: (*field).to_string(),
                        message: format!("{} is required", title_case(field)),
                    });
                    missing = true;
                }
            }
            if missing {
                error_rows.insert(row_number);
                continue;
            }

            // Unresolvable customer code
            if let Some(CustomerResolution::NotFound(code)) = resolutions.get(i) {
                if let Some(link) = &cfg.customer_link {
                    conflicts.push(Conflict {
                        row_number,
                        conflict_type: "customer_not_found".to_string(),
                        field: link.code_field.clone(),
                        value: code.clone(),
                        existing_id: String::new(),
                        message: format!("Customer code '{}' not found", code),
                    });
                    conflict_rows.insert(row_number);
                    continue;
                }
            }

            // Duplicates within the file
            for field in &cfg.unique_fields {
                if let Some(value) = mapped_value(row, &reverse, field).filter(|v| !v.is_empty()) {
                    let dup_rows = simple_occurrences
                        .get(field.as_str())
                        .and_then(|m| m.get(&value.to_lowercase()));
                    if let Some(dup_rows) = dup_rows.filter(|r| r.len() > 1) {
                        conflicts.push(Conflict {
                            row_number,
                            conflict_type: "csv_duplicate".to_string(),
                            field: field.clone(),
                            value: value.to_string(),
                            existing_id: String::new(),
                            message: format!(
                                "Duplicate {} in CSV at rows {}",
                                field,
                                join_rows(dup_rows)
                            ),
                        });
                        conflict_rows.insert(row_number);
                        continue 'rows;
                    }
                }
            }
            if let Some((value_field, _)) = composite {
                if let Some(value) =
                    mapped_value(row, &reverse, value_field).filter(|v| !v.is_empty())
                {
                    let scope = resolutions
                        .get(i)
                        .map(CustomerContext::scope_of)
                        .unwrap_or(None);
                    let key = (value.to_lowercase(), scope);
                    if let Some(dup_rows) = composite_occurrences.get(&key).filter(|r| r.len() > 1)
                    {
                        conflicts.push(Conflict {
                            row_number,
                            conflict_type: "csv_duplicate".to_string(),
                            field: value_field.to_string(),
                            value: value.to_string(),
                            existing_id: String::new(),
                            message: format!(
                                "Duplicate {} in CSV at rows {}",
                                value_field,
                                join_rows(dup_rows)
                            ),
                        });
                        conflict_rows.insert(row_number);
                        continue;
                    }
                }
            }

            // Collisions with the store
            for field in &cfg.unique_fields {
                if let Some(value) = mapped_value(row, &reverse, field).filter(|v| !v.is_empty()) {
                    let existing = existing_simple
                        .get(field.as_str())
                        .and_then(|m| m.get(&value.to_lowercase()));
                    if let Some(existing_id) = existing {
                        conflicts.push(Conflict {
                            row_number,
                            conflict_type: format!("duplicate_{}", field),
                            field: field.clone(),
                            value: value.to_string(),
                            existing_id: existing_id.clone(),
                            message: format!(
                                "{} '{}' already exists",
                                title_case(field),
                                value
                            ),
                        });
                        conflict_rows.insert(row_number);
                        continue 'rows;
                    }
                }
            }
            if let Some((value_field, _)) = composite {
                if let Some(value) =
                    mapped_value(row, &reverse, value_field).filter(|v| !v.is_empty())
                {
                    let scope = resolutions
                        .get(i)
                        .map(CustomerContext::scope_of)
                        .unwrap_or(None);
                    let scoped = scope.is_some();
                    let key = (value.to_lowercase(), scope);
                    if let Some(existing_id) = existing_composite.get(&key) {
                        let message = if scoped {
                            format!(
                                "{} '{}' already exists for this customer",
                                title_case(value_field),
                                value
                            )
                        } else {
                            format!("{} '{}' already exists", title_case(value_field), value)
                        };
                        conflicts.push(Conflict {
                            row_number,
                            conflict_type: format!("duplicate_{}", value_field),
                            field: value_field.to_string(),
                            value: value.to_string(),
                            existing_id: existing_id.clone(),
                            message,
                        });
                        conflict_rows.insert(row_number);
                        continue;
                    }
                }
            }

            // Numeric sanity
            for field in &cfg.schema {
                if field.field_type != FieldType::Number {
                    continue;
                }
                if let Some(value) =
                    mapped_value(row, &reverse, &field.name).filter(|v| !v.is_empty())
                {
                    match parse_number(value) {
                        Some(n) if n < 0.0 => {
                            validation_errors.push(RowError {
                                row_number,
                                error_type: format!("invalid_{}", field.name),
                                field: field.name.clone(),
                                message: format!(
                                    "{} cannot be negative",
                                    title_case(&field.name)
                                ),
                            });
                            error_rows.insert(row_number);
                            continue 'rows;
                        }
                        Some(_) => {}
                        None => {
                            validation_errors.push(RowError {
                                row_number,
                                error_type: format!("invalid_{}", field.name),
                                field: field.name.clone(),
                                message: format!(
                                    "Invalid {}: '{}'",
                                    title_case(&field.name),
                                    value
                                ),
                            });
                            error_rows.insert(row_number);
                            continue 'rows;
                        }
                    }
                }
            }

            // Missing dependent groups on otherwise-clean rows
            if collect_groups {
                if let Some(group) = &cfg.group_config {
                    if let Some(name) =
                        mapped_value(row, &reverse, &group.field).filter(|v| !v.is_empty())
                    {
                        let lower = name.to_lowercase();
                        if !existing_groups.contains(&lower) && queued_groups.insert(lower) {
                            groups_to_create.push(name.to_string());
                        }
                    }
                }
            }
        }

        groups_to_create.sort();
        let skipped: HashSet<usize> = conflict_rows.union(&error_rows).copied().collect();
        debug!(
            module = %cfg.module_name,
            rows = rows.len(),
            conflicts = conflicts.len(),
            errors = validation_errors.len(),
            "validation complete"
        );

        Ok(ValidateOutcome {
            has_conflicts: !conflicts.is_empty(),
            conflicts,
            validation_errors,
            valid_rows_count: rows.len() - skipped.len(),
            conflict_rows_count: conflict_rows.len(),
            error_rows_count: error_rows.len(),
            skipped_rows_count: skipped.len(),
            groups_to_create: collect_groups.then_some(groups_to_create),
        })
    }
}

/// Accepts plain decimals plus common currency noise ("$1,200.50").
pub(crate) fn parse_number(value: &str) -> Option<f64> {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn join_rows(rows: &[usize]) -> String {
    rows.iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CustomerLinkConfig, FieldDefinition, GroupConfig, ImportModuleConfig};
    use crate::import::ColumnPair;
    use crate::store::MemoryStore;
    use serde_json::{json, Map, Value};
    use std::sync::Arc;

    #[test]
    fn test_parse_number_currency_noise() {
        assert_eq!(parse_number("$1,200.50"), Some(1200.50));
        assert_eq!(parse_number("42"), Some(42.0));
        assert_eq!(parse_number("TBD"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn test_join_rows() {
        assert_eq!(join_rows(&[3, 7]), "3, 7");
    }

    fn customer_config() -> ImportModuleConfig {
        let schema = vec![
            FieldDefinition::new("customer_code", crate::config::FieldType::String).required(),
            FieldDefinition::new("name", crate::config::FieldType::String).required(),
            FieldDefinition::new("credit_limit", crate::config::FieldType::Number),
        ];
        let mut config = ImportModuleConfig::new("customers", "customers", schema);
        config.unique_fields = vec!["customer_code".to_string()];
        config
    }

    fn part_config() -> ImportModuleConfig {
        let schema = vec![
            FieldDefinition::new("part_number", crate::config::FieldType::String).required(),
            FieldDefinition::new("customer_code", crate::config::FieldType::String),
        ];
        let mut config = ImportModuleConfig::new("parts", "parts", schema);
        config.composite_unique =
            vec![vec!["part_number".to_string(), "customer_id".to_string()]];
        config.customer_link = Some(CustomerLinkConfig {
            code_field: "customer_code".to_string(),
            customer_table: "customers".to_string(),
            code_column: "customer_code".to_string(),
            target_field: "customer_id".to_string(),
        });
        config
    }

    fn resource_config() -> ImportModuleConfig {
        let schema = vec![
            FieldDefinition::new("name", crate::config::FieldType::String).required(),
            FieldDefinition::new("resource_group", crate::config::FieldType::String),
        ];
        let mut config = ImportModuleConfig::new("resources", "resources", schema);
        config.unique_fields = vec!["name".to_string()];
        config.group_config = Some(GroupConfig {
            field: "resource_group".to_string(),
            table: "resource_groups".to_string(),
            target_field: "resource_group_id".to_string(),
        });
        config
    }

    fn service(config: ImportModuleConfig, store: Arc<MemoryStore>) -> ImportService {
        ImportService::new(Arc::new(config), store)
            .with_cache(crate::cache::AnalysisCache::disabled())
    }

    fn record(pairs: &[(&str, &str)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    fn mappings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(csv, db)| (csv.to_string(), db.to_string()))
            .collect()
    }

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_csv_duplicates_conflict_both_rows() {
        // Scenario: two rows sharing a unique code both report the other
        let store = Arc::new(MemoryStore::new());
        let svc = service(customer_config(), store);
        let m = mappings(&[("Code", "customer_code"), ("Name", "name")]);
        let rows = vec![
            row(&[("Code", "A1"), ("Name", "X")]),
            row(&[("Code", "A1"), ("Name", "Y")]),
        ];

        let out = svc
            .validate("t1", &m, &rows, &ImportOptions::default())
            .await
            .unwrap();
        assert!(out.has_conflicts);
        assert_eq!(out.conflicts.len(), 2);
        for c in &out.conflicts {
            assert_eq!(c.conflict_type, "csv_duplicate");
            assert_eq!(c.field, "customer_code");
            assert!(c.message.contains("1, 2"));
            assert!(c.existing_id.is_empty());
        }
        assert_eq!(out.valid_rows_count, 0);
        assert_eq!(out.conflict_rows_count, 2);
    }

    #[tokio::test]
    async fn test_missing_required_short_circuits_conflict_checks() {
        // Scenario: a row missing its name also collides with the store on
        // code; only the validation error is reported
        let store = Arc::new(MemoryStore::new());
        store.seed(
            "customers",
            vec![record(&[("company_id", "t1"), ("customer_code", "A1")])],
        );
        let svc = service(customer_config(), store);
        let m = mappings(&[("Code", "customer_code"), ("Name", "name")]);
        let rows = vec![row(&[("Code", "A1"), ("Name", "")])];

        let out = svc
            .validate("t1", &m, &rows, &ImportOptions::default())
            .await
            .unwrap();
        assert!(!out.has_conflicts);
        assert_eq!(out.validation_errors.len(), 1);
        assert_eq!(out.validation_errors[0].error_type, "missing_name");
        assert_eq!(out.error_rows_count, 1);
        assert_eq!(out.conflict_rows_count, 0);
    }

    #[tokio::test]
    async fn test_store_duplicate_carries_existing_id() {
        let store = Arc::new(MemoryStore::new());
        store.seed(
            "customers",
            vec![record(&[
                ("id", "existing-1"),
                ("company_id", "t1"),
                ("customer_code", "A1"),
            ])],
        );
        let svc = service(customer_config(), store);
        let m = mappings(&[("Code", "customer_code"), ("Name", "name")]);
        // Case-insensitive match against the stored value
        let rows = vec![row(&[("Code", "a1"), ("Name", "X")])];

        let out = svc
            .validate("t1", &m, &rows, &ImportOptions::default())
            .await
            .unwrap();
        assert_eq!(out.conflicts.len(), 1);
        assert_eq!(out.conflicts[0].conflict_type, "duplicate_customer_code");
        assert_eq!(out.conflicts[0].existing_id, "existing-1");
    }

    #[tokio::test]
    async fn test_row_accounting_invariant() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(customer_config(), store);
        let m = mappings(&[
            ("Code", "customer_code"),
            ("Name", "name"),
            ("Limit", "credit_limit"),
        ]);
        let rows = vec![
            row(&[("Code", "A1"), ("Name", "X"), ("Limit", "1000")]),
            row(&[("Code", "A2"), ("Name", ""), ("Limit", "")]),
            row(&[("Code", "A3"), ("Name", "Z"), ("Limit", "lots")]),
            row(&[("Code", "A4"), ("Name", "W"), ("Limit", "-5")]),
            row(&[("Code", "A5"), ("Name", "V"), ("Limit", "")]),
            row(&[("Code", "A5"), ("Name", "U"), ("Limit", "")]),
        ];

        let out = svc
            .validate("t1", &m, &rows, &ImportOptions::default())
            .await
            .unwrap();
        assert_eq!(out.error_rows_count, 3);
        assert_eq!(out.conflict_rows_count, 2);
        assert_eq!(out.skipped_rows_count, 5);
        assert_eq!(out.valid_rows_count, 1);
        assert_eq!(
            out.valid_rows_count + out.skipped_rows_count,
            rows.len()
        );
        // Negative and unparseable numbers use the same error vocabulary
        assert!(out
            .validation_errors
            .iter()
            .any(|e| e.error_type == "invalid_credit_limit" && e.message.contains("negative")));
        assert!(out
            .validation_errors
            .iter()
            .any(|e| e.error_type == "invalid_credit_limit" && e.message.contains("lots")));
    }

    #[tokio::test]
    async fn test_unknown_customer_code_is_a_conflict() {
        let store = Arc::new(MemoryStore::new());
        store.seed(
            "customers",
            vec![record(&[
                ("id", "cust-1"),
                ("company_id", "t1"),
                ("customer_code", "ACME"),
            ])],
        );
        let svc = service(part_config(), store);
        let m = mappings(&[("Part", "part_number"), ("Customer", "customer_code")]);
        let rows = vec![
            row(&[("Part", "P-1"), ("Customer", "ACME")]),
            row(&[("Part", "P-2"), ("Customer", "GLOBEX")]),
        ];
        let options = ImportOptions {
            customer_match_mode: CustomerMatchMode::ByColumn,
            ..Default::default()
        };

        let out = svc.validate("t1", &m, &rows, &options).await.unwrap();
        assert_eq!(out.conflicts.len(), 1);
        assert_eq!(out.conflicts[0].conflict_type, "customer_not_found");
        assert_eq!(out.conflicts[0].value, "GLOBEX");
        assert_eq!(out.valid_rows_count, 1);
    }

    #[tokio::test]
    async fn test_composite_uniqueness_is_scoped_to_customer() {
        let store = Arc::new(MemoryStore::new());
        store.seed(
            "customers",
            vec![
                record(&[("id", "cust-1"), ("company_id", "t1"), ("customer_code", "ACME")]),
                record(&[("id", "cust-2"), ("company_id", "t1"), ("customer_code", "GLOBEX")]),
            ],
        );
        store.seed(
            "parts",
            vec![record(&[
                ("id", "part-1"),
                ("company_id", "t1"),
                ("part_number", "P-1"),
                ("customer_id", "cust-1"),
            ])],
        );
        let svc = service(part_config(), store);
        let m = mappings(&[("Part", "part_number"), ("Customer", "customer_code")]);
        let rows = vec![
            // Same part number, different customer: allowed
            row(&[("Part", "P-1"), ("Customer", "GLOBEX")]),
            // Same part number, same customer: store conflict
            row(&[("Part", "P-1"), ("Customer", "ACME")]),
        ];
        let options = ImportOptions {
            customer_match_mode: CustomerMatchMode::ByColumn,
            ..Default::default()
        };

        let out = svc.validate("t1", &m, &rows, &options).await.unwrap();
        assert_eq!(out.conflicts.len(), 1);
        assert_eq!(out.conflicts[0].row_number, 2);
        assert_eq!(out.conflicts[0].conflict_type, "duplicate_part_number");
        assert!(out.conflicts[0].message.contains("for this customer"));
        assert_eq!(out.valid_rows_count, 1);
    }

    #[tokio::test]
    async fn test_groups_to_create_deduped_and_sorted() {
        let store = Arc::new(MemoryStore::new());
        store.seed(
            "resource_groups",
            vec![record(&[("company_id", "t1"), ("name", "CNC")])],
        );
        let svc = service(resource_config(), store);
        let m = mappings(&[("Name", "name"), ("Group", "resource_group")]);
        let rows = vec![
            row(&[("Name", "Mill"), ("Group", "Milling")]),
            row(&[("Name", "Lathe"), ("Group", "cnc")]),
            row(&[("Name", "Saw"), ("Group", "Cutting")]),
            row(&[("Name", "Saw 2"), ("Group", "Cutting")]),
        ];
        let options = ImportOptions {
            create_groups: true,
            ..Default::default()
        };

        let out = svc.validate("t1", &m, &rows, &options).await.unwrap();
        assert_eq!(
            out.groups_to_create,
            Some(vec!["Cutting".to_string(), "Milling".to_string()])
        );

        // Without opt-in the preview is absent
        let out = svc
            .validate("t1", &m, &rows, &ImportOptions::default())
            .await
            .unwrap();
        assert_eq!(out.groups_to_create, None);
    }

    #[tokio::test]
    async fn test_pricing_pair_options_do_not_affect_validation() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(part_config(), store);
        let m = mappings(&[("Part", "part_number")]);
        let rows = vec![row(&[("Part", "P-1"), ("qty1", "banana")])];
        let options = ImportOptions {
            pricing_pairs: vec![ColumnPair {
                qty_column: "qty1".to_string(),
                price_column: "price1".to_string(),
            }],
            ..Default::default()
        };

        let out = svc.validate("t1", &m, &rows, &options).await.unwrap();
        assert_eq!(out.valid_rows_count, 1);
        assert!(out.validation_errors.is_empty());
    }
}
