//! Execute: re-validate, gate on conflicts, build records, bulk insert.

use serde_json::{json, Map, Number, Value};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use crate::config::{FieldType, TransformContext};
use crate::error::{ImportError, ImportResult};
use crate::import::validate::{parse_number, CustomerResolution};
use crate::import::{
    mapped_value, reverse_mappings, ExecuteOutcome, ImportOptions, ImportService, Row,
};

impl ImportService {
    /// Import mapped rows.
    ///
    /// Always re-validates: with `skip_conflicts` the conflicted and errored
    /// rows are dropped from the batch, without it any conflict aborts the
    /// whole call. Insertion is a single store call, so a constraint
    /// violation that validation could not see leaves nothing behind.
    pub async fn execute(
        &self,
        tenant_id: &str,
        mappings: &HashMap<String, String>,
        rows: &[Row],
        skip_conflicts: bool,
        options: &ImportOptions,
    ) -> ImportResult<ExecuteOutcome> {
        let cfg = self.config();
        let validation = self.validate(tenant_id, mappings, rows, options).await?;

        if validation.has_conflicts && !skip_conflicts {
            return Err(ImportError::ConflictsPresent);
        }

        let mut skip_rows: HashSet<usize> = HashSet::new();
        for c in &validation.conflicts {
            skip_rows.insert(c.row_number);
        }
        for e in &validation.validation_errors {
            skip_rows.insert(e.row_number);
        }

        // Dependent groups first, best effort per group
        let mut groups_created = 0usize;
        let mut group_ids: HashMap<String, String> = HashMap::new();
        if let Some(group) = &cfg.group_config {
            if options.create_groups {
                for name in validation.groups_to_create.as_deref().unwrap_or(&[]) {
                    let mut record = Map::new();
                    record.insert(cfg.tenant_field.clone(), json!(tenant_id));
                    record.insert("name".to_string(), json!(name));
                    record.insert("display_order".to_string(), json!(0));
                    match self.store().insert(&group.table, vec![record]).await {
                        Ok(created) => {
                            groups_created += 1;
                            if let Some(id) = created
                                .first()
                                .and_then(|v| v.get("id"))
                                .and_then(Value::as_str)
                            {
                                group_ids.insert(name.to_lowercase(), id.to_string());
                            }
                        }
                        Err(e) => {
                            warn!(group = %name, error = %e, "group creation failed, rows fall back to no group");
                        }
                    }
                }
            }
            // Full name -> id map for linking, created groups included
            let records = self
                .store()
                .select(&group.table, &["id", "name"], &cfg.tenant_field, tenant_id)
                .await?;
            for r in &records {
                if let (Some(id), Some(name)) = (
                    r.get("id").and_then(Value::as_str),
                    r.get("name").and_then(Value::as_str),
                ) {
                    group_ids.insert(name.trim().to_lowercase(), id.to_string());
                }
            }
        }

        let reverse = reverse_mappings(mappings);
        let customer_ctx = self.customer_context(tenant_id, &reverse, options).await?;
        let pricing_pairs: Vec<(String, String)> = options
            .pricing_pairs
            .iter()
            .map(|p| (p.qty_column.clone(), p.price_column.clone()))
            .collect();

        let mut records: Vec<Map<String, Value>> = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            if skip_rows.contains(&(i + 1)) {
                continue;
            }

            let mut record = Map::new();
            record.insert(cfg.tenant_field.clone(), json!(tenant_id));

            for field in &cfg.schema {
                let value = mapped_value(row, &reverse, &field.name)
                    .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("undefined"));
                let Some(value) = value else { continue };

                if let Some(transform) = field.transform {
                    record.insert(field.name.clone(), transform(value));
                    continue;
                }
                match field.field_type {
                    FieldType::String => {
                        record.insert(field.name.clone(), json!(value));
                    }
                    // Unparseable numbers were caught by validation for
                    // mapped fields; anything left just drops the value
                    FieldType::Number => {
                        if let Some(n) = parse_number(value).and_then(round2) {
                            record.insert(field.name.clone(), Value::Number(n));
                        }
                    }
                    FieldType::Boolean => {
                        record.insert(field.name.clone(), json!(parse_bool(value)));
                    }
                    FieldType::Json => {
                        if let Ok(v) = serde_json::from_str::<Value>(value) {
                            record.insert(field.name.clone(), v);
                        }
                    }
                }
            }

            for (field, default) in &cfg.default_values {
                if !record.contains_key(field) {
                    record.insert(field.clone(), default.clone());
                }
            }

            // The group name column never lands in the table, only its id
            if let Some(group) = &cfg.group_config {
                record.remove(&group.field);
                if let Some(name) =
                    mapped_value(row, &reverse, &group.field).filter(|v| !v.is_empty())
                {
                    if let Some(id) = group_ids.get(&name.to_lowercase()) {
                        record.insert(group.target_field.clone(), json!(id));
                    }
                }
            }

            if let (Some(link), Some(ctx)) = (&cfg.customer_link, &customer_ctx) {
                if let CustomerResolution::Id(id) = ctx.resolve(row) {
                    record.insert(link.target_field.clone(), json!(id));
                }
            }

            if let Some(transform) = cfg.pre_insert_transform {
                let ctx = TransformContext {
                    row,
                    pricing_pairs: &pricing_pairs,
                    group_ids: &group_ids,
                };
                transform(&mut record, &ctx);
            }

            records.push(record);
        }

        let imported_count = if records.is_empty() {
            0
        } else {
            self.store().insert(&cfg.table_name, records).await?.len()
        };

        info!(
            module = %cfg.module_name,
            imported = imported_count,
            skipped = skip_rows.len(),
            "import executed"
        );

        Ok(ExecuteOutcome {
            success: true,
            imported_count,
            skipped_count: skip_rows.len(),
            groups_created: (cfg.group_config.is_some() && options.create_groups)
                .then_some(groups_created),
            errors: Vec::new(),
        })
    }
}

/// Round to two decimal places, dropping non-finite results.
fn round2(n: f64) -> Option<Number> {
    Number::from_f64((n * 100.0).round() / 100.0)
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "true" | "yes" | "y" | "1" | "active"
    )
}
