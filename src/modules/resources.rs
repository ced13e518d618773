//! Resources (machines/work centers) import module.
//!
//! Resources reference a resource group; missing groups can be created on
//! the fly during import. A legacy system id, when present, is preserved in
//! the record's metadata instead of a dedicated column.

use serde_json::{json, Map, Value};

use crate::config::{
    FieldDefinition, FieldType, GroupConfig, ImportModuleConfig, TransformContext,
};

/// Fold the legacy_id column into the metadata object.
fn stash_legacy_id(record: &mut Map<String, Value>, _ctx: &TransformContext) {
    if let Some(Value::String(id)) = record.remove("legacy_id") {
        let metadata = record
            .entry("metadata".to_string())
            .or_insert_with(|| json!({}));
        if let Some(obj) = metadata.as_object_mut() {
            obj.insert("legacy_id".to_string(), json!(id));
        }
    }
}

pub fn config() -> ImportModuleConfig {
    let schema = vec![
        FieldDefinition::new("name", FieldType::String)
            .required()
            .describe("Resource/operation name (e.g., 'HURCO Mill', 'Mazak Lathe')")
            .patterns(&[
                r"(name|resource[_\s-]?name|operation[_\s-]?name)$",
                r"(resource|operation|work[_\s-]?center|machine)$",
                // Some shops use the description column as the name
                r"(description|desc)$",
            ]),
        FieldDefinition::new("code", FieldType::String)
            .describe("Short code/ID for display (e.g., 'HRC-M1', 'LATHE01')")
            .patterns(&[
                r"(code|resource[_\s-]?(code|id)|operation[_\s-]?(code|id))$",
                r"(id|machine[_\s-]?(code|id)|work[_\s-]?center[_\s-]?(code|id))$",
                r"(short[_\s-]?code|abbreviation|abbrev)$",
            ]),
        FieldDefinition::new("labor_rate", FieldType::Number)
            .describe("Hourly labor rate in dollars (e.g., 135.00)")
            .patterns(&[
                r"(labor[_\s-]?rate|rate|hourly[_\s-]?rate)$",
                r"(cost[_\s-]?per[_\s-]?hour|hour[_\s-]?rate|\$/hr)$",
                r"(shop[_\s-]?rate|machine[_\s-]?rate|operation[_\s-]?rate)$",
            ]),
        FieldDefinition::new("resource_group", FieldType::String)
            .describe("Group/category name (e.g., 'CNC', 'LATHE&MILL', 'EDM')")
            .patterns(&[
                r"(resource[_\s-]?group|group|category|type)$",
                r"(department|section|area|work[_\s-]?group)$",
                r"(operation[_\s-]?type|machine[_\s-]?type|work[_\s-]?type)$",
            ]),
        FieldDefinition::new("description", FieldType::String)
            .describe("Additional notes or description")
            .patterns(&[
                r"(notes?|comments?|memo|remarks?)$",
                r"(additional[_\s-]?info|details?)$",
            ]),
        FieldDefinition::new("legacy_id", FieldType::String)
            .describe("ID from legacy/previous system (preserved in metadata)")
            .patterns(&[
                r"(legacy[_\s-]?id|old[_\s-]?id|previous[_\s-]?id)$",
                r"(external[_\s-]?id|source[_\s-]?id|orig[_\s-]?id)$",
            ]),
    ];

    let mut config = ImportModuleConfig::new("resources", "resources", schema);
    config.unique_fields = vec!["name".to_string()];
    config.group_config = Some(GroupConfig {
        field: "resource_group".to_string(),
        table: "resource_groups".to_string(),
        target_field: "resource_group_id".to_string(),
    });
    config.default_values = vec![("metadata".to_string(), json!({}))];
    config.pre_insert_transform = Some(stash_legacy_id);
    config.domain_hints = [
        "resource",
        "operation",
        "machine",
        "work center",
        "labor",
        "rate",
        "hourly",
        "cnc",
        "lathe",
        "mill",
        "edm",
        "grinding",
        "assembly",
        "inspection",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    config
}
