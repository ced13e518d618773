//! Parts import module.
//!
//! Parts are unique per `(part_number, customer_id)` and carry a quantity
//! price-break array materialized from detected `qty<N>`/`price<N>` column
//! pairs.

use serde_json::{json, Map, Value};

use crate::config::{
    ColumnPairConfig, CustomerLinkConfig, FieldDefinition, FieldType, ImportModuleConfig,
    TransformContext,
};
use crate::import::parse_number;

/// Materialize the pricing tiers from the raw qty/price columns.
///
/// Pairs with a missing or unparseable half are dropped, quantities must be
/// positive and prices non-negative. Tiers come out sorted by quantity.
fn pricing_tiers(record: &mut Map<String, Value>, ctx: &TransformContext) {
    let mut tiers: Vec<(i64, f64)> = Vec::new();
    for (qty_col, price_col) in ctx.pricing_pairs {
        let qty = ctx
            .row
            .get(qty_col)
            .and_then(|v| parse_number(v.trim()))
            .map(|q| q as i64);
        let price = ctx
            .row
            .get(price_col)
            .and_then(|v| parse_number(v.trim()))
            .map(|p| (p * 100.0).round() / 100.0);
        if let (Some(qty), Some(price)) = (qty, price) {
            if qty > 0 && price >= 0.0 {
                tiers.push((qty, price));
            }
        }
    }
    tiers.sort_by_key(|(qty, _)| *qty);

    let tiers: Vec<Value> = tiers
        .into_iter()
        .map(|(qty, price)| json!({"qty": qty, "price": price}))
        .collect();
    record.insert("pricing".to_string(), Value::Array(tiers));
}

pub fn config() -> ImportModuleConfig {
    let schema = vec![
        FieldDefinition::new("part_number", FieldType::String)
            .required()
            .describe("Unique part identifier (unique per customer or globally for generic parts)")
            .patterns(&[
                r"part[_\s-]?(number|num|no|#|id|code)?$",
                r"(pn|sku|item[_\s-]?(number|num|no|code)?)$",
                r"(product[_\s-]?code|product[_\s-]?id|product[_\s-]?number)$",
                r"(component|assembly)[_\s-]?(number|id|code)$",
                r"(part|item|product)$",
            ]),
        FieldDefinition::new("customer_code", FieldType::String)
            .describe("Customer code to associate this part with (by-column matching)")
            .patterns(&[
                r"(customer[_\s-]?(code|id|number|#)?|cust[_\s-]?(code|id))$",
                r"(client[_\s-]?(code|id)|account[_\s-]?(code|id))$",
            ]),
        FieldDefinition::new("description", FieldType::String)
            .describe("Part description or name")
            .patterns(&[
                r"(description|desc|part[_\s-]?desc(ription)?)$",
                r"(name|title|label|part[_\s-]?name)$",
                r"(product|item|part)[_\s-]?(name|description)$",
            ]),
        FieldDefinition::new("material_cost", FieldType::Number)
            .describe("Material cost per unit (numeric, max 2 decimal places)")
            .patterns(&[
                r"(material[_\s-]?cost|mat[_\s-]?cost|raw[_\s-]?cost)$",
                r"(unit[_\s-]?cost|base[_\s-]?cost|cost[_\s-]?per[_\s-]?unit)$",
                r"(cost|material|raw[_\s-]?material[_\s-]?cost)$",
            ]),
        FieldDefinition::new("notes", FieldType::String)
            .describe("Internal notes about this part")
            .patterns(&[r"(notes?|comments?|remarks?|memo|internal[_\s-]?notes?)$"]),
    ];

    let mut config = ImportModuleConfig::new("parts", "parts", schema);
    // Simple uniqueness does not apply; parts are unique per customer
    config.composite_unique = vec![vec!["part_number".to_string(), "customer_id".to_string()]];
    config.column_pair_config = Some(ColumnPairConfig::new(
        r"(?:qty|quantity|minqty|min_qty_?)(\d+)$",
        r"(?:price|unitprice|unit_price_?)(\d+)$",
        "pricing",
    ));
    config.customer_link = Some(CustomerLinkConfig {
        code_field: "customer_code".to_string(),
        customer_table: "customers".to_string(),
        code_column: "customer_code".to_string(),
        target_field: "customer_id".to_string(),
    });
    config.pre_insert_transform = Some(pricing_tiers);
    config.domain_hints = [
        "part", "product", "item", "component", "assembly", "sku", "material", "cost", "price",
        "qty", "quantity", "customer", "client", "description", "note",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    config
}
