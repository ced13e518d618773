//! Prompt construction for column-mapping suggestions.
//!
//! All providers share one prompt so their answers are comparable: the
//! target schema description, the uncertain column names, and one
//! representative sample value per column.

use serde_json::Value;
use std::collections::HashMap;

/// Build the mapping prompt sent to every provider.
pub fn mapping_prompt(
    headers: &[String],
    column_samples: &HashMap<String, String>,
    schema_description: &Value,
) -> String {
    let schema_json =
        serde_json::to_string_pretty(schema_description).unwrap_or_else(|_| "{}".into());
    let headers_json = serde_json::to_string(headers).unwrap_or_else(|_| "[]".into());

    let mut sample_lines: Vec<String> = headers
        .iter()
        .filter_map(|h| column_samples.get(h).map(|v| format!("  {}: \"{}\"", h, v)))
        .collect();
    if sample_lines.is_empty() {
        sample_lines.push("(no sample data)".to_string());
    }

    format!(
        r#"You are analyzing a CSV file to map columns to a database schema for a manufacturing ERP system.

## Target Database Schema:
{schema_json}

## CSV Headers ({header_count} columns):
{headers_json}

## Sample Values (one example per non-empty column):
{sample_data}

Note: Columns not listed in sample values are empty (no data in sample rows).

## Instructions:
1. Map each CSV column to a database field, or null if it should be skipped
2. Provide a confidence score (0.0-1.0) based on:
   - 1.0: Exact name match or unambiguous (e.g., "email" -> "email")
   - 0.8-0.99: Very likely match (e.g., "Company" -> "name", "Tel" -> "phone")
   - 0.5-0.79: Probable match with some ambiguity
   - 0.1-0.49: Uncertain, needs human review
   - 0.0: No reasonable mapping, should be skipped
3. For columns WITHOUT sample data, use the column name semantically to determine mapping
4. Only use database fields from the schema - do not invent new fields

Return ONLY valid JSON in this exact format (no markdown, no explanation):
{{
  "mappings": [
    {{"csv_column": "Company Name", "db_field": "name", "confidence": 0.95, "reasoning": "Direct match for company name"}},
    {{"csv_column": "Internal ID", "db_field": null, "confidence": 0.0, "reasoning": "Internal system field, not needed"}}
  ]
}}"#,
        schema_json = schema_json,
        header_count = headers.len(),
        headers_json = headers_json,
        sample_data = sample_lines.join("\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prompt_includes_schema_headers_and_samples() {
        let headers = vec!["Cust Ref".to_string(), "mystery".to_string()];
        let samples: HashMap<String, String> =
            [("Cust Ref".to_string(), "C-100".to_string())].into();
        let schema = json!({
            "customer_code": {"type": "string", "required": true, "description": "Code"}
        });

        let prompt = mapping_prompt(&headers, &samples, &schema);
        assert!(prompt.contains("customer_code"));
        assert!(prompt.contains("Cust Ref"));
        assert!(prompt.contains("C-100"));
        assert!(prompt.contains("(2 columns)"));
        // Column without a sample is still listed in the headers
        assert!(prompt.contains("mystery"));
    }

    #[test]
    fn test_prompt_without_samples() {
        let headers = vec!["a".to_string()];
        let prompt = mapping_prompt(&headers, &HashMap::new(), &json!({}));
        assert!(prompt.contains("(no sample data)"));
    }
}
