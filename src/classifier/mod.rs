//! Rule-based column classifier for CSV import pre-processing.
//!
//! Classifies every CSV column into one of three buckets before any AI call:
//!
//! - auto-skipped (system/internal columns, empty columns)
//! - auto-mapped (headers matching schema-declared patterns)
//! - uncertain (ambiguous names or domain-relevant terms, AI territory)
//!
//! The hybrid approach keeps wide CSVs (150+ columns) cheap: rules resolve
//! the obvious columns deterministically and only the uncertain remainder is
//! sent to the AI provider. Same inputs always produce the same partition,
//! independent of provider availability.

pub mod pairs;

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::config::{compile_anchored, ImportModuleConfig};

pub use pairs::detect_column_pairs;

/// Hard cap on columns considered for AI analysis. Columns beyond the cap
/// are discarded so a single analyze call stays bounded regardless of how
/// wide the source file is.
pub const MAX_COLUMNS_FOR_AI: usize = 30;

/// Sample rows consulted per column.
const SAMPLE_LIMIT: usize = 5;

/// Universal skip patterns (apply to all modules): system columns that
/// never carry importable data. Matched against the normalized header,
/// anchored at the start.
static UNIVERSAL_SKIP_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(id|uuid|guid)$",
        r"(created|updated|modified|deleted)_(at|on|date|time)$",
        r"(row_?id|record_?id|internal_?id|system_?id)$",
        r"(import|export|sync)_(id|date|time|status)$",
        r"_",
        r"(legacy|old|deprecated|archive)_",
        r"(timestamp|datetime)$",
        r"(last_?modified|date_?added|date_?created)$",
        r"(is_?active|is_?deleted|is_?archived|active|deleted|archived)$",
        r"(version|revision|seq|sequence)(_?num(ber)?)?$",
        r"(hash|checksum|md5|sha\d*)$",
        r"(sort_?order|display_?order|order_?num)$",
    ]
    .iter()
    .map(|p| compile_anchored(p))
    .collect()
});

/// Patterns for generic or cryptic column names that need sample-data
/// judgment. Unanchored: "customer_custom_field" should trip on "custom".
static UNCERTAIN_INDICATORS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(custom|misc|other|extra|additional)",
        r"(?i)^(field|column|col|data|value)\d*$",
        r"(?i)^[a-z]{1,3}\d+$",
        r"(?i)^(attr|attribute|prop|property)\d*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("invalid uncertain indicator pattern"))
    .collect()
});

static NORMALIZE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s_-]+").expect("invalid regex"));

/// Result of rule-based classification for one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnClassification {
    /// Original CSV header.
    pub csv_column: String,
    /// Mapped store field. `None` = discard.
    pub db_field: Option<String>,
    /// Confidence 0.0-1.0.
    pub confidence: f64,
    /// Human-readable explanation.
    pub reasoning: String,
    /// True when the column should be sent to the AI provider.
    pub needs_ai: bool,
}

impl ColumnClassification {
    fn discard(csv_column: &str, confidence: f64, reasoning: &str) -> Self {
        Self {
            csv_column: csv_column.to_string(),
            db_field: None,
            confidence,
            reasoning: reasoning.to_string(),
            needs_ai: false,
        }
    }

    fn mapped(csv_column: &str, db_field: &str, confidence: f64, reasoning: String) -> Self {
        Self {
            csv_column: csv_column.to_string(),
            db_field: Some(db_field.to_string()),
            confidence,
            reasoning,
            needs_ai: false,
        }
    }

    fn pending_ai(csv_column: &str, reasoning: &str) -> Self {
        Self {
            csv_column: csv_column.to_string(),
            db_field: None,
            confidence: 0.0,
            reasoning: reasoning.to_string(),
            needs_ai: true,
        }
    }
}

/// Output of [`prefilter_columns`].
#[derive(Debug)]
pub struct Prefiltered {
    /// Headers that survived the filter, in original order.
    pub headers: Vec<String>,
    /// Sample rows reduced to the surviving columns.
    pub sample_rows: Vec<Vec<String>>,
    /// Classifications for the removed columns.
    pub resolved: Vec<ColumnClassification>,
}

/// Remove columns with no data anywhere in the sample set and cap the
/// remainder at [`MAX_COLUMNS_FOR_AI`]. Runs before classification so the
/// classifier and the AI request both stay bounded.
pub fn prefilter_columns(
    headers: &[String],
    sample_rows: &[Vec<String>],
    skip_columns: &HashSet<String>,
) -> Prefiltered {
    let mut resolved = Vec::new();
    let mut keep_indices: Vec<usize> = Vec::new();

    for (i, header) in headers.iter().enumerate() {
        // Pair-claimed columns are handled separately
        if skip_columns.contains(header) {
            continue;
        }

        let has_data = sample_rows
            .iter()
            .any(|row| row.get(i).is_some_and(|v| !v.trim().is_empty()));

        if has_data {
            keep_indices.push(i);
        } else {
            resolved.push(ColumnClassification::discard(
                header,
                0.95,
                "Auto-skip: all sample values empty",
            ));
        }
    }

    if keep_indices.len() > MAX_COLUMNS_FOR_AI {
        for &idx in &keep_indices[MAX_COLUMNS_FOR_AI..] {
            resolved.push(ColumnClassification::discard(
                &headers[idx],
                0.6,
                &format!("Auto-skip: column limit exceeded (max {})", MAX_COLUMNS_FOR_AI),
            ));
        }
        keep_indices.truncate(MAX_COLUMNS_FOR_AI);
    }

    let filtered_headers: Vec<String> = keep_indices.iter().map(|&i| headers[i].clone()).collect();
    let filtered_rows: Vec<Vec<String>> = sample_rows
        .iter()
        .map(|row| {
            keep_indices
                .iter()
                .map(|&i| row.get(i).cloned().unwrap_or_default())
                .collect()
        })
        .collect();

    Prefiltered {
        headers: filtered_headers,
        sample_rows: filtered_rows,
        resolved,
    }
}

/// Classify columns using the tiered rule engine.
///
/// Evaluation order per column:
/// 1. Pre-skip (already claimed, e.g. by the pair detector)
/// 2. Universal skip patterns (system columns)
/// 3. Schema mapping patterns, in schema order
/// 4. Sample analysis (empty / constant columns)
/// 5. Uncertain indicators (send to AI)
/// 6. Domain hint substring match (send to AI)
/// 7. Default: discard with medium confidence
///
/// Returns the rule-resolved classifications and the headers needing AI.
/// Every input header lands in exactly one of the two outputs.
pub fn classify_columns(
    headers: &[String],
    sample_rows: &[Vec<String>],
    config: &ImportModuleConfig,
    skip_columns: &HashSet<String>,
) -> (Vec<ColumnClassification>, Vec<String>) {
    let mut resolved = Vec::new();
    let mut uncertain = Vec::new();

    for (i, header) in headers.iter().enumerate() {
        if skip_columns.contains(header) {
            resolved.push(ColumnClassification::discard(
                header,
                1.0,
                "Pre-classified (handled separately)",
            ));
            continue;
        }

        let sample_values: Vec<&str> = sample_rows
            .iter()
            .take(SAMPLE_LIMIT)
            .map(|row| row.get(i).map(String::as_str).unwrap_or(""))
            .collect();

        let classification = classify_single(header, &sample_values, config);
        if classification.needs_ai {
            uncertain.push(header.clone());
        } else {
            resolved.push(classification);
        }
    }

    (resolved, uncertain)
}

fn classify_single(
    header: &str,
    sample_values: &[&str],
    config: &ImportModuleConfig,
) -> ColumnClassification {
    let header_lower = header.trim().to_lowercase();
    let normalized = NORMALIZE_RE.replace_all(&header_lower, "_");

    // 1. Universal skip patterns (system columns)
    if UNIVERSAL_SKIP_PATTERNS.iter().any(|p| p.is_match(&normalized)) {
        return ColumnClassification::discard(header, 0.95, "Auto-skip: system column pattern");
    }

    // 2. Schema mapping patterns, first match wins
    for field in &config.schema {
        for pattern in &field.mapping_patterns {
            if pattern.is_match(&normalized) {
                return ColumnClassification::mapped(
                    header,
                    &field.name,
                    0.95,
                    format!("Auto-mapped: matches {} pattern", field.name),
                );
            }
        }
    }

    // 3. Sample analysis: empty or constant columns
    let non_empty: Vec<&str> = sample_values
        .iter()
        .filter(|v| !v.trim().is_empty())
        .copied()
        .collect();
    if non_empty.is_empty() {
        return ColumnClassification::discard(header, 0.8, "Auto-skip: all sample values empty");
    }
    if non_empty.len() >= 3 && non_empty.iter().all(|v| *v == non_empty[0]) {
        return ColumnClassification::discard(
            header,
            0.7,
            "Auto-skip: all sample values identical (likely constant)",
        );
    }

    // 4. Uncertain indicators need AI judgment
    if UNCERTAIN_INDICATORS.iter().any(|p| p.is_match(&normalized)) {
        return ColumnClassification::pending_ai(header, "Needs AI: ambiguous column name");
    }

    // 5. Domain hints suggest the column may be relevant
    if config
        .domain_hints
        .iter()
        .any(|hint| header_lower.contains(hint.as_str()))
    {
        return ColumnClassification::pending_ai(
            header,
            "Needs AI: may contain relevant domain data",
        );
    }

    // 6. Nothing recognized the column
    ColumnClassification::discard(
        header,
        0.6,
        "Auto-skip: no recognized pattern, likely irrelevant",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldDefinition, FieldType};

    fn customer_like_config() -> ImportModuleConfig {
        let schema = vec![
            FieldDefinition::new("customer_code", FieldType::String)
                .required()
                .patterns(&[r"^(customer[_\s-]?(code|id)?|cust[_\s-]?code)$"]),
            FieldDefinition::new("name", FieldType::String)
                .required()
                .patterns(&[r"^(name|company[_\s-]?name)$"]),
            FieldDefinition::new("city", FieldType::String).patterns(&[r"^(city|town)$"]),
        ];
        let mut config = ImportModuleConfig::new("customers", "customers", schema);
        config.domain_hints = vec!["customer".into(), "contact".into(), "address".into()];
        config
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_blank_column_discarded_without_ai() {
        // Scenario: schema columns resolve at 0.95, the blank column at 0.8
        let config = customer_like_config();
        let hdrs = headers(&["Customer Code", "Company Name", "City", "Internal Notes"]);
        let samples = rows(&[
            &["C001", "Acme", "Portland", ""],
            &["C002", "Globex", "Austin", ""],
        ]);

        let (resolved, uncertain) = classify_columns(&hdrs, &samples, &config, &HashSet::new());
        assert!(uncertain.is_empty());

        let by_name = |n: &str| resolved.iter().find(|c| c.csv_column == n).unwrap();
        assert_eq!(by_name("Customer Code").db_field.as_deref(), Some("customer_code"));
        assert_eq!(by_name("Customer Code").confidence, 0.95);
        assert_eq!(by_name("Company Name").db_field.as_deref(), Some("name"));
        assert_eq!(by_name("City").db_field.as_deref(), Some("city"));
        let notes = by_name("Internal Notes");
        assert_eq!(notes.db_field, None);
        assert_eq!(notes.confidence, 0.8);
    }

    #[test]
    fn test_system_columns_skipped() {
        let config = customer_like_config();
        let hdrs = headers(&["id", "created_at", "_internal", "legacy_code"]);
        let samples = rows(&[&["1", "2024-01-01", "x", "A"], &["2", "2024-01-02", "y", "B"]]);

        let (resolved, uncertain) = classify_columns(&hdrs, &samples, &config, &HashSet::new());
        assert!(uncertain.is_empty());
        for c in &resolved {
            assert_eq!(c.db_field, None, "{} should be discarded", c.csv_column);
            assert_eq!(c.confidence, 0.95);
        }
    }

    #[test]
    fn test_constant_column_discarded_at_lower_confidence() {
        let config = customer_like_config();
        let hdrs = headers(&["region"]);
        let samples = rows(&[&["WEST"], &["WEST"], &["WEST"]]);

        let (resolved, _) = classify_columns(&hdrs, &samples, &config, &HashSet::new());
        assert_eq!(resolved[0].confidence, 0.7);
        assert!(resolved[0].reasoning.contains("identical"));
    }

    #[test]
    fn test_cryptic_and_hinted_headers_go_to_ai() {
        let config = customer_like_config();
        let hdrs = headers(&["field3", "x42", "customer_tier", "unrelated"]);
        let samples = rows(&[&["a", "b", "gold", "q"], &["c", "d", "silver", "w"]]);

        let (resolved, uncertain) = classify_columns(&hdrs, &samples, &config, &HashSet::new());
        assert_eq!(uncertain, vec!["field3", "x42", "customer_tier"]);
        // Default discard for the unrecognized column
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].csv_column, "unrelated");
        assert_eq!(resolved[0].confidence, 0.6);
    }

    #[test]
    fn test_pre_skip_claims_win() {
        let config = customer_like_config();
        let hdrs = headers(&["qty1", "City"]);
        let samples = rows(&[&["10", "Reno"]]);
        let skip: HashSet<String> = ["qty1".to_string()].into();

        let (resolved, uncertain) = classify_columns(&hdrs, &samples, &config, &skip);
        assert!(uncertain.is_empty());
        let qty = resolved.iter().find(|c| c.csv_column == "qty1").unwrap();
        assert_eq!(qty.confidence, 1.0);
        assert_eq!(qty.db_field, None);
    }

    #[test]
    fn test_partition_completeness_and_determinism() {
        let config = customer_like_config();
        let hdrs = headers(&["Customer Code", "misc_data", "created_at", "blank", "zz9"]);
        let samples = rows(&[&["C1", "x", "t", "", "1"], &["C2", "y", "t", "", "2"]]);

        let (r1, u1) = classify_columns(&hdrs, &samples, &config, &HashSet::new());
        let (r2, u2) = classify_columns(&hdrs, &samples, &config, &HashSet::new());
        assert_eq!(r1, r2);
        assert_eq!(u1, u2);

        // Every header lands in exactly one bucket
        let mut seen: Vec<&str> = r1.iter().map(|c| c.csv_column.as_str()).collect();
        seen.extend(u1.iter().map(String::as_str));
        seen.sort_unstable();
        let mut expected: Vec<&str> = hdrs.iter().map(String::as_str).collect();
        expected.sort_unstable();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_prefilter_drops_fully_empty_columns() {
        let hdrs = headers(&["a", "empty", "b"]);
        let samples = rows(&[&["1", "", "x"], &["2", " ", "y"]]);

        let out = prefilter_columns(&hdrs, &samples, &HashSet::new());
        assert_eq!(out.headers, vec!["a", "b"]);
        assert_eq!(out.sample_rows[0], vec!["1", "x"]);
        assert_eq!(out.resolved.len(), 1);
        assert_eq!(out.resolved[0].csv_column, "empty");
        assert_eq!(out.resolved[0].confidence, 0.95);
    }

    #[test]
    fn test_prefilter_caps_column_count() {
        let hdrs: Vec<String> = (0..40).map(|i| format!("col{}", i)).collect();
        let samples = vec![(0..40).map(|i| format!("v{}", i)).collect::<Vec<_>>()];

        let out = prefilter_columns(&hdrs, &samples, &HashSet::new());
        assert_eq!(out.headers.len(), MAX_COLUMNS_FOR_AI);
        assert_eq!(out.resolved.len(), 10);
        assert!(out.resolved.iter().all(|c| c.reasoning.contains("limit exceeded")));
        assert!(out.resolved.iter().all(|c| c.confidence == 0.6));
    }
}
