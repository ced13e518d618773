//! Column-pair detection for tiered pricing columns.
//!
//! Finds pairs like `qty1`/`price1`, `qty2`/`price2` and claims both columns
//! so the classifier and AI never see them; the execution engine later
//! materializes the pairs into one ordered pricing array.

use regex::Regex;
use std::collections::HashSet;

/// Detect qty/price column pairs tied together by tier number.
///
/// Both patterns must carry one capture group yielding the tier number.
/// The scan is greedy and non-backtracking: headers are visited in input
/// order, a claimed column is never reused, and each qty column binds to the
/// first unclaimed price column with the same tier. Pairs are returned
/// sorted ascending by tier number.
pub fn detect_column_pairs(
    headers: &[String],
    qty_pattern: &Regex,
    price_pattern: &Regex,
) -> (Vec<(String, String)>, HashSet<String>) {
    // (normalized, original), preserving header order
    let lookup: Vec<(String, &String)> = headers
        .iter()
        .map(|h| (h.to_lowercase().replace(' ', ""), h))
        .collect();

    let mut pairs: Vec<(u32, String, String)> = Vec::new();
    let mut claimed: HashSet<String> = HashSet::new();

    for (normalized, original) in &lookup {
        if claimed.contains(*original) {
            continue;
        }
        let Some(tier) = capture_tier(qty_pattern, normalized) else {
            continue;
        };

        for (price_normalized, price_original) in &lookup {
            if claimed.contains(*price_original) {
                continue;
            }
            if capture_tier(price_pattern, price_normalized) == Some(tier) {
                pairs.push((tier, (*original).clone(), (*price_original).clone()));
                claimed.insert((*original).clone());
                claimed.insert((*price_original).clone());
                break;
            }
        }
    }

    pairs.sort_by_key(|(tier, _, _)| *tier);
    (
        pairs.into_iter().map(|(_, qty, price)| (qty, price)).collect(),
        claimed,
    )
}

fn capture_tier(pattern: &Regex, header: &str) -> Option<u32> {
    pattern
        .captures(header)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
