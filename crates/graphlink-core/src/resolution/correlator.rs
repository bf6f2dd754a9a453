//! Property-key correlation between entity and domain nodes.
//!
//! Extracted entity keys are free-form (`name`, `Product_Name`,
//! `product name`); domain keys come from column headers. Keys are compared
//! after a lexical normalisation that drops the label prefix, so the label
//! scoping does most of the work and no learned matcher is needed.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A proposed pairing of an entity key with a domain key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPair {
    pub entity_key: String,
    pub domain_key: String,
    /// 1.0 for an exact normalised match, otherwise the length ratio of the
    /// contained key to the containing key.
    pub score: f64,
}

/// Normalise a property key for comparison under `label`.
///
/// Lowercases, strips a leading occurrence of the label followed by any run
/// of `_` or spaces, then replaces remaining spaces with underscores.
pub fn normalize_key(label: &str, key: &str) -> String {
    let lowered = key.to_lowercase();
    let label = label.to_lowercase();

    let stripped = match lowered.strip_prefix(label.as_str()) {
        Some(rest) if !label.is_empty() => rest.trim_start_matches(['_', ' ']),
        _ => lowered.as_str(),
    };

    stripped.replace(' ', "_")
}

/// Propose key pairings for `label`, best first.
///
/// Exact normalised matches score 1.0. Otherwise a pair qualifies when one
/// normalised key contains the other and the length ratio reaches
/// `threshold`. The sort is stable, so equal scores keep discovery order.
/// An empty result means the label cannot be resolved; it is not an error.
pub fn correlate(
    label: &str,
    entity_keys: &[String],
    domain_keys: &[String],
    threshold: f64,
) -> Vec<KeyPair> {
    let normalized_domain: Vec<String> = domain_keys
        .iter()
        .map(|k| normalize_key(label, k))
        .collect();

    let mut pairs = Vec::new();

    for entity_key in entity_keys {
        let ne = normalize_key(label, entity_key);

        for (domain_key, nd) in domain_keys.iter().zip(&normalized_domain) {
            let score = if ne == *nd {
                1.0
            } else if ne.contains(nd.as_str()) || nd.contains(ne.as_str()) {
                let (le, ld) = (ne.chars().count(), nd.chars().count());
                let (short, long) = (le.min(ld), le.max(ld));
                let ratio = short as f64 / long as f64;
                if ratio < threshold {
                    continue;
                }
                ratio
            } else {
                continue;
            };

            pairs.push(KeyPair {
                entity_key: entity_key.clone(),
                domain_key: domain_key.clone(),
                score,
            });
        }
    }

    pairs.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    debug!(label, candidates = pairs.len(), "correlated property keys");
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_strips_label_prefix() {
        assert_eq!(normalize_key("Product", "Product_Name"), "name");
        assert_eq!(normalize_key("Product", "name"), "name");
        assert_eq!(normalize_key("Product", "product name"), "name");
        assert_eq!(normalize_key("Product", "PRODUCT__ Name"), "name");
        assert_eq!(normalize_key("Supplier", "contact email"), "contact_email");
        assert_eq!(normalize_key("Part", "partner"), "ner");
    }

    #[test]
    fn test_exact_pairing_scores_one() {
        let pairs = correlate(
            "Product",
            &keys(&["Product_Name"]),
            &keys(&["name", "price"]),
            0.8,
        );
        assert_eq!(
            pairs,
            vec![KeyPair {
                entity_key: "Product_Name".into(),
                domain_key: "name".into(),
                score: 1.0,
            }]
        );
    }

    #[test]
    fn test_substring_pairing_uses_length_ratio() {
        // "name" inside "names": 4 / 5
        let pairs = correlate("Product", &keys(&["name"]), &keys(&["names"]), 0.8);
        assert_eq!(pairs.len(), 1);
        assert!((pairs[0].score - 0.8).abs() < 1e-9);

        // "name" inside "product_name_en" after stripping: "name" vs "name_en" = 4 / 7
        let pairs = correlate("Product", &keys(&["name"]), &keys(&["name_en"]), 0.8);
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_length_ratio_counts_characters() {
        // 3 chars / 5 chars, not 6 bytes / 8 bytes
        let pairs = correlate("Product", &keys(&["ééé"]), &keys(&["éééab"]), 0.7);
        assert!(pairs.is_empty());

        let pairs = correlate("Part", &keys(&["größe"]), &keys(&["größe_cm"]), 0.6);
        assert_eq!(pairs.len(), 1);
        assert!((pairs[0].score - 5.0 / 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_sorted_descending_with_stable_ties() {
        let pairs = correlate(
            "Product",
            &keys(&["id", "Product_Name", "name"]),
            &keys(&["product_id", "name"]),
            0.5,
        );
        let summary: Vec<_> = pairs
            .iter()
            .map(|p| (p.entity_key.as_str(), p.domain_key.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![("id", "product_id"), ("Product_Name", "name"), ("name", "name")]
        );
        assert!(pairs.iter().all(|p| p.score == 1.0));
    }

    #[test]
    fn test_empty_inputs_yield_no_pairs() {
        assert!(correlate("Product", &[], &keys(&["name"]), 0.8).is_empty());
        assert!(correlate("Product", &keys(&["name"]), &[], 0.8).is_empty());
        assert!(correlate("Product", &keys(&["color"]), &keys(&["name"]), 0.0).is_empty());
    }
}
