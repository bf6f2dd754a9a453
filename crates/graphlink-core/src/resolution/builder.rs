//! Correspondence building: similarity join + edge upsert for one label.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, info};

use crate::error::GraphLinkResult;
use crate::traits::GraphStore;
use crate::types::{Correspondence, GraphNode, Population};

use super::similarity::StringSimilarity;

/// Pre-filter applied before the pairwise comparison.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BlockingStrategy {
    /// Compare every entity with every domain node.
    #[default]
    Exhaustive,
    /// Only compare values that share their first whitespace-delimited token.
    /// Cheaper on large populations but can miss matches whose first word
    /// differs.
    FirstToken,
}

/// Outcome of building correspondences for one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildOutcome {
    pub label: String,
    pub entity_key: String,
    pub domain_key: String,
    /// Edges created or refreshed.
    pub relationships_created: u64,
    /// Pairs actually compared after blocking.
    pub comparisons: u64,
}

/// Join two node populations on a pair of property keys.
///
/// Values are compared case-insensitively; a node without a scalar value for
/// its key takes no part in the join. Every pair whose similarity reaches
/// `threshold` yields a [`Correspondence`] carrying the score and the key
/// pair. Returns the matches and the number of comparisons made.
pub fn similarity_join(
    entities: &[GraphNode],
    domains: &[GraphNode],
    entity_key: &str,
    domain_key: &str,
    metric: &dyn StringSimilarity,
    threshold: f64,
    blocking: BlockingStrategy,
) -> (Vec<Correspondence>, u64) {
    let domain_values: Vec<(&GraphNode, String)> = domains
        .iter()
        .filter_map(|d| d.property_text(domain_key).map(|v| (d, v.to_lowercase())))
        .collect();

    let buckets: HashMap<&str, Vec<usize>> = match blocking {
        BlockingStrategy::Exhaustive => HashMap::new(),
        BlockingStrategy::FirstToken => {
            let mut buckets: HashMap<&str, Vec<usize>> = HashMap::new();
            for (i, (_, value)) in domain_values.iter().enumerate() {
                buckets.entry(first_token(value)).or_default().push(i);
            }
            buckets
        }
    };
    let all: Vec<usize> = (0..domain_values.len()).collect();

    let mut matches = Vec::new();
    let mut comparisons = 0u64;

    for entity in entities {
        let Some(value) = entity.property_text(entity_key).map(|v| v.to_lowercase()) else {
            continue;
        };

        let candidates: &[usize] = match blocking {
            BlockingStrategy::Exhaustive => &all,
            BlockingStrategy::FirstToken => buckets
                .get(first_token(&value))
                .map(Vec::as_slice)
                .unwrap_or(&[]),
        };

        for &i in candidates {
            let (domain, domain_value) = &domain_values[i];
            comparisons += 1;
            let similarity = metric.similarity(&value, domain_value);
            if similarity >= threshold {
                matches.push(Correspondence {
                    entity_id: entity.id.clone(),
                    domain_id: domain.id.clone(),
                    similarity,
                    entity_key: entity_key.to_string(),
                    domain_key: domain_key.to_string(),
                });
            }
        }
    }

    (matches, comparisons)
}

fn first_token(value: &str) -> &str {
    value.split_whitespace().next().unwrap_or("")
}

/// Materialises correspondence edges for a label and key pair.
pub struct CorrespondenceBuilder {
    store: Arc<dyn GraphStore>,
    metric: Box<dyn StringSimilarity>,
    blocking: BlockingStrategy,
    relationship_type: String,
}

impl CorrespondenceBuilder {
    /// Create a builder writing edges of `relationship_type`.
    pub fn new(
        store: Arc<dyn GraphStore>,
        metric: Box<dyn StringSimilarity>,
        blocking: BlockingStrategy,
        relationship_type: impl Into<String>,
    ) -> Self {
        Self {
            store,
            metric,
            blocking,
            relationship_type: relationship_type.into(),
        }
    }

    /// Join entity and domain nodes of `label` and upsert an edge for every
    /// pair at or above `similarity_threshold`.
    ///
    /// Zero matches is a success with `relationships_created == 0`. Store
    /// failures are returned as errors.
    pub async fn build(
        &self,
        label: &str,
        entity_key: &str,
        domain_key: &str,
        similarity_threshold: f64,
    ) -> GraphLinkResult<BuildOutcome> {
        let entities = self.store.nodes(label, Population::Entity).await?;
        let domains = self.store.nodes(label, Population::Domain).await?;

        let (matches, comparisons) = similarity_join(
            &entities,
            &domains,
            entity_key,
            domain_key,
            self.metric.as_ref(),
            similarity_threshold,
            self.blocking,
        );
        debug!(
            label,
            entities = entities.len(),
            domains = domains.len(),
            comparisons,
            matches = matches.len(),
            "similarity join finished"
        );

        let relationships_created = if matches.is_empty() {
            0
        } else {
            self.store
                .upsert_correspondences(&self.relationship_type, &matches)
                .await?
        };

        info!(label, entity_key, domain_key, relationships_created, "built correspondences");

        Ok(BuildOutcome {
            label: label.to_string(),
            entity_key: entity_key.to_string(),
            domain_key: domain_key.to_string(),
            relationships_created,
            comparisons,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphLinkError;
    use crate::resolution::similarity::{NormalizedLevenshtein, SimilarityMetric};
    use crate::traits::MockGraphStore;

    fn entity(id: &str, name: &str) -> GraphNode {
        GraphNode::new(id, vec!["__Entity__".into(), "Product".into()])
            .with_property("Product_Name", name)
    }

    fn domain(id: &str, name: &str) -> GraphNode {
        GraphNode::new(id, vec!["Product".into()]).with_property("name", name)
    }

    #[test]
    fn test_join_exact_match_only_above_threshold() {
        let entities = vec![entity("e1", "Uppsala Sofa")];
        let domains = vec![domain("d1", "Uppsala Sofa"), domain("d2", "Uppsala Sofa Deluxe")];

        let (matches, comparisons) = similarity_join(
            &entities,
            &domains,
            "Product_Name",
            "name",
            &NormalizedLevenshtein,
            0.9,
            BlockingStrategy::Exhaustive,
        );

        assert_eq!(comparisons, 2);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].domain_id.as_str(), "d1");
        assert_eq!(matches[0].similarity, 1.0);
        assert_eq!(matches[0].entity_key, "Product_Name");
        assert_eq!(matches[0].domain_key, "name");
    }

    #[test]
    fn test_join_is_case_insensitive_and_skips_missing_values() {
        let entities = vec![
            entity("e1", "MALMO DESK"),
            GraphNode::new("e2", vec!["Product".into()]),
        ];
        let domains = vec![
            domain("d1", "Malmo Desk"),
            GraphNode::new("d2", vec!["Product".into()]).with_property("name", serde_json::Value::Null),
        ];

        let (matches, comparisons) = similarity_join(
            &entities,
            &domains,
            "Product_Name",
            "name",
            &NormalizedLevenshtein,
            0.95,
            BlockingStrategy::Exhaustive,
        );
        assert_eq!(comparisons, 1);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].similarity, 1.0);
    }

    #[test]
    fn test_threshold_monotonicity() {
        let entities = vec![
            entity("e1", "Stockholm Chair"),
            entity("e2", "Stokholm chair"),
            entity("e3", "Orebro Lamp"),
        ];
        let domains = vec![
            domain("d1", "Stockholm Chair"),
            domain("d2", "Orebro Lamp"),
            domain("d3", "Orebro Lamps"),
        ];
        let metric = SimilarityMetric::JaroWinkler.metric();

        let mut previous = usize::MAX;
        for step in 0..=20 {
            let threshold = step as f64 / 20.0;
            let (matches, _) = similarity_join(
                &entities,
                &domains,
                "Product_Name",
                "name",
                metric.as_ref(),
                threshold,
                BlockingStrategy::Exhaustive,
            );
            assert!(matches.len() <= previous, "count grew at threshold {threshold}");
            previous = matches.len();
        }
    }

    #[test]
    fn test_first_token_blocking_limits_comparisons() {
        let entities = vec![entity("e1", "Uppsala Sofa")];
        let domains = vec![
            domain("d1", "uppsala sofa"),
            domain("d2", "Malmo Desk"),
            domain("d3", "Orebro Lamp"),
        ];

        let (matches, comparisons) = similarity_join(
            &entities,
            &domains,
            "Product_Name",
            "name",
            &NormalizedLevenshtein,
            0.9,
            BlockingStrategy::FirstToken,
        );
        assert_eq!(comparisons, 1);
        assert_eq!(matches.len(), 1);
    }

    #[tokio::test]
    async fn test_build_upserts_matches() {
        let mut store = MockGraphStore::new();
        store
            .expect_nodes()
            .withf(|_, population| *population == Population::Entity)
            .returning(|_, _| Ok(vec![entity("e1", "Uppsala Sofa")]));
        store
            .expect_nodes()
            .withf(|_, population| *population == Population::Domain)
            .returning(|_, _| Ok(vec![domain("d1", "Uppsala Sofa")]));
        store
            .expect_upsert_correspondences()
            .withf(|rel, edges| rel == "CORRESPONDS_TO" && edges.len() == 1)
            .times(1)
            .returning(|_, edges| Ok(edges.len() as u64));

        let builder = CorrespondenceBuilder::new(
            Arc::new(store),
            Box::new(NormalizedLevenshtein),
            BlockingStrategy::Exhaustive,
            "CORRESPONDS_TO",
        );
        let outcome = builder.build("Product", "Product_Name", "name", 0.9).await.unwrap();
        assert_eq!(outcome.relationships_created, 1);
        assert_eq!(outcome.label, "Product");
    }

    #[tokio::test]
    async fn test_build_zero_matches_is_not_an_error() {
        let mut store = MockGraphStore::new();
        store
            .expect_nodes()
            .withf(|_, population| *population == Population::Entity)
            .returning(|_, _| Ok(vec![entity("e1", "Gothenburg Table")]));
        store
            .expect_nodes()
            .withf(|_, population| *population == Population::Domain)
            .returning(|_, _| Ok(vec![domain("d1", "Vasteras Bookshelf")]));
        store.expect_upsert_correspondences().never();

        let builder = CorrespondenceBuilder::new(
            Arc::new(store),
            Box::new(NormalizedLevenshtein),
            BlockingStrategy::Exhaustive,
            "CORRESPONDS_TO",
        );
        let outcome = builder.build("Product", "Product_Name", "name", 0.9).await.unwrap();
        assert_eq!(outcome.relationships_created, 0);
    }

    #[tokio::test]
    async fn test_build_store_error_is_returned() {
        let mut store = MockGraphStore::new();
        store
            .expect_nodes()
            .returning(|_, _| Err(GraphLinkError::graph_store("connection reset")));

        let builder = CorrespondenceBuilder::new(
            Arc::new(store),
            Box::new(NormalizedLevenshtein),
            BlockingStrategy::Exhaustive,
            "CORRESPONDS_TO",
        );
        let err = builder.build("Product", "Product_Name", "name", 0.9).await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }
}
