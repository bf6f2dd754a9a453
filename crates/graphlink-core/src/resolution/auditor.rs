//! Post-hoc statistics and anomaly checks over correspondence edges.
//!
//! Everything here is read-only and computed from the store at call time;
//! nothing is cached between calls.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::GraphLinkResult;
use crate::traits::GraphStore;
use crate::types::{CorrespondenceRecord, NodeId};

use super::config::ResolutionConfig;
use super::quality::{round3, QualityReport};

/// Similarity distribution of one label's correspondences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeStats {
    pub count: u64,
    pub avg_similarity: f64,
    pub min_similarity: f64,
    pub max_similarity: f64,
}

/// Result of [`ResolutionAuditor::get_resolution_statistics`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionStatistics {
    pub resolution_by_type: BTreeMap<String, TypeStats>,
    /// Distinct correspondence edges in the graph.
    pub total_correspondences: u64,
    /// Entity nodes without any correspondence, per label.
    pub unresolved_by_type: BTreeMap<String, u64>,
}

impl ResolutionStatistics {
    /// Labels whose entity nodes are all unmatched.
    pub fn fully_unresolved_labels(&self) -> Vec<&str> {
        self.unresolved_by_type
            .iter()
            .filter(|(label, count)| **count > 0 && !self.resolution_by_type.contains_key(*label))
            .map(|(label, _)| label.as_str())
            .collect()
    }
}

/// An advisory finding about existing correspondences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolutionIssue {
    /// An entity node resolved to more than one domain node.
    MultipleCorrespondences {
        entity_id: NodeId,
        labels: Vec<String>,
        count: u64,
        message: String,
    },
    /// A correspondence below the quality floor.
    LowSimilarity {
        entity_id: NodeId,
        domain_id: NodeId,
        similarity: f64,
        message: String,
    },
}

#[derive(Default)]
struct Accumulator {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl Accumulator {
    fn add(&mut self, similarity: f64) {
        if self.count == 0 {
            self.min = similarity;
            self.max = similarity;
        } else {
            self.min = self.min.min(similarity);
            self.max = self.max.max(similarity);
        }
        self.count += 1;
        self.sum += similarity;
    }

    fn finish(&self) -> TypeStats {
        TypeStats {
            count: self.count,
            avg_similarity: round3(self.sum / self.count as f64),
            min_similarity: round3(self.min),
            max_similarity: round3(self.max),
        }
    }
}

/// Reads correspondence state back out of the store.
#[derive(Clone)]
pub struct ResolutionAuditor {
    store: Arc<dyn GraphStore>,
    relationship_type: String,
    system_label_prefix: String,
    quality_floor: f64,
    validation_limit: usize,
}

impl ResolutionAuditor {
    pub fn new(store: Arc<dyn GraphStore>, config: &ResolutionConfig) -> Self {
        Self {
            store,
            relationship_type: config.relationship_type.clone(),
            system_label_prefix: config.system_label_prefix.clone(),
            quality_floor: config.quality_floor,
            validation_limit: config.validation_limit,
        }
    }

    /// Per-label counts and similarity distribution of correspondences,
    /// plus the number of still-unmatched entity nodes per label.
    ///
    /// An edge whose entity node carries several labels is counted under
    /// each of them in `resolution_by_type` but once in
    /// `total_correspondences`.
    pub async fn get_resolution_statistics(&self) -> GraphLinkResult<ResolutionStatistics> {
        let records = self.store.correspondences(&self.relationship_type).await?;

        let mut by_type: BTreeMap<String, Accumulator> = BTreeMap::new();
        for record in &records {
            for label in record.entity.domain_labels(&self.system_label_prefix) {
                by_type.entry(label.to_string()).or_default().add(record.similarity);
            }
        }

        let unmatched = self.store.unmatched_entities(&self.relationship_type).await?;
        let mut unresolved_by_type: BTreeMap<String, u64> = BTreeMap::new();
        for node in &unmatched {
            for label in node.domain_labels(&self.system_label_prefix) {
                *unresolved_by_type.entry(label.to_string()).or_default() += 1;
            }
        }

        let stats = ResolutionStatistics {
            resolution_by_type: by_type.iter().map(|(k, v)| (k.clone(), v.finish())).collect(),
            total_correspondences: records.len() as u64,
            unresolved_by_type,
        };
        debug!(
            total = stats.total_correspondences,
            labels = stats.resolution_by_type.len(),
            "computed resolution statistics"
        );
        Ok(stats)
    }

    /// Flag ambiguous and low-confidence correspondences.
    ///
    /// Each check reports at most `validation_limit` issues. Ambiguous
    /// entities come first, ordered by edge count descending.
    pub async fn validate_resolutions(&self) -> GraphLinkResult<Vec<ResolutionIssue>> {
        let records = self.store.correspondences(&self.relationship_type).await?;

        let mut issues = self.multiple_correspondences(&records);
        issues.extend(self.low_similarity(&records));

        info!(issues = issues.len(), "validated resolutions");
        Ok(issues)
    }

    fn multiple_correspondences(&self, records: &[CorrespondenceRecord]) -> Vec<ResolutionIssue> {
        let mut per_entity: HashMap<&NodeId, (&CorrespondenceRecord, u64)> = HashMap::new();
        for record in records {
            per_entity.entry(&record.entity.id).or_insert((record, 0)).1 += 1;
        }

        let mut ambiguous: Vec<_> = per_entity
            .into_values()
            .filter(|(_, count)| *count > 1)
            .collect();
        ambiguous.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.entity.id.cmp(&b.0.entity.id)));

        ambiguous
            .into_iter()
            .take(self.validation_limit)
            .map(|(record, count)| ResolutionIssue::MultipleCorrespondences {
                entity_id: record.entity.id.clone(),
                labels: record.entity.labels.clone(),
                count,
                message: format!("Entity has {} correspondences", count),
            })
            .collect()
    }

    fn low_similarity(&self, records: &[CorrespondenceRecord]) -> Vec<ResolutionIssue> {
        records
            .iter()
            .filter(|r| r.similarity < self.quality_floor)
            .take(self.validation_limit)
            .map(|r| ResolutionIssue::LowSimilarity {
                entity_id: r.entity.id.clone(),
                domain_id: r.domain.id.clone(),
                similarity: r.similarity,
                message: format!("Low similarity correspondence: {:.2}", r.similarity),
            })
            .collect()
    }

    /// Quality report over the whole graph.
    pub async fn assess_quality(&self) -> GraphLinkResult<QualityReport> {
        let summary = self.store.graph_summary().await?;
        let report = QualityReport::from_summary(&summary);
        info!(score = report.quality_score, "assessed graph quality");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockGraphStore;
    use crate::types::{GraphSummary, NodeRef};
    use chrono::Utc;

    fn node(id: &str, labels: &[&str]) -> NodeRef {
        NodeRef {
            id: NodeId::new(id),
            labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    fn record(entity: &str, domain: &str, label: &str, similarity: f64) -> CorrespondenceRecord {
        CorrespondenceRecord {
            entity: node(entity, &["__Entity__", label]),
            domain: node(domain, &[label]),
            similarity,
            entity_key: "name".into(),
            domain_key: "name".into(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn auditor(store: MockGraphStore) -> ResolutionAuditor {
        ResolutionAuditor::new(Arc::new(store), &ResolutionConfig::default())
    }

    #[tokio::test]
    async fn test_statistics_per_label() {
        let mut store = MockGraphStore::new();
        store.expect_correspondences().returning(|_| {
            Ok(vec![
                record("e1", "d1", "Product", 1.0),
                record("e2", "d2", "Product", 0.8334),
                record("e3", "d3", "Supplier", 0.9),
            ])
        });
        store.expect_unmatched_entities().returning(|_| {
            Ok(vec![
                node("e4", &["__Entity__", "Product"]),
                node("e5", &["__Entity__", "Issue"]),
                node("e6", &["__Entity__", "Issue"]),
            ])
        });

        let stats = auditor(store).get_resolution_statistics().await.unwrap();

        assert_eq!(stats.total_correspondences, 3);
        let product = &stats.resolution_by_type["Product"];
        assert_eq!(product.count, 2);
        assert_eq!(product.avg_similarity, 0.917);
        assert_eq!(product.min_similarity, 0.833);
        assert_eq!(product.max_similarity, 1.0);
        assert_eq!(stats.unresolved_by_type["Product"], 1);
        assert_eq!(stats.unresolved_by_type["Issue"], 2);
        assert!(!stats.unresolved_by_type.contains_key("__Entity__"));
        assert_eq!(stats.fully_unresolved_labels(), vec!["Issue"]);
    }

    #[tokio::test]
    async fn test_statistics_empty_graph() {
        let mut store = MockGraphStore::new();
        store.expect_correspondences().returning(|_| Ok(vec![]));
        store.expect_unmatched_entities().returning(|_| Ok(vec![]));

        let stats = auditor(store).get_resolution_statistics().await.unwrap();
        assert_eq!(stats, ResolutionStatistics::default());
    }

    #[tokio::test]
    async fn test_validation_flags_ambiguity_and_low_similarity() {
        let mut store = MockGraphStore::new();
        store.expect_correspondences().returning(|_| {
            Ok(vec![
                record("e1", "d1", "Product", 0.95),
                record("e1", "d2", "Product", 0.91),
                record("e2", "d3", "Product", 0.65),
            ])
        });

        let issues = auditor(store).validate_resolutions().await.unwrap();

        assert_eq!(issues.len(), 2);
        match &issues[0] {
            ResolutionIssue::MultipleCorrespondences {
                entity_id,
                count,
                message,
                ..
            } => {
                assert_eq!(entity_id.as_str(), "e1");
                assert_eq!(*count, 2);
                assert_eq!(message, "Entity has 2 correspondences");
            }
            other => panic!("unexpected issue: {other:?}"),
        }
        match &issues[1] {
            ResolutionIssue::LowSimilarity {
                domain_id,
                similarity,
                message,
                ..
            } => {
                assert_eq!(domain_id.as_str(), "d3");
                assert_eq!(*similarity, 0.65);
                assert_eq!(message, "Low similarity correspondence: 0.65");
            }
            other => panic!("unexpected issue: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_validation_respects_limit() {
        let mut store = MockGraphStore::new();
        store.expect_correspondences().returning(|_| {
            Ok((0..25)
                .map(|i| record(&format!("e{i}"), &format!("d{i}"), "Part", 0.5))
                .collect())
        });

        let issues = auditor(store).validate_resolutions().await.unwrap();
        assert_eq!(issues.len(), 10);
        assert!(issues
            .iter()
            .all(|i| matches!(i, ResolutionIssue::LowSimilarity { .. })));
    }

    #[tokio::test]
    async fn test_assess_quality() {
        let mut store = MockGraphStore::new();
        store.expect_graph_summary().returning(|| {
            Ok(GraphSummary {
                total_nodes: 10,
                orphan_nodes: 2,
                connected_nodes: 8,
                relationship_counts: vec![("CORRESPONDS_TO".into(), 8)],
                nodes_by_label: vec![("Product".into(), 10)],
            })
        });

        let report = auditor(store).assess_quality().await.unwrap();
        // 4 for orphans, 10 for a single relationship type
        assert_eq!(report.quality_score, 86);
        assert_eq!(report.connectivity_ratio, 0.8);
    }
}
