//! Whole-graph quality scoring.

use serde::{Deserialize, Serialize};

use crate::types::GraphSummary;

/// Orphans cost this many points each.
const ORPHAN_PENALTY: u64 = 2;
/// Cap on the total orphan penalty.
const MAX_ORPHAN_PENALTY: u64 = 30;
/// Connectivity below this ratio is penalised.
const MIN_CONNECTIVITY: f64 = 0.5;
const LOW_CONNECTIVITY_PENALTY: u64 = 20;
/// Fewer relationship types than this is penalised.
const MIN_RELATIONSHIP_TYPES: usize = 3;
const LOW_DIVERSITY_PENALTY: u64 = 10;
/// Relationship types listed in a report.
const TOP_RELATIONSHIPS: usize = 5;

/// A deduction applied to the quality score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualityPenalty {
    OrphanNodes { count: u64, points: u64 },
    LowConnectivity { ratio: f64, points: u64 },
    LowRelationshipDiversity { types: usize, points: u64 },
}

impl QualityPenalty {
    pub fn points(&self) -> u64 {
        match self {
            Self::OrphanNodes { points, .. }
            | Self::LowConnectivity { points, .. }
            | Self::LowRelationshipDiversity { points, .. } => *points,
        }
    }
}

/// Quality assessment of the whole graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// 0 to 100.
    pub quality_score: u64,
    pub total_nodes: u64,
    pub orphan_nodes: u64,
    pub connectivity_ratio: f64,
    pub relationship_types: usize,
    /// Most frequent relationship types, at most five.
    pub relationship_distribution: Vec<(String, u64)>,
    pub nodes_by_label: Vec<(String, u64)>,
    pub penalties: Vec<QualityPenalty>,
}

/// Penalties that apply to `summary`.
pub fn penalties(summary: &GraphSummary) -> Vec<QualityPenalty> {
    let mut penalties = Vec::new();

    if summary.orphan_nodes > 0 {
        penalties.push(QualityPenalty::OrphanNodes {
            count: summary.orphan_nodes,
            points: (summary.orphan_nodes.saturating_mul(ORPHAN_PENALTY)).min(MAX_ORPHAN_PENALTY),
        });
    }

    let ratio = summary.connectivity_ratio();
    if ratio < MIN_CONNECTIVITY {
        penalties.push(QualityPenalty::LowConnectivity {
            ratio,
            points: LOW_CONNECTIVITY_PENALTY,
        });
    }

    let types = summary.relationship_types();
    if types < MIN_RELATIONSHIP_TYPES {
        penalties.push(QualityPenalty::LowRelationshipDiversity {
            types,
            points: LOW_DIVERSITY_PENALTY,
        });
    }

    penalties
}

/// Score `summary` out of 100, never below 0.
pub fn quality_score(summary: &GraphSummary) -> u64 {
    let deducted: u64 = penalties(summary).iter().map(QualityPenalty::points).sum();
    100u64.saturating_sub(deducted)
}

impl QualityReport {
    /// Build a report from a store summary.
    pub fn from_summary(summary: &GraphSummary) -> Self {
        let penalties = penalties(summary);
        let deducted: u64 = penalties.iter().map(QualityPenalty::points).sum();

        let mut distribution = summary.relationship_counts.clone();
        distribution.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        distribution.truncate(TOP_RELATIONSHIPS);

        Self {
            quality_score: 100u64.saturating_sub(deducted),
            total_nodes: summary.total_nodes,
            orphan_nodes: summary.orphan_nodes,
            connectivity_ratio: round3(summary.connectivity_ratio()),
            relationship_types: summary.relationship_types(),
            relationship_distribution: distribution,
            nodes_by_label: summary.nodes_by_label.clone(),
            penalties,
        }
    }
}

/// Round to three decimals for reporting.
pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
