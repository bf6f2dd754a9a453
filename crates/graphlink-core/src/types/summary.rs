//! Whole-graph summary used for quality scoring.

use serde::{Deserialize, Serialize};

/// Structural counts over the entire graph, as reported by a store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub total_nodes: u64,
    /// Nodes with no incident edges at all.
    pub orphan_nodes: u64,
    /// Nodes touched by at least one edge.
    pub connected_nodes: u64,
    /// Edge count per relationship type, sorted by count descending.
    pub relationship_counts: Vec<(String, u64)>,
    /// Node count per label, sorted by count descending.
    pub nodes_by_label: Vec<(String, u64)>,
}

impl GraphSummary {
    /// Fraction of nodes touched by at least one edge; 0 for an empty graph.
    pub fn connectivity_ratio(&self) -> f64 {
        if self.total_nodes == 0 {
            0.0
        } else {
            self.connected_nodes as f64 / self.total_nodes as f64
        }
    }

    /// Number of distinct relationship types.
    pub fn relationship_types(&self) -> usize {
        self.relationship_counts.len()
    }
}
