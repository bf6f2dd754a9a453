//! In-memory property graph using petgraph DiGraph.
//!
//! Answers the pattern-matching queries the resolution engine issues
//! (population scans, edge lookups, structural counts) without touching
//! SQLite.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use graphlink_core::traits::ENTITY_LABEL;
use graphlink_core::types::{
    CorrespondenceRecord, GraphNode, GraphSummary, NodeId, NodeRef, Population, Properties,
};

/// Node data in the property graph.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredNode {
    /// Database ID (from SQLite).
    pub db_id: i64,
    pub labels: Vec<String>,
    pub properties: Properties,
}

impl StoredNode {
    /// Create a new node.
    pub fn new(db_id: i64, labels: Vec<String>) -> Self {
        Self {
            db_id,
            labels,
            properties: Properties::new(),
        }
    }

    /// Set properties.
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Whether the node carries `label` and belongs to `population`.
    pub fn matches(&self, label: &str, population: Population) -> bool {
        let is_entity = self.has_label(ENTITY_LABEL);
        self.has_label(label)
            && match population {
                Population::Entity => is_entity,
                Population::Domain => !is_entity,
            }
    }

    pub fn id(&self) -> NodeId {
        NodeId::from(self.db_id)
    }

    pub fn to_graph_node(&self) -> GraphNode {
        GraphNode {
            id: self.id(),
            labels: self.labels.clone(),
            properties: self.properties.clone(),
        }
    }

    pub fn to_ref(&self) -> NodeRef {
        NodeRef {
            id: self.id(),
            labels: self.labels.clone(),
        }
    }
}

/// Edge data in the property graph.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEdge {
    /// Database ID (from SQLite).
    pub db_id: i64,
    pub relationship_type: String,
    pub properties: Properties,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StoredEdge {
    /// Create a new edge created now.
    pub fn new(db_id: i64, relationship_type: impl Into<String>) -> Self {
        Self {
            db_id,
            relationship_type: relationship_type.into(),
            properties: Properties::new(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Set properties.
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Set timestamps.
    pub fn with_timestamps(
        mut self,
        created_at: DateTime<Utc>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self
    }

    fn text(&self, key: &str) -> String {
        self.properties
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }
}

/// The petgraph graph type.
pub type NodeGraph = DiGraph<StoredNode, StoredEdge>;

/// Index for O(1) lookups by database ID.
pub type DbIdIndex = HashMap<i64, NodeIndex>;

/// Property graph with a database ID index.
#[derive(Debug, Default)]
pub struct PropertyGraph {
    graph: NodeGraph,
    db_id_index: DbIdIndex,
}

impl PropertyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all nodes and edges.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.db_id_index.clear();
    }

    /// Add a node, returning its index.
    pub fn add_node(&mut self, node: StoredNode) -> NodeIndex {
        let db_id = node.db_id;
        let idx = self.graph.add_node(node);
        self.db_id_index.insert(db_id, idx);
        idx
    }

    /// Add an edge between two nodes by database ID.
    ///
    /// Returns false if either endpoint is unknown.
    pub fn add_edge(&mut self, source_db_id: i64, target_db_id: i64, edge: StoredEdge) -> bool {
        match (
            self.find_by_db_id(source_db_id),
            self.find_by_db_id(target_db_id),
        ) {
            (Some(source), Some(target)) => {
                self.graph.add_edge(source, target, edge);
                true
            }
            _ => false,
        }
    }

    /// Insert `edge`, or refresh `updated_at` on the existing edge with the
    /// same endpoints and type.
    pub fn merge_edge(&mut self, source_db_id: i64, target_db_id: i64, edge: StoredEdge) -> bool {
        if let Some(idx) = self.find_edge(source_db_id, target_db_id, &edge.relationship_type) {
            if let Some(weight) = self.graph.edge_weight_mut(idx) {
                weight.updated_at = edge.updated_at;
            }
            return true;
        }
        self.add_edge(source_db_id, target_db_id, edge)
    }

    pub fn find_by_db_id(&self, db_id: i64) -> Option<NodeIndex> {
        self.db_id_index.get(&db_id).copied()
    }

    pub fn node(&self, db_id: i64) -> Option<&StoredNode> {
        self.find_by_db_id(db_id)
            .and_then(|idx| self.graph.node_weight(idx))
    }

    /// The edge of `relationship_type` from `source` to `target`, if any.
    pub fn find_edge(
        &self,
        source_db_id: i64,
        target_db_id: i64,
        relationship_type: &str,
    ) -> Option<EdgeIndex> {
        let source = self.find_by_db_id(source_db_id)?;
        let target = self.find_by_db_id(target_db_id)?;
        self.graph
            .edges_connecting(source, target)
            .find(|e| e.weight().relationship_type == relationship_type)
            .map(|e| e.id())
    }

    pub fn edge(&self, idx: EdgeIndex) -> Option<&StoredEdge> {
        self.graph.edge_weight(idx)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Number of edges of `relationship_type`.
    pub fn edge_count_of(&self, relationship_type: &str) -> usize {
        self.typed_edges(relationship_type).count()
    }

    /// Labels of entity nodes, deduplicated in first-seen order.
    pub fn entity_labels(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.graph
            .node_weights()
            .filter(|n| n.has_label(ENTITY_LABEL))
            .flat_map(|n| n.labels.iter())
            .filter(|l| seen.insert(*l))
            .cloned()
            .collect()
    }

    /// Distinct property keys of `label` nodes in `population`, first-seen order.
    pub fn property_keys(&self, label: &str, population: Population) -> Vec<String> {
        let mut seen = HashSet::new();
        self.graph
            .node_weights()
            .filter(|n| n.matches(label, population))
            .flat_map(|n| n.properties.keys())
            .filter(|k| seen.insert(*k))
            .cloned()
            .collect()
    }

    pub fn nodes(&self, label: &str, population: Population) -> Vec<GraphNode> {
        self.graph
            .node_weights()
            .filter(|n| n.matches(label, population))
            .map(StoredNode::to_graph_node)
            .collect()
    }

    /// Every edge of `relationship_type` with its endpoints.
    pub fn correspondences(&self, relationship_type: &str) -> Vec<CorrespondenceRecord> {
        self.typed_edges(relationship_type)
            .map(|e| {
                let edge = e.weight();
                CorrespondenceRecord {
                    entity: self.graph[e.source()].to_ref(),
                    domain: self.graph[e.target()].to_ref(),
                    similarity: edge
                        .properties
                        .get("similarity")
                        .and_then(|v| v.as_f64())
                        .unwrap_or_default(),
                    entity_key: edge.text("entity_key"),
                    domain_key: edge.text("domain_key"),
                    created_at: edge.created_at,
                    updated_at: edge.updated_at,
                }
            })
            .collect()
    }

    /// Entity nodes with no outgoing edge of `relationship_type`.
    pub fn unmatched_entities(&self, relationship_type: &str) -> Vec<NodeRef> {
        self.graph
            .node_indices()
            .filter(|&idx| self.graph[idx].has_label(ENTITY_LABEL))
            .filter(|&idx| {
                !self
                    .graph
                    .edges_directed(idx, Direction::Outgoing)
                    .any(|e| e.weight().relationship_type == relationship_type)
            })
            .map(|idx| self.graph[idx].to_ref())
            .collect()
    }

    /// Database IDs of `relationship_type` edges, optionally only those whose
    /// source node carries `label`.
    pub fn edge_db_ids(&self, relationship_type: &str, label: Option<&str>) -> Vec<i64> {
        self.typed_edges(relationship_type)
            .filter(|e| label.map_or(true, |l| self.graph[e.source()].has_label(l)))
            .map(|e| e.weight().db_id)
            .collect()
    }

    /// Remove edges by database ID. Returns the number removed.
    pub fn remove_edges(&mut self, db_ids: &HashSet<i64>) -> usize {
        let before = self.graph.edge_count();
        self.graph
            .retain_edges(|g, e| g.edge_weight(e).map_or(true, |w| !db_ids.contains(&w.db_id)));
        before - self.graph.edge_count()
    }

    /// Structural counts over the whole graph.
    ///
    /// Nodes are counted once under each of their labels.
    pub fn summary(&self) -> GraphSummary {
        let total_nodes = self.graph.node_count() as u64;
        let connected_nodes = self
            .graph
            .node_indices()
            .filter(|&idx| self.graph.neighbors_undirected(idx).next().is_some())
            .count() as u64;

        let mut relationships: HashMap<&str, u64> = HashMap::new();
        for edge in self.graph.edge_weights() {
            *relationships.entry(edge.relationship_type.as_str()).or_default() += 1;
        }

        let mut labels: HashMap<&str, u64> = HashMap::new();
        for node in self.graph.node_weights() {
            for label in &node.labels {
                *labels.entry(label.as_str()).or_default() += 1;
            }
        }

        GraphSummary {
            total_nodes,
            orphan_nodes: total_nodes - connected_nodes,
            connected_nodes,
            relationship_counts: sorted_counts(relationships),
            nodes_by_label: sorted_counts(labels),
        }
    }

    fn typed_edges<'a>(
        &'a self,
        relationship_type: &'a str,
    ) -> impl Iterator<Item = petgraph::graph::EdgeReference<'a, StoredEdge>> + 'a {
        self.graph
            .edge_references()
            .filter(move |e| e.weight().relationship_type == relationship_type)
    }
}

fn sorted_counts(counts: HashMap<&str, u64>) -> Vec<(String, u64)> {
    let mut counts: Vec<(String, u64)> = counts
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}
