//! Graph store trait and related types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GraphLinkResult;
use crate::types::{
    Correspondence, CorrespondenceRecord, GraphNode, GraphSummary, NodeRef, Population,
};

/// Reserved label marking nodes produced by unstructured extraction.
pub const ENTITY_LABEL: &str = "__Entity__";

/// Prefix shared by all system labels.
pub const SYSTEM_LABEL_PREFIX: &str = "__";

/// Adapter over a property graph.
///
/// Every call is a single pattern-matching query against the store. The
/// resolution engine owns no other I/O; all persisted state lives in the
/// correspondence edges written through [`GraphStore::upsert_correspondences`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Raw labels present on entity nodes, deduplicated, in first-seen order.
    async fn entity_labels(&self) -> GraphLinkResult<Vec<String>>;

    /// Distinct property keys on nodes of `label` in `population`, in
    /// first-seen order.
    async fn property_keys(
        &self,
        label: &str,
        population: Population,
    ) -> GraphLinkResult<Vec<String>>;

    /// All nodes of `label` in `population`.
    async fn nodes(&self, label: &str, population: Population) -> GraphLinkResult<Vec<GraphNode>>;

    /// Merge a batch of correspondence edges of `relationship_type`.
    ///
    /// New edges get `created_at` and the match provenance; edges that already
    /// exist for the same `(entity, domain)` pair only get `updated_at`
    /// refreshed. The batch is applied atomically. Returns the number of edges
    /// created or refreshed.
    async fn upsert_correspondences(
        &self,
        relationship_type: &str,
        edges: &[Correspondence],
    ) -> GraphLinkResult<u64>;

    /// Delete correspondence edges, optionally only those whose entity
    /// endpoint carries `label`. Returns the deleted count.
    async fn delete_correspondences(
        &self,
        relationship_type: &str,
        label: Option<String>,
    ) -> GraphLinkResult<u64>;

    /// Every correspondence edge of `relationship_type` with its endpoints.
    async fn correspondences(
        &self,
        relationship_type: &str,
    ) -> GraphLinkResult<Vec<CorrespondenceRecord>>;

    /// Entity nodes with no outgoing edge of `relationship_type`.
    async fn unmatched_entities(&self, relationship_type: &str) -> GraphLinkResult<Vec<NodeRef>>;

    /// Structural counts over the whole graph.
    async fn graph_summary(&self) -> GraphLinkResult<GraphSummary>;
}

/// Graph store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStoreConfig {
    /// Provider type.
    pub provider: GraphStoreProvider,
    /// Connection URL, or database path for the embedded store.
    pub url: String,
    /// Username for authentication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Password for authentication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Database name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

impl Default for GraphStoreConfig {
    fn default() -> Self {
        let path = dirs::home_dir()
            .map(|h| h.join(".graphlink"))
            .unwrap_or_else(|| std::path::PathBuf::from(".graphlink"))
            .join("graph.db");

        Self {
            provider: GraphStoreProvider::Embedded,
            url: path.to_string_lossy().into_owned(),
            username: None,
            password: None,
            database: None,
        }
    }
}

/// Graph store provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GraphStoreProvider {
    #[default]
    Embedded,
    Neo4j,
    Memgraph,
}
