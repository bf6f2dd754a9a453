//! Embedded graph store using petgraph + SQLite hybrid architecture.
//!
//! This module provides a graph store implementation that:
//! - Uses SQLite for persistent storage
//! - Uses petgraph DiGraph for in-memory pattern matching
//! - Writes through to SQLite first, then mirrors the change in petgraph
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          EmbeddedGraphStore             │
//! ├─────────────────────────────────────────┤
//! │  ┌─────────────┐    ┌────────────────┐  │
//! │  │   SQLite    │    │   petgraph     │  │
//! │  │ (persistent)│───►│  (in-memory)   │  │
//! │  │             │    │  DiGraph       │  │
//! │  └─────────────┘    └────────────────┘  │
//! └─────────────────────────────────────────┘
//! ```

pub mod petgraph_ops;
pub mod schema;
pub mod sync;

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::Connection;
use tracing::{debug, warn};

use graphlink_core::error::{ErrorCode, GraphLinkError, GraphLinkResult};
use graphlink_core::traits::{GraphStore, GraphStoreConfig};
use graphlink_core::types::{
    Correspondence, CorrespondenceRecord, GraphNode, GraphSummary, NodeId, NodeRef, Population,
    Properties,
};

use petgraph_ops::{PropertyGraph, StoredEdge, StoredNode};

/// Map a SQLite failure into a store error, keeping the source.
pub(crate) fn db_err(e: rusqlite::Error) -> GraphLinkError {
    GraphLinkError::database(ErrorCode::DbOperationFailed, e)
}

fn connect_err(e: rusqlite::Error) -> GraphLinkError {
    GraphLinkError::database(ErrorCode::DbConnectionFailed, e)
}

/// Embedded graph store using petgraph + SQLite.
///
/// Thread-safe via Mutex on the connection and graph. Locks are always taken
/// in that order.
pub struct EmbeddedGraphStore {
    /// SQLite connection (wrapped in Mutex for Send + Sync).
    conn: Mutex<Connection>,
    /// In-memory graph for pattern matching.
    graph: Mutex<PropertyGraph>,
}

impl EmbeddedGraphStore {
    /// Open (or create) a store at the given database path.
    pub fn new(db_path: impl AsRef<Path>) -> GraphLinkResult<Self> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path).map_err(connect_err)?;
        schema::init_schema(&conn)?;

        let mut graph = PropertyGraph::new();
        sync::load_graph(&conn, &mut graph)?;
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "loaded embedded graph"
        );

        Ok(Self {
            conn: Mutex::new(conn),
            graph: Mutex::new(graph),
        })
    }

    /// Create a new in-memory embedded graph store.
    pub fn in_memory() -> GraphLinkResult<Self> {
        let conn = Connection::open_in_memory().map_err(connect_err)?;
        schema::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            graph: Mutex::new(PropertyGraph::new()),
        })
    }

    /// Create from a GraphStoreConfig.
    pub async fn from_config(config: &GraphStoreConfig) -> GraphLinkResult<Self> {
        // URL is the database path for embedded store
        if config.url.is_empty() || config.url == ":memory:" {
            Self::in_memory()
        } else {
            Self::new(&config.url)
        }
    }

    /// Add a node with the given labels and properties.
    pub fn add_node(&self, labels: &[&str], properties: Properties) -> GraphLinkResult<NodeId> {
        let labels: Vec<String> = labels.iter().map(|l| l.to_string()).collect();

        let conn = self.lock_conn()?;
        let db_id = sync::insert_node(&conn, &labels, &properties)?;

        let mut graph = self.lock_graph()?;
        graph.add_node(StoredNode::new(db_id, labels).with_properties(properties));

        Ok(NodeId::from(db_id))
    }

    /// Merge a relationship of `relationship_type` between two nodes.
    pub fn add_relationship(
        &self,
        source: &NodeId,
        target: &NodeId,
        relationship_type: &str,
        properties: Properties,
    ) -> GraphLinkResult<()> {
        let (source_id, target_id) = (parse_id(source)?, parse_id(target)?);

        let conn = self.lock_conn()?;
        let mut graph = self.lock_graph()?;
        if graph.find_by_db_id(source_id).is_none() || graph.find_by_db_id(target_id).is_none() {
            return Err(GraphLinkError::validation(format!(
                "Unknown node in relationship {} -> {}",
                source, target
            )));
        }

        let saved = sync::upsert_relationship(
            &conn,
            source_id,
            target_id,
            relationship_type,
            &properties,
            Utc::now(),
        )?;
        graph.merge_edge(
            source_id,
            target_id,
            StoredEdge::new(saved.db_id, relationship_type)
                .with_properties(properties)
                .with_timestamps(saved.created_at, saved.updated_at),
        );
        Ok(())
    }

    /// Number of nodes in the store.
    pub fn node_count(&self) -> GraphLinkResult<usize> {
        Ok(self.lock_graph()?.node_count())
    }

    /// Number of relationships, optionally of one type only.
    pub fn relationship_count(&self, relationship_type: Option<&str>) -> GraphLinkResult<usize> {
        let graph = self.lock_graph()?;
        Ok(match relationship_type {
            Some(rel) => graph.edge_count_of(rel),
            None => graph.edge_count(),
        })
    }

    fn lock_conn(&self) -> GraphLinkResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| GraphLinkError::internal(e.to_string()))
    }

    fn lock_graph(&self) -> GraphLinkResult<MutexGuard<'_, PropertyGraph>> {
        self.graph
            .lock()
            .map_err(|e| GraphLinkError::internal(e.to_string()))
    }
}

fn parse_id(id: &NodeId) -> GraphLinkResult<i64> {
    id.as_str()
        .parse()
        .map_err(|_| GraphLinkError::validation(format!("Not an embedded node id: {}", id)))
}

fn correspondence_properties(edge: &Correspondence) -> Properties {
    let mut properties = Properties::new();
    properties.insert("similarity".into(), edge.similarity.into());
    properties.insert("entity_key".into(), edge.entity_key.clone().into());
    properties.insert("domain_key".into(), edge.domain_key.clone().into());
    properties
}

#[async_trait]
impl GraphStore for EmbeddedGraphStore {
    async fn entity_labels(&self) -> GraphLinkResult<Vec<String>> {
        Ok(self.lock_graph()?.entity_labels())
    }

    async fn property_keys(
        &self,
        label: &str,
        population: Population,
    ) -> GraphLinkResult<Vec<String>> {
        Ok(self.lock_graph()?.property_keys(label, population))
    }

    async fn nodes(&self, label: &str, population: Population) -> GraphLinkResult<Vec<GraphNode>> {
        Ok(self.lock_graph()?.nodes(label, population))
    }

    async fn upsert_correspondences(
        &self,
        relationship_type: &str,
        edges: &[Correspondence],
    ) -> GraphLinkResult<u64> {
        let now = Utc::now();
        let mut conn = self.lock_conn()?;
        let mut graph = self.lock_graph()?;

        let mut batch = Vec::with_capacity(edges.len());
        for edge in edges {
            let (source_id, target_id) = (parse_id(&edge.entity_id)?, parse_id(&edge.domain_id)?);
            if graph.find_by_db_id(source_id).is_none() || graph.find_by_db_id(target_id).is_none()
            {
                warn!(
                    entity = %edge.entity_id,
                    domain = %edge.domain_id,
                    "skipping correspondence with unknown endpoint"
                );
                continue;
            }
            batch.push((source_id, target_id, correspondence_properties(edge)));
        }

        // The whole batch becomes visible at once or not at all.
        let tx = conn.transaction().map_err(db_err)?;
        let mut saved = Vec::with_capacity(batch.len());
        for (source_id, target_id, properties) in batch {
            let row = sync::upsert_relationship(
                &tx,
                source_id,
                target_id,
                relationship_type,
                &properties,
                now,
            )?;
            saved.push((source_id, target_id, properties, row));
        }
        tx.commit().map_err(db_err)?;

        let created = saved.iter().filter(|(_, _, _, row)| row.created).count();
        let total = saved.len() as u64;
        for (source_id, target_id, properties, row) in saved {
            graph.merge_edge(
                source_id,
                target_id,
                StoredEdge::new(row.db_id, relationship_type)
                    .with_properties(properties)
                    .with_timestamps(row.created_at, row.updated_at),
            );
        }

        debug!(total, created, relationship_type, "upserted correspondences");
        Ok(total)
    }

    async fn delete_correspondences(
        &self,
        relationship_type: &str,
        label: Option<String>,
    ) -> GraphLinkResult<u64> {
        let mut conn = self.lock_conn()?;
        let mut graph = self.lock_graph()?;

        let ids = graph.edge_db_ids(relationship_type, label.as_deref());

        let tx = conn.transaction().map_err(db_err)?;
        let deleted = sync::delete_relationships(&tx, &ids)?;
        tx.commit().map_err(db_err)?;

        let ids: HashSet<i64> = ids.into_iter().collect();
        graph.remove_edges(&ids);

        Ok(deleted as u64)
    }

    async fn correspondences(
        &self,
        relationship_type: &str,
    ) -> GraphLinkResult<Vec<CorrespondenceRecord>> {
        Ok(self.lock_graph()?.correspondences(relationship_type))
    }

    async fn unmatched_entities(&self, relationship_type: &str) -> GraphLinkResult<Vec<NodeRef>> {
        Ok(self.lock_graph()?.unmatched_entities(relationship_type))
    }

    async fn graph_summary(&self) -> GraphLinkResult<GraphSummary> {
        Ok(self.lock_graph()?.summary())
    }
}
