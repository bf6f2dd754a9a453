//! graphlink-graph-stores - Graph store implementations for graphlink.
//!
//! # Supported Backends
//!
//! - **Embedded** (feature: `embedded`, default) - petgraph + SQLite
//! - **Neo4j** (feature: `neo4j`) - Neo4j over Bolt
//! - **Memgraph** (feature: `memgraph`) - Memgraph (Neo4j-compatible)

mod factory;

#[cfg(feature = "embedded")]
pub mod embedded;

#[cfg(any(feature = "neo4j", feature = "memgraph"))]
mod neo4j;

pub use factory::GraphStoreFactory;

#[cfg(feature = "embedded")]
pub use embedded::EmbeddedGraphStore;

#[cfg(any(feature = "neo4j", feature = "memgraph"))]
pub use neo4j::Neo4jGraphStore;

// Re-export core types
pub use graphlink_core::traits::{GraphStore, GraphStoreConfig, GraphStoreProvider};
