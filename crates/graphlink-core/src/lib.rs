//! graphlink-core - Core library for graphlink.
//!
//! This crate provides the core types, the graph store trait, and the entity
//! resolution engine that links extracted entity nodes to the domain nodes
//! they describe.
//!
//! # Example
//!
//! ```ignore
//! use graphlink_core::{EntityResolver, ResolutionConfig};
//!
//! let resolver = EntityResolver::new(store, ResolutionConfig::default())?;
//!
//! // Link entity nodes to domain nodes
//! let result = resolver.resolve_all(0.8, 0.8).await?;
//!
//! // Inspect what was linked
//! let stats = resolver.get_resolution_statistics().await?;
//! ```

pub mod config;
pub mod error;
pub mod resolution;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::GraphLinkConfig;
pub use error::{ErrorCode, GraphLinkError, GraphLinkResult};
pub use resolution::{
    EntityResolver, LabelFailure, QualityReport, RemovalResult, ResolutionConfig,
    ResolutionIssue, ResolutionResult, ResolutionStatistics, ResolutionStatus, SimilarityMetric,
};
pub use traits::{
    GraphStore, GraphStoreConfig, GraphStoreProvider, ENTITY_LABEL, SYSTEM_LABEL_PREFIX,
};
pub use types::{
    Correspondence, CorrespondenceRecord, GraphNode, GraphSummary, NodeId, NodeRef, Population,
    Properties, CORRESPONDS_TO,
};
