//! Correspondence edges between entity and domain nodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::node::{NodeId, NodeRef};

/// Default relationship type for correspondence edges.
pub const CORRESPONDS_TO: &str = "CORRESPONDS_TO";

/// A correspondence to upsert: entity node -> domain node.
///
/// Edge identity is the ordered pair `(entity_id, domain_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    pub entity_id: NodeId,
    pub domain_id: NodeId,
    /// Similarity of the matched property values, in [0, 1].
    pub similarity: f64,
    /// Entity-side property key that produced the match.
    pub entity_key: String,
    /// Domain-side property key that produced the match.
    pub domain_key: String,
}

/// A correspondence edge as persisted in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrespondenceRecord {
    pub entity: NodeRef,
    pub domain: NodeRef,
    pub similarity: f64,
    pub entity_key: String,
    pub domain_key: String,
    pub created_at: DateTime<Utc>,
    /// Set when the edge was refreshed by a later resolution pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}
