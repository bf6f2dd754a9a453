//! Graph node types.
//!
//! Nodes are schemaless: a node carries any number of labels and an open map
//! of property name to scalar JSON value. Property keys are discovered at
//! runtime per label, never enumerated statically.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Property map of a node.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Opaque node identity assigned by the graph store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Create a node id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for NodeId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Which of the two node populations a query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Population {
    /// Nodes produced by unstructured extraction, tagged with the entity label.
    Entity,
    /// Nodes produced by structured ingestion, not tagged with the entity label.
    Domain,
}

/// A graph vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Store-assigned identity.
    pub id: NodeId,
    /// Type tags.
    pub labels: Vec<String>,
    /// Scalar properties.
    #[serde(default)]
    pub properties: Properties,
}

impl GraphNode {
    /// Create a node with no properties.
    pub fn new(id: impl Into<NodeId>, labels: Vec<String>) -> Self {
        Self {
            id: id.into(),
            labels,
            properties: Properties::new(),
        }
    }

    /// Set a property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Whether the node carries `label`.
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Text form of a property for string comparison.
    ///
    /// Mirrors `toString` in the graph query language: strings as-is,
    /// numbers and booleans through their display form. Missing, null and
    /// non-scalar values have no text form and therefore never match.
    pub fn property_text(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Reference form of this node.
    pub fn to_ref(&self) -> NodeRef {
        NodeRef {
            id: self.id.clone(),
            labels: self.labels.clone(),
        }
    }
}

/// Identity and labels of a node, without its properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    pub id: NodeId,
    pub labels: Vec<String>,
}

impl NodeRef {
    /// Labels that are not system labels.
    pub fn domain_labels<'a>(&'a self, system_prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.labels
            .iter()
            .map(String::as_str)
            .filter(move |l| !l.starts_with(system_prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_text_scalars() {
        let node = GraphNode::new("1", vec!["Product".into()])
            .with_property("name", "Uppsala Sofa")
            .with_property("price", 499)
            .with_property("active", true)
            .with_property("missing", serde_json::Value::Null)
            .with_property("tags", serde_json::json!(["a", "b"]));

        assert_eq!(node.property_text("name").as_deref(), Some("Uppsala Sofa"));
        assert_eq!(node.property_text("price").as_deref(), Some("499"));
        assert_eq!(node.property_text("active").as_deref(), Some("true"));
        assert_eq!(node.property_text("missing"), None);
        assert_eq!(node.property_text("tags"), None);
        assert_eq!(node.property_text("absent"), None);
    }

    #[test]
    fn test_domain_labels_skip_system_prefix() {
        let node = NodeRef {
            id: NodeId::from(7),
            labels: vec!["__Entity__".into(), "Product".into()],
        };
        let labels: Vec<_> = node.domain_labels("__").collect();
        assert_eq!(labels, vec!["Product"]);
    }
}
