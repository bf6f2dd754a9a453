//! Label and property-key discovery over the two node populations.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::GraphLinkResult;
use crate::traits::GraphStore;
use crate::types::Population;

/// Enumerates labels and key sets present in the graph.
///
/// Each call is independent, so a store failure for one label never affects
/// discovery for another.
#[derive(Clone)]
pub struct KeyDiscovery {
    store: Arc<dyn GraphStore>,
    system_label_prefix: String,
}

impl KeyDiscovery {
    /// Create a discovery helper over `store`.
    pub fn new(store: Arc<dyn GraphStore>, system_label_prefix: impl Into<String>) -> Self {
        Self {
            store,
            system_label_prefix: system_label_prefix.into(),
        }
    }

    /// Every label on entity nodes except system labels.
    pub async fn list_entity_labels(&self) -> GraphLinkResult<Vec<String>> {
        let labels = self.store.entity_labels().await?;
        Ok(dedup_in_order(
            labels
                .into_iter()
                .filter(|l| !l.starts_with(&self.system_label_prefix)),
        ))
    }

    /// Distinct property keys on entity nodes carrying `label`.
    pub async fn list_entity_keys(&self, label: &str) -> GraphLinkResult<Vec<String>> {
        let keys = self.store.property_keys(label, Population::Entity).await?;
        Ok(dedup_in_order(keys))
    }

    /// Distinct property keys on domain nodes carrying `label`.
    pub async fn list_domain_keys(&self, label: &str) -> GraphLinkResult<Vec<String>> {
        let keys = self.store.property_keys(label, Population::Domain).await?;
        Ok(dedup_in_order(keys))
    }
}

fn dedup_in_order(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
