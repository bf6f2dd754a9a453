//! Factory for creating graph store providers.

use std::sync::Arc;

use graphlink_core::error::{GraphLinkError, GraphLinkResult};
use graphlink_core::traits::{GraphStore, GraphStoreConfig, GraphStoreProvider};

/// Factory for creating graph store providers.
pub struct GraphStoreFactory;

impl GraphStoreFactory {
    /// Create the graph store named by `config.provider`.
    pub async fn create(config: GraphStoreConfig) -> GraphLinkResult<Arc<dyn GraphStore>> {
        match config.provider {
            #[cfg(feature = "embedded")]
            GraphStoreProvider::Embedded => {
                let store = crate::embedded::EmbeddedGraphStore::from_config(&config).await?;
                Ok(Arc::new(store))
            }

            #[cfg(feature = "neo4j")]
            GraphStoreProvider::Neo4j => {
                let store = crate::neo4j::Neo4jGraphStore::new(config).await?;
                Ok(Arc::new(store))
            }

            #[cfg(feature = "memgraph")]
            GraphStoreProvider::Memgraph => {
                let store = crate::neo4j::Neo4jGraphStore::new(config).await?;
                Ok(Arc::new(store))
            }

            #[allow(unreachable_patterns)]
            provider => Err(GraphLinkError::UnsupportedProvider {
                provider: format!("{:?}", provider),
            }),
        }
    }

    /// Create a Neo4j graph store.
    #[cfg(feature = "neo4j")]
    pub async fn neo4j(
        uri: &str,
        username: &str,
        password: &str,
    ) -> GraphLinkResult<Arc<dyn GraphStore>> {
        let config = GraphStoreConfig {
            provider: GraphStoreProvider::Neo4j,
            url: uri.to_string(),
            username: Some(username.to_string()),
            password: Some(password.to_string()),
            database: None,
        };
        Self::create(config).await
    }
}
