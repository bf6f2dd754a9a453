//! Configuration system for graphlink.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GraphLinkError, GraphLinkResult};
use crate::resolution::{BlockingStrategy, ResolutionConfig, SimilarityMetric};
use crate::traits::{GraphStoreConfig, GraphStoreProvider};

/// Top-level configuration: where the graph lives and how to resolve it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphLinkConfig {
    /// Graph store connection.
    pub graph_store: GraphStoreConfig,
    /// Entity resolution settings.
    pub resolution: ResolutionConfig,
}

impl GraphLinkConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<Path>) -> GraphLinkResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        let config: Self = match ext {
            Some("toml") => toml::from_str(&content)
                .map_err(|e| GraphLinkError::Configuration(e.to_string()))?,
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| GraphLinkError::Configuration(e.to_string()))?,
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| GraphLinkError::Configuration(e.to_string()))?,
            _ => {
                return Err(GraphLinkError::Configuration(
                    "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
                ))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    ///
    /// `GRAPHLINK_*` variables override the defaults. The `NEO4J_*`
    /// variables are honoured as well and select the Neo4j provider when
    /// no provider is given explicitly.
    pub fn from_env() -> GraphLinkResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> GraphLinkResult<Self> {
        let mut config = Self::default();

        // Graph store
        if let Some(uri) = var("NEO4J_URI") {
            config.graph_store.provider = GraphStoreProvider::Neo4j;
            config.graph_store.url = uri;
        }
        if let Some(user) = var("NEO4J_USERNAME") {
            config.graph_store.username = Some(user);
        }
        if let Some(password) = var("NEO4J_PASSWORD") {
            config.graph_store.password = Some(password);
        }
        if let Some(database) = var("NEO4J_DATABASE") {
            config.graph_store.database = Some(database);
        }

        if let Some(provider) = var("GRAPHLINK_GRAPH_PROVIDER") {
            config.graph_store.provider = match provider.to_lowercase().as_str() {
                "embedded" => GraphStoreProvider::Embedded,
                "neo4j" => GraphStoreProvider::Neo4j,
                "memgraph" => GraphStoreProvider::Memgraph,
                _ => return Err(GraphLinkError::UnsupportedProvider { provider }),
            };
        }
        if let Some(url) = var("GRAPHLINK_GRAPH_URL") {
            config.graph_store.url = url;
        }
        if let Some(user) = var("GRAPHLINK_GRAPH_USERNAME") {
            config.graph_store.username = Some(user);
        }
        if let Some(password) = var("GRAPHLINK_GRAPH_PASSWORD") {
            config.graph_store.password = Some(password);
        }
        if let Some(database) = var("GRAPHLINK_GRAPH_DATABASE") {
            config.graph_store.database = Some(database);
        }

        // Resolution
        let resolution = &mut config.resolution;
        if let Some(v) = var("GRAPHLINK_SIMILARITY_THRESHOLD") {
            resolution.similarity_threshold = parse_var("GRAPHLINK_SIMILARITY_THRESHOLD", &v)?;
        }
        if let Some(v) = var("GRAPHLINK_KEY_CORRELATION_THRESHOLD") {
            resolution.key_correlation_threshold =
                parse_var("GRAPHLINK_KEY_CORRELATION_THRESHOLD", &v)?;
        }
        if let Some(v) = var("GRAPHLINK_METRIC") {
            resolution.metric = parse_var::<SimilarityMetric>("GRAPHLINK_METRIC", &v)?;
        }
        if let Some(v) = var("GRAPHLINK_BLOCKING") {
            resolution.blocking = parse_var::<BlockingStrategy>("GRAPHLINK_BLOCKING", &v)?;
        }
        if let Some(v) = var("GRAPHLINK_ENTITY_TYPES") {
            let types: Vec<String> = v
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect();
            resolution.entity_types = (!types.is_empty()).then_some(types);
        }
        if let Some(v) = var("GRAPHLINK_CLEAN_REBUILD") {
            resolution.clean_rebuild = parse_var("GRAPHLINK_CLEAN_REBUILD", &v)?;
        }
        if let Some(v) = var("GRAPHLINK_MAX_CONCURRENT_LABELS") {
            resolution.max_concurrent_labels = parse_var("GRAPHLINK_MAX_CONCURRENT_LABELS", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> GraphLinkResult<()> {
        if self.graph_store.url.trim().is_empty() {
            return Err(GraphLinkError::Configuration(
                "graph_store.url must not be empty".to_string(),
            ));
        }
        self.resolution.validate()
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> GraphLinkConfigBuilder {
        GraphLinkConfigBuilder::default()
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> GraphLinkResult<T> {
    value.trim().parse().map_err(|_| {
        GraphLinkError::Configuration(format!("Invalid value for {}: {:?}", name, value))
    })
}

/// Builder for GraphLinkConfig.
#[derive(Default)]
pub struct GraphLinkConfigBuilder {
    config: GraphLinkConfig,
}

impl GraphLinkConfigBuilder {
    /// Set graph store configuration.
    pub fn graph_store(mut self, config: GraphStoreConfig) -> Self {
        self.config.graph_store = config;
        self
    }

    /// Set resolution configuration.
    pub fn resolution(mut self, config: ResolutionConfig) -> Self {
        self.config.resolution = config;
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> GraphLinkResult<GraphLinkConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_is_embedded() {
        let config = GraphLinkConfig::default();
        assert_eq!(config.graph_store.provider, GraphStoreProvider::Embedded);
        assert!(config.graph_store.url.ends_with("graph.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[graph_store]
provider = "neo4j"
url = "bolt://localhost:7687"
username = "neo4j"

[resolution]
similarity_threshold = 0.9
metric = "jaro_winkler"
entity_types = ["Product", "Supplier"]
"#
        )
        .unwrap();

        let config = GraphLinkConfig::from_file(file.path()).unwrap();
        assert_eq!(config.graph_store.provider, GraphStoreProvider::Neo4j);
        assert_eq!(config.graph_store.username.as_deref(), Some("neo4j"));
        assert_eq!(config.resolution.similarity_threshold, 0.9);
        assert_eq!(config.resolution.metric, SimilarityMetric::JaroWinkler);
        assert!(config.resolution.includes_label("Supplier"));
        assert!(!config.resolution.includes_label("Issue"));
        assert_eq!(config.resolution.key_correlation_threshold, 0.8);
    }

    #[test]
    fn test_from_yaml_and_json_files() {
        let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(yaml, "resolution:\n  blocking: first_token\n  clean_rebuild: true").unwrap();
        let config = GraphLinkConfig::from_file(yaml.path()).unwrap();
        assert_eq!(config.resolution.blocking, BlockingStrategy::FirstToken);
        assert!(config.resolution.clean_rebuild);

        let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(json, r#"{{"resolution": {{"validation_limit": 3}}}}"#).unwrap();
        let config = GraphLinkConfig::from_file(json.path()).unwrap();
        assert_eq!(config.resolution.validation_limit, 3);
    }

    #[test]
    fn test_invalid_file_values_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[resolution]\nsimilarity_threshold = 3.0").unwrap();
        assert!(GraphLinkConfig::from_file(file.path()).is_err());

        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(matches!(
            GraphLinkConfig::from_file(file.path()),
            Err(GraphLinkError::Configuration(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let config = GraphLinkConfig::from_lookup(lookup(&[
            ("NEO4J_URI", "bolt://graph:7687"),
            ("NEO4J_PASSWORD", "secret"),
            ("GRAPHLINK_SIMILARITY_THRESHOLD", "0.85"),
            ("GRAPHLINK_METRIC", "jaro"),
            ("GRAPHLINK_ENTITY_TYPES", "Product, Part,"),
            ("GRAPHLINK_MAX_CONCURRENT_LABELS", "4"),
        ]))
        .unwrap();

        assert_eq!(config.graph_store.provider, GraphStoreProvider::Neo4j);
        assert_eq!(config.graph_store.url, "bolt://graph:7687");
        assert_eq!(config.graph_store.password.as_deref(), Some("secret"));
        assert_eq!(config.resolution.similarity_threshold, 0.85);
        assert_eq!(config.resolution.metric, SimilarityMetric::Jaro);
        assert_eq!(
            config.resolution.entity_types,
            Some(vec!["Product".to_string(), "Part".to_string()])
        );
        assert_eq!(config.resolution.max_concurrent_labels, 4);
    }

    #[test]
    fn test_env_explicit_provider_wins() {
        let config = GraphLinkConfig::from_lookup(lookup(&[
            ("NEO4J_URI", "bolt://graph:7687"),
            ("GRAPHLINK_GRAPH_PROVIDER", "Memgraph"),
        ]))
        .unwrap();
        assert_eq!(config.graph_store.provider, GraphStoreProvider::Memgraph);
    }

    #[test]
    fn test_env_bad_values_rejected() {
        assert!(GraphLinkConfig::from_lookup(lookup(&[(
            "GRAPHLINK_SIMILARITY_THRESHOLD",
            "high"
        )]))
        .is_err());
        assert!(matches!(
            GraphLinkConfig::from_lookup(lookup(&[("GRAPHLINK_GRAPH_PROVIDER", "janus")])),
            Err(GraphLinkError::UnsupportedProvider { .. })
        ));
    }

    #[test]
    fn test_builder_validates() {
        let config = GraphLinkConfig::builder()
            .resolution(ResolutionConfig::new().with_similarity_threshold(0.95))
            .build()
            .unwrap();
        assert_eq!(config.resolution.similarity_threshold, 0.95);

        assert!(GraphLinkConfig::builder()
            .resolution(ResolutionConfig::new().with_key_correlation_threshold(-0.1))
            .build()
            .is_err());
    }
}
