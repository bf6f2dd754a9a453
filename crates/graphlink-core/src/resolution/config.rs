//! Configuration for entity resolution.

use serde::{Deserialize, Serialize};

use crate::error::{GraphLinkError, GraphLinkResult};
use crate::traits::SYSTEM_LABEL_PREFIX;
use crate::types::CORRESPONDS_TO;

use super::builder::BlockingStrategy;
use super::similarity::SimilarityMetric;

/// Configuration for an [`EntityResolver`](super::EntityResolver).
///
/// Passed in at construction; there is no process-wide default state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Minimum value similarity for a correspondence edge.
    /// Range: 0.0-1.0. Default: 0.8
    pub similarity_threshold: f64,

    /// Minimum score for a substring key correlation.
    /// Range: 0.0-1.0. Default: 0.8
    pub key_correlation_threshold: f64,

    /// Metric used by the similarity join.
    pub metric: SimilarityMetric,

    /// Pre-filter applied before the pairwise comparison.
    pub blocking: BlockingStrategy,

    /// Labels with this prefix are system labels and never resolved.
    pub system_label_prefix: String,

    /// Relationship type of correspondence edges.
    pub relationship_type: String,

    /// Correspondences below this similarity are reported by validation.
    /// Default: 0.7
    pub quality_floor: f64,

    /// Maximum issues reported per validation check. Default: 10
    pub validation_limit: usize,

    /// Only resolve these labels, when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_types: Option<Vec<String>>,

    /// Delete all correspondence edges before resolving.
    pub clean_rebuild: bool,

    /// Labels resolved concurrently. 1 resolves them in sequence.
    pub max_concurrent_labels: usize,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
            key_correlation_threshold: 0.8,
            metric: SimilarityMetric::default(),
            blocking: BlockingStrategy::default(),
            system_label_prefix: SYSTEM_LABEL_PREFIX.to_string(),
            relationship_type: CORRESPONDS_TO.to_string(),
            quality_floor: 0.7,
            validation_limit: 10,
            entity_types: None,
            clean_rebuild: false,
            max_concurrent_labels: 1,
        }
    }
}

impl ResolutionConfig {
    /// Create a new ResolutionConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value similarity threshold.
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Set the key correlation threshold.
    pub fn with_key_correlation_threshold(mut self, threshold: f64) -> Self {
        self.key_correlation_threshold = threshold;
        self
    }

    /// Set the similarity metric.
    pub fn with_metric(mut self, metric: SimilarityMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Set the blocking strategy.
    pub fn with_blocking(mut self, blocking: BlockingStrategy) -> Self {
        self.blocking = blocking;
        self
    }

    /// Restrict resolution to the given labels.
    pub fn with_entity_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entity_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    /// Remove existing correspondences before every resolution pass.
    pub fn with_clean_rebuild(mut self, clean: bool) -> Self {
        self.clean_rebuild = clean;
        self
    }

    /// Resolve up to `n` labels concurrently.
    pub fn with_max_concurrent_labels(mut self, n: usize) -> Self {
        self.max_concurrent_labels = n;
        self
    }

    /// Whether `label` passes the entity type filter.
    pub fn includes_label(&self, label: &str) -> bool {
        self.entity_types
            .as_ref()
            .map_or(true, |types| types.iter().any(|t| t == label))
    }

    /// Validate configuration values are in valid ranges.
    pub fn validate(&self) -> GraphLinkResult<()> {
        for (field, value) in [
            ("similarity_threshold", self.similarity_threshold),
            ("key_correlation_threshold", self.key_correlation_threshold),
            ("quality_floor", self.quality_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(GraphLinkError::out_of_range(
                    field,
                    value,
                    "use a value between 0.0 and 1.0",
                ));
            }
        }
        if self.max_concurrent_labels == 0 {
            return Err(GraphLinkError::validation(
                "max_concurrent_labels must be at least 1",
            ));
        }
        if self.relationship_type.trim().is_empty() {
            return Err(GraphLinkError::validation("relationship_type must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ResolutionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.relationship_type, "CORRESPONDS_TO");
        assert_eq!(config.quality_floor, 0.7);
        assert_eq!(config.validation_limit, 10);
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let config = ResolutionConfig::new().with_similarity_threshold(1.2);
        assert!(config.validate().is_err());

        let config = ResolutionConfig::new().with_max_concurrent_labels(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_entity_type_filter() {
        let config = ResolutionConfig::new();
        assert!(config.includes_label("Issue"));

        let config = config.with_entity_types(["Product", "Supplier"]);
        assert!(config.includes_label("Product"));
        assert!(!config.includes_label("Issue"));
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: ResolutionConfig =
            serde_json::from_str(r#"{"similarity_threshold": 0.6, "metric": "jaro_winkler"}"#)
                .unwrap();
        assert_eq!(config.similarity_threshold, 0.6);
        assert_eq!(config.metric, SimilarityMetric::JaroWinkler);
        assert_eq!(config.key_correlation_threshold, 0.8);
    }
}
