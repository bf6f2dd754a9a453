//! Resolution orchestrator: discovery -> correlation -> correspondence
//! building for every entity label.
//!
//! The orchestrator is the error boundary of the engine. A failure on one
//! label is recorded as a [`LabelFailure`] and processing moves on to the
//! next label; store errors never abort the run.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::{GraphLinkError, GraphLinkResult};
use crate::traits::GraphStore;

use super::auditor::{ResolutionAuditor, ResolutionIssue, ResolutionStatistics};
use super::builder::CorrespondenceBuilder;
use super::config::ResolutionConfig;
use super::correlator::correlate;
use super::discovery::KeyDiscovery;
use super::quality::QualityReport;

/// Why a label could not be resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LabelFailure {
    /// One of the populations has no property keys.
    NoUsableKeys {
        label: String,
        entity_keys: usize,
        domain_keys: usize,
    },
    /// No key pair cleared the key correlation threshold.
    NoCorrelation { label: String },
    /// The graph store failed while working on the label.
    StoreQuery { label: String, message: String },
}

impl LabelFailure {
    /// Label the failure is scoped to (`*` for run-wide steps).
    pub fn label(&self) -> &str {
        match self {
            Self::NoUsableKeys { label, .. }
            | Self::NoCorrelation { label }
            | Self::StoreQuery { label, .. } => label,
        }
    }

    /// Soft failures describe the data, not a malfunction.
    pub fn is_soft(&self) -> bool {
        !matches!(self, Self::StoreQuery { .. })
    }

    fn store(label: &str, err: GraphLinkError) -> Self {
        Self::StoreQuery {
            label: label.to_string(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for LabelFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoUsableKeys {
                label,
                entity_keys,
                domain_keys,
            } => write!(
                f,
                "No keys found for {} (entity keys: {}, domain keys: {})",
                label, entity_keys, domain_keys
            ),
            Self::NoCorrelation { label } => write!(f, "No correlating keys found for {}", label),
            Self::StoreQuery { label, message } => {
                write!(f, "Failed to resolve {}: {}", label, message)
            }
        }
    }
}

/// Successful resolution of one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelResolution {
    pub label: String,
    pub entity_key: String,
    pub domain_key: String,
    pub correlation_score: f64,
    pub relationships_created: u64,
}

/// Overall outcome of a resolution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    /// Every label resolved.
    Success,
    /// Some labels resolved, some failed.
    Partial,
    /// Nothing resolved and at least one failure.
    Failed,
}

/// Result of [`EntityResolver::resolve_all`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub status: ResolutionStatus,
    /// Edges created or refreshed per label.
    pub entities_resolved: BTreeMap<String, u64>,
    pub total_relationships: u64,
    /// Key pair and score used per resolved label.
    pub labels: Vec<LabelResolution>,
    /// Edges removed by a clean rebuild, when one ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_correspondences: Option<u64>,
    pub errors: Vec<LabelFailure>,
}

impl ResolutionResult {
    fn from_parts(
        labels: Vec<LabelResolution>,
        errors: Vec<LabelFailure>,
        removed_correspondences: Option<u64>,
    ) -> Self {
        let entities_resolved: BTreeMap<String, u64> = labels
            .iter()
            .map(|l| (l.label.clone(), l.relationships_created))
            .collect();
        let total_relationships = labels.iter().map(|l| l.relationships_created).sum();

        let status = match (labels.is_empty(), errors.is_empty()) {
            (_, true) => ResolutionStatus::Success,
            (false, false) => ResolutionStatus::Partial,
            (true, false) => ResolutionStatus::Failed,
        };

        Self {
            status,
            entities_resolved,
            total_relationships,
            labels,
            removed_correspondences,
            errors,
        }
    }

    /// Human-readable error messages.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

/// Result of removing correspondence edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalResult {
    pub deleted_count: u64,
    /// The label the removal was scoped to, or `all`.
    pub label: String,
}

/// Drives entity resolution across every discovered label.
pub struct EntityResolver {
    store: Arc<dyn GraphStore>,
    config: ResolutionConfig,
    discovery: KeyDiscovery,
    builder: CorrespondenceBuilder,
    auditor: ResolutionAuditor,
    label_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl EntityResolver {
    /// Create a resolver over `store`.
    pub fn new(store: Arc<dyn GraphStore>, config: ResolutionConfig) -> GraphLinkResult<Self> {
        config.validate()?;

        let discovery = KeyDiscovery::new(store.clone(), config.system_label_prefix.clone());
        let builder = CorrespondenceBuilder::new(
            store.clone(),
            config.metric.metric(),
            config.blocking,
            config.relationship_type.clone(),
        );
        let auditor = ResolutionAuditor::new(store.clone(), &config);

        Ok(Self {
            store,
            config,
            discovery,
            builder,
            auditor,
            label_locks: Mutex::new(HashMap::new()),
        })
    }

    /// The resolver configuration.
    pub fn config(&self) -> &ResolutionConfig {
        &self.config
    }

    /// Key discovery over the same store.
    pub fn discovery(&self) -> &KeyDiscovery {
        &self.discovery
    }

    /// Auditor over the same store.
    pub fn auditor(&self) -> &ResolutionAuditor {
        &self.auditor
    }

    /// Resolve every label with the configured thresholds.
    pub async fn resolve_all_entities(&self) -> GraphLinkResult<ResolutionResult> {
        self.resolve_all(
            self.config.similarity_threshold,
            self.config.key_correlation_threshold,
        )
        .await
    }

    /// Resolve every discovered entity label.
    ///
    /// Only invalid thresholds produce an `Err`; everything that goes wrong
    /// against the store is collected in [`ResolutionResult::errors`].
    pub async fn resolve_all(
        &self,
        similarity_threshold: f64,
        key_correlation_threshold: f64,
    ) -> GraphLinkResult<ResolutionResult> {
        for (field, value) in [
            ("similarity_threshold", similarity_threshold),
            ("key_correlation_threshold", key_correlation_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(GraphLinkError::out_of_range(
                    field,
                    value,
                    "use a value between 0.0 and 1.0",
                ));
            }
        }

        info!(
            similarity_threshold,
            key_correlation_threshold, "starting entity resolution"
        );

        let mut errors = Vec::new();

        let removed = if self.config.clean_rebuild {
            match self.remove_existing_correspondences(None).await {
                Ok(removal) => Some(removal.deleted_count),
                Err(err) => {
                    errors.push(LabelFailure::store("*", err));
                    None
                }
            }
        } else {
            None
        };

        let labels = match self.discovery.list_entity_labels().await {
            Ok(labels) => labels,
            Err(err) => {
                warn!(error = %err, "failed to list entity labels");
                errors.push(LabelFailure::store("*", err));
                return Ok(ResolutionResult::from_parts(Vec::new(), errors, removed));
            }
        };

        let labels: Vec<String> = labels
            .into_iter()
            .filter(|l| self.config.includes_label(l))
            .collect();

        let outcomes: Vec<Result<LabelResolution, LabelFailure>> = stream::iter(labels)
            .map(|label| async move {
                self.resolve_label(&label, similarity_threshold, key_correlation_threshold)
                    .await
            })
            .buffered(self.config.max_concurrent_labels.max(1))
            .collect()
            .await;

        let mut resolved = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(resolution) => resolved.push(resolution),
                Err(failure) => errors.push(failure),
            }
        }

        let result = ResolutionResult::from_parts(resolved, errors, removed);
        info!(
            status = ?result.status,
            total_relationships = result.total_relationships,
            errors = result.errors.len(),
            "entity resolution finished"
        );
        Ok(result)
    }

    /// Resolve a single label.
    #[instrument(skip(self))]
    pub async fn resolve_label(
        &self,
        label: &str,
        similarity_threshold: f64,
        key_correlation_threshold: f64,
    ) -> Result<LabelResolution, LabelFailure> {
        let lock = self.label_lock(label);
        let _guard = lock.lock().await;

        let entity_keys = self
            .discovery
            .list_entity_keys(label)
            .await
            .map_err(|e| LabelFailure::store(label, e))?;
        let domain_keys = self
            .discovery
            .list_domain_keys(label)
            .await
            .map_err(|e| LabelFailure::store(label, e))?;

        if entity_keys.is_empty() || domain_keys.is_empty() {
            let failure = LabelFailure::NoUsableKeys {
                label: label.to_string(),
                entity_keys: entity_keys.len(),
                domain_keys: domain_keys.len(),
            };
            warn!("{}", failure);
            return Err(failure);
        }

        let correlated = correlate(label, &entity_keys, &domain_keys, key_correlation_threshold);
        let Some(best) = correlated.into_iter().next() else {
            let failure = LabelFailure::NoCorrelation {
                label: label.to_string(),
            };
            warn!("{}", failure);
            return Err(failure);
        };

        info!(
            entity_key = %best.entity_key,
            domain_key = %best.domain_key,
            score = best.score,
            "using key correlation"
        );

        let outcome = self
            .builder
            .build(label, &best.entity_key, &best.domain_key, similarity_threshold)
            .await
            .map_err(|e| {
                let failure = LabelFailure::store(label, e);
                warn!("{}", failure);
                failure
            })?;

        Ok(LabelResolution {
            label: label.to_string(),
            entity_key: best.entity_key,
            domain_key: best.domain_key,
            correlation_score: best.score,
            relationships_created: outcome.relationships_created,
        })
    }

    /// Delete correspondence edges, optionally only for one entity label.
    pub async fn remove_existing_correspondences(
        &self,
        label: Option<&str>,
    ) -> GraphLinkResult<RemovalResult> {
        let deleted_count = self
            .store
            .delete_correspondences(&self.config.relationship_type, label.map(str::to_string))
            .await?;
        let label = label.unwrap_or("all").to_string();
        info!(deleted_count, label = %label, "removed correspondences");
        Ok(RemovalResult {
            deleted_count,
            label,
        })
    }

    /// Per-label match statistics computed from the current graph.
    pub async fn get_resolution_statistics(&self) -> GraphLinkResult<ResolutionStatistics> {
        self.auditor.get_resolution_statistics().await
    }

    /// Advisory issues with the current correspondences.
    pub async fn validate_resolutions(&self) -> GraphLinkResult<Vec<ResolutionIssue>> {
        self.auditor.validate_resolutions().await
    }

    /// Whole-graph quality report.
    pub async fn assess_quality(&self) -> GraphLinkResult<QualityReport> {
        self.auditor.assess_quality().await
    }

    fn label_lock(&self, label: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .label_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Entries nobody holds or waits on are dropped.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(label.to_string()).or_default().clone()
    }
}
