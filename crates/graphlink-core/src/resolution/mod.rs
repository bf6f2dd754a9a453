//! Entity resolution engine.
//!
//! Links entity nodes (extracted from unstructured text) to domain nodes
//! (ingested from tabular sources) that share a label, by writing
//! correspondence edges with similarity and key provenance.

mod auditor;
mod builder;
mod config;
mod correlator;
mod discovery;
mod orchestrator;
mod quality;
mod similarity;

pub use auditor::{ResolutionAuditor, ResolutionIssue, ResolutionStatistics, TypeStats};
pub use builder::{similarity_join, BlockingStrategy, BuildOutcome, CorrespondenceBuilder};
pub use config::ResolutionConfig;
pub use correlator::{correlate, normalize_key, KeyPair};
pub use discovery::KeyDiscovery;
pub use orchestrator::{
    EntityResolver, LabelFailure, LabelResolution, RemovalResult, ResolutionResult,
    ResolutionStatus,
};
pub use quality::{penalties, quality_score, QualityPenalty, QualityReport};
pub use similarity::{Jaro, JaroWinkler, NormalizedLevenshtein, SimilarityMetric, StringSimilarity};
