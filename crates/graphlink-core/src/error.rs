//! Error types for graphlink operations.
//!
//! Store failures, configuration problems and validation errors share one
//! error type with structured codes. Label-scoped resolution failures are
//! not errors at this level; see [`crate::resolution::LabelFailure`].

use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for graphlink operations.
pub type GraphLinkResult<T> = Result<T, GraphLinkError>;

/// Main error type for all graphlink operations.
#[derive(Error, Debug)]
pub enum GraphLinkError {
    /// The graph store reported a failure (connectivity, malformed query,
    /// constraint violation).
    #[error("Graph store error: {message}")]
    GraphStore {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Input validation failed.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        code: ErrorCode,
        details: HashMap<String, String>,
        suggestion: Option<String>,
    },

    /// Local database operation failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Provider not supported (or not compiled in).
    #[error("Provider not supported: {provider}")]
    UnsupportedProvider { provider: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Validation (VAL_xxx)
    ValInvalidInput,
    ValOutOfRange,

    // Graph (GRP_xxx)
    GrpConnectionFailed,
    GrpOperationFailed,
    GrpInvalidRow,

    // Database (DB_xxx)
    DbConnectionFailed,
    DbOperationFailed,

    // Configuration (CFG_xxx)
    CfgInvalid,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValOutOfRange => "VAL_002",
            ErrorCode::GrpConnectionFailed => "GRP_001",
            ErrorCode::GrpOperationFailed => "GRP_002",
            ErrorCode::GrpInvalidRow => "GRP_003",
            ErrorCode::DbConnectionFailed => "DB_001",
            ErrorCode::DbOperationFailed => "DB_002",
            ErrorCode::CfgInvalid => "CFG_001",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl GraphLinkError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            details: HashMap::new(),
            suggestion: None,
        }
    }

    /// Create a validation error for a value outside its permitted range.
    pub fn out_of_range(field: &str, value: f64, suggestion: impl Into<String>) -> Self {
        let mut details = HashMap::new();
        details.insert("field".to_string(), field.to_string());
        details.insert("value".to_string(), value.to_string());
        Self::Validation {
            message: format!("{} = {} is out of range", field, value),
            code: ErrorCode::ValOutOfRange,
            details,
            suggestion: Some(suggestion.into()),
        }
    }

    /// Create a graph store error.
    pub fn graph_store(message: impl Into<String>) -> Self {
        Self::GraphStore {
            message: message.into(),
            code: ErrorCode::GrpOperationFailed,
            source: None,
        }
    }

    /// Create a graph store connection error.
    pub fn graph_connection(message: impl Into<String>) -> Self {
        Self::GraphStore {
            message: message.into(),
            code: ErrorCode::GrpConnectionFailed,
            source: None,
        }
    }

    /// Create an error for a store row that could not be decoded.
    pub fn invalid_row(message: impl Into<String>) -> Self {
        Self::GraphStore {
            message: message.into(),
            code: ErrorCode::GrpInvalidRow,
            source: None,
        }
    }

    /// Wrap a database driver error under `code`.
    pub fn database(
        code: ErrorCode,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Database {
            message: source.to_string(),
            code,
            source: Some(Box::new(source)),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::GraphStore { code, .. } => *code,
            Self::Validation { code, .. } => *code,
            Self::Database { code, .. } => *code,
            Self::Configuration(_) => ErrorCode::CfgInvalid,
            _ => ErrorCode::Internal,
        }
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::GraphStore {
                code: ErrorCode::GrpConnectionFailed,
                ..
            } => Some("Please check the graph store URL and credentials"),
            Self::Validation { suggestion, .. } => suggestion.as_deref(),
            Self::UnsupportedProvider { .. } => {
                Some("Rebuild with the matching graph store feature enabled")
            }
            _ => None,
        }
    }

    /// Whether this error came from the graph store boundary.
    pub fn is_store_error(&self) -> bool {
        matches!(self, Self::GraphStore { .. } | Self::Database { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let err = GraphLinkError::validation("Invalid input");
        assert_eq!(err.code(), ErrorCode::ValInvalidInput);
        assert!(err.to_string().contains("Invalid input"));
    }

    #[test]
    fn test_out_of_range_carries_details() {
        let err = GraphLinkError::out_of_range("similarity_threshold", 1.5, "use a value in [0, 1]");
        assert_eq!(err.code(), ErrorCode::ValOutOfRange);
        assert_eq!(err.suggestion(), Some("use a value in [0, 1]"));
        match err {
            GraphLinkError::Validation { details, .. } => {
                assert_eq!(details["field"], "similarity_threshold");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_store_errors() {
        let err = GraphLinkError::graph_connection("refused");
        assert!(err.is_store_error());
        assert!(err.suggestion().is_some());
        assert!(!GraphLinkError::Configuration("x".into()).is_store_error());
    }

    #[test]
    fn test_database_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err = GraphLinkError::database(ErrorCode::DbConnectionFailed, io);
        assert_eq!(err.code(), ErrorCode::DbConnectionFailed);
        assert!(err.to_string().contains("read-only"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_error_code_as_str() {
        assert_eq!(ErrorCode::GrpOperationFailed.as_str(), "GRP_002");
        assert_eq!(ErrorCode::CfgInvalid.as_str(), "CFG_001");
    }
}
