//! # Pipeline Error Handling
//!
//! Unified error handling for the pipeline core, providing structured error
//! information that preserves context across task boundaries.
//!
//! The taxonomy follows the failure model of the task graph:
//! - Configuration errors are fatal and surface before any I/O happens
//! - Schema errors surface at table read/write time
//! - I/O and CSV errors propagate from the underlying target streams
//!
//! The core performs no recovery or retry: a failed `run` never commits its
//! output target, so a later invocation re-attempts exactly the failed task.

use thiserror::Error;

/// Unified error type for all pipeline operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    // ========== Configuration Errors ==========
    /// A task was wired with an invalid dependency shape or option set
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Exactly one upstream table was expected but the dependency
    /// declaration resolved to a different number
    #[error("Expected exactly one upstream table, found {found}")]
    AmbiguousUpstream { found: usize },

    /// The dependency graph contains a cycle through the named task output
    #[error("Dependency cycle detected at {path}")]
    DependencyCycle { path: String },

    // ========== Schema Errors ==========
    /// A requested column name is absent from a table
    #[error("Column not found: {column} in table {table}")]
    ColumnNotFound { column: String, table: String },

    /// A table violated a structural expectation (empty header, missing
    /// row key, primary column dropped by a transform function)
    #[error("Schema error: {message}")]
    Schema { message: String },

    // ========== I/O Errors ==========
    /// Filesystem failure on a source or target path
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed table file content
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl PipelineError {
    /// Shorthand for a configuration error with a formatted message.
    pub fn config(message: impl Into<String>) -> Self {
        PipelineError::Config {
            message: message.into(),
        }
    }

    /// Shorthand for a schema error with a formatted message.
    pub fn schema(message: impl Into<String>) -> Self {
        PipelineError::Schema {
            message: message.into(),
        }
    }
}

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = PipelineError::config("need at least two tables to merge");
        assert_eq!(
            err.to_string(),
            "Configuration error: need at least two tables to merge"
        );
    }

    #[test]
    fn test_column_not_found_display() {
        let err = PipelineError::ColumnNotFound {
            column: "grade".to_string(),
            table: "students".to_string(),
        };
        assert_eq!(err.to_string(), "Column not found: grade in table students");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: PipelineError = io.into();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
