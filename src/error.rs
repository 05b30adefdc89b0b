//! Error types for skel-queue
//!
//! The taxonomy mirrors how failures travel through a run:
//! - [`Error::Config`] is fatal and raised before any task executes
//! - [`Error::ExecutionSetup`] rejects an executor that could never make progress
//! - [`ComputeError`] is captured at the task boundary and written as an error record
//! - [`StoreError`] covers the artifact store; an unwritable error record escalates
//!   to the worker instead of being swallowed

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for skel-queue operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for skel-queue
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration value or input table column
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key or column that caused the error (e.g., "PARALLEL")
        key: Option<String>,
    },

    /// The executor was asked to run with an impossible setup (e.g. zero workers)
    #[error("execution setup error: {0}")]
    ExecutionSetup(String),

    /// Per-item computation or enrichment failed
    #[error("compute failure: {0}")]
    Compute(#[from] ComputeError),

    /// Artifact store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Remote data service failure outside of a task (template writing, timestamp pinning)
    #[error("service error: {0}")]
    Service(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Machine-readable error kind, used as a structured logging field
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config { .. } => "configuration_error",
            Error::ExecutionSetup(_) => "execution_setup_error",
            Error::Compute(_) => "compute_failure",
            Error::Store(StoreError::Unavailable { .. }) => "store_unavailable",
            Error::Store(_) => "store_error",
            Error::Service(_) => "service_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
        }
    }

    /// Process exit code reported by the CLI for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config { .. } => 2,
            Error::ExecutionSetup(_) => 3,
            Error::Store(_) => 4,
            Error::Service(_) => 5,
            Error::Compute(_) | Error::Io(_) | Error::Serialization(_) => 1,
        }
    }
}

/// Failures of the per-item computation pipeline
///
/// Every variant ends up as the message of an error record; none of them
/// propagate past the task boundary.
#[derive(Debug, Error)]
pub enum ComputeError {
    /// The remote data service rejected or failed a request
    #[error("remote service error: {0}")]
    Service(String),

    /// The remote service answered with a structure that cannot be used
    #[error("invalid structure for {root_id}: {reason}")]
    InvalidStructure {
        /// The root id whose structure was rejected
        root_id: u64,
        /// What was wrong with it
        reason: String,
    },

    /// Derived-property enrichment failed
    #[error("enrichment failed: {0}")]
    Enrichment(String),

    /// The computed skeleton could not be serialized
    #[error("artifact serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The compute step panicked; the payload message is preserved when it is a string
    #[error("compute panicked: {0}")]
    Panicked(String),
}

impl From<reqwest::Error> for ComputeError {
    fn from(e: reqwest::Error) -> Self {
        ComputeError::Service(e.to_string())
    }
}

/// Artifact store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store location cannot be reached for reading or writing
    #[error("store at {location} unavailable: {reason}")]
    Unavailable {
        /// The store location (URI)
        location: String,
        /// Underlying cause
        reason: String,
    },

    /// The location uses a scheme no backend understands
    #[error("unsupported store scheme '{scheme}' in {location}")]
    UnsupportedScheme {
        /// The scheme that was not recognized
        scheme: String,
        /// The full location
        location: String,
    },

    /// The location string could not be parsed as a URI or path
    #[error("invalid store location {location}: {reason}")]
    InvalidLocation {
        /// The offending location
        location: String,
        /// Why it was rejected
        reason: String,
    },

    /// A key would escape the store root
    #[error("invalid key {key}")]
    InvalidKey {
        /// The rejected key
        key: String,
    },

    /// I/O error while touching a file-backed store
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path being accessed
        path: PathBuf,
        /// The underlying I/O error
        source: std::io::Error,
    },
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_names_key() {
        let err = Error::config("PARALLEL", "must be a positive integer, got 'x'");
        match &err {
            Error::Config { key, message } => {
                assert_eq!(key.as_deref(), Some("PARALLEL"));
                assert!(message.contains("positive integer"));
            }
            other => panic!("expected Config, got {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "configuration error: must be a positive integer, got 'x'"
        );
    }

    #[test]
    fn store_unavailable_kind_is_distinct_from_other_store_errors() {
        let unavailable = Error::Store(StoreError::Unavailable {
            location: "file:///skels".into(),
            reason: "disk gone".into(),
        });
        let bad_key = Error::Store(StoreError::InvalidKey { key: "../x".into() });

        assert_eq!(unavailable.kind(), "store_unavailable");
        assert_eq!(bad_key.kind(), "store_error");
    }

    #[test]
    fn configuration_errors_exit_with_usage_code() {
        assert_eq!(Error::config("DATASTACK", "missing").exit_code(), 2);
        assert_eq!(Error::ExecutionSetup("zero".into()).exit_code(), 3);
    }

    #[test]
    fn compute_error_converts_into_top_level() {
        let err: Error = ComputeError::Enrichment("no volumes".into()).into();
        assert_eq!(err.kind(), "compute_failure");
        assert_eq!(
            err.to_string(),
            "compute failure: enrichment failed: no volumes"
        );
    }

    #[test]
    fn invalid_structure_message_includes_root_id() {
        let err = ComputeError::InvalidStructure {
            root_id: 864691135,
            reason: "no vertices".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid structure for 864691135: no vertices"
        );
    }
}
