//! Error types for `stagegate`.
//!
//! One aggregate error per process boundary, domain-specific enums below
//! it, and a stable exit-code mapping for the CLI.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `stagegate` CLI operations.
///
/// These codes follow Unix conventions and stay stable across releases so
/// operators can script against them.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// State store error (load failure, persistence failure)
    pub const STATE_ERROR: i32 = 5;

    /// Collaborator error (metrics provider, ranker, recommender, notifier)
    pub const COLLABORATOR_ERROR: i32 = 6;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `stagegate` operations.
///
/// Aggregates all domain-specific errors and provides a unified interface
/// for error handling and exit-code mapping.
#[derive(Debug, Error)]
pub enum StagegateError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// State store error
    #[error(transparent)]
    State(#[from] StateError),

    /// Collaborator call error
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    /// Engine evaluation error
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl StagegateError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::State(_) => ExitCode::STATE_ERROR,
            Self::Collaborator(_) => ExitCode::COLLABORATOR_ERROR,
            Self::Engine(_) => ExitCode::ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Catalog loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the catalog file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Catalog validation failed
    #[error("validation failed for {path}")]
    ValidationError {
        /// Path to the catalog file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced catalog file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Environment variable referenced in configuration is not set
    #[error("environment variable '{var}' not set (referenced in {path})")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Catalog file where it was referenced
        path: PathBuf,
    },
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during catalog validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., `phases[2].success_criteria[0]`)
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Validation failure that prevents the catalog from being used
    Error,
    /// Potential issue that does not prevent loading
    Warning,
}

// ============================================================================
// State Store Errors
// ============================================================================

/// State store errors.
///
/// A persistence failure is fatal for the evaluation run that caused it:
/// the in-memory transition is discarded and the next cycle re-evaluates
/// from the last-known-good persisted state.
#[derive(Debug, Error)]
pub enum StateError {
    /// I/O error during load or persist
    #[error("state I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// State document did not deserialize
    #[error("corrupt state document at {path}: {message}")]
    Corrupt {
        /// Path to the state document
        path: PathBuf,
        /// Deserialization error message
        message: String,
    },

    /// Persisted phase id does not resolve against the catalog
    #[error("persisted phase '{phase}' not present in catalog")]
    UnknownPhase {
        /// The unresolvable phase id
        phase: String,
    },

    /// JSON serialization error
    #[error("state serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ============================================================================
// Collaborator Errors
// ============================================================================

/// Errors from external collaborator calls.
///
/// All collaborator failures are non-fatal to the engine: the run either
/// falls back to a deterministic policy or gives up for the cycle leaving
/// state untouched.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// Call did not complete within the configured timeout
    #[error("{role} call timed out after {timeout_ms}ms")]
    Timeout {
        /// Collaborator role (e.g. `"metrics"`, `"ranker"`)
        role: &'static str,
        /// Timeout in milliseconds
        timeout_ms: u64,
    },

    /// Transport-level failure (connection refused, HTTP 5xx)
    #[error("{role} call failed: {message}")]
    CallFailed {
        /// Collaborator role
        role: &'static str,
        /// Failure description
        message: String,
    },

    /// Response did not match the expected shape
    #[error("{role} returned an invalid response: {message}")]
    InvalidResponse {
        /// Collaborator role
        role: &'static str,
        /// What was wrong with the response
        message: String,
    },

    /// All retry attempts exhausted
    #[error("{role} call failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Collaborator role
        role: &'static str,
        /// Number of attempts made
        attempts: u32,
        /// Last error observed
        last: String,
    },
}

// ============================================================================
// Engine Errors
// ============================================================================

/// Phase progression engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Referenced phase does not exist in the catalog
    #[error("phase not found in catalog: {0}")]
    PhaseNotFound(String),

    /// Catalog has no phases to run against
    #[error("catalog contains no phases")]
    EmptyCatalog,

    /// An evaluation run was requested while one was already in flight
    #[error("evaluation already in progress")]
    RunInProgress,
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `stagegate` operations.
pub type Result<T> = std::result::Result<T, StagegateError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitCode::SUCCESS, 0);
        assert_eq!(ExitCode::ERROR, 1);
        assert_eq!(ExitCode::CONFIG_ERROR, 2);
        assert_eq!(ExitCode::IO_ERROR, 3);
        assert_eq!(ExitCode::STATE_ERROR, 5);
        assert_eq!(ExitCode::COLLABORATOR_ERROR, 6);
        assert_eq!(ExitCode::USAGE_ERROR, 64);
        assert_eq!(ExitCode::INTERRUPTED, 130);
        assert_eq!(ExitCode::TERMINATED, 143);
    }

    #[test]
    fn test_state_error_exit_code() {
        let err: StagegateError = StateError::UnknownPhase {
            phase: "launch".to_string(),
        }
        .into();
        assert_eq!(err.exit_code(), ExitCode::STATE_ERROR);
    }

    #[test]
    fn test_collaborator_error_exit_code() {
        let err: StagegateError = CollaboratorError::Timeout {
            role: "metrics",
            timeout_ms: 5000,
        }
        .into();
        assert_eq!(err.exit_code(), ExitCode::COLLABORATOR_ERROR);
    }

    #[test]
    fn test_config_error_exit_code() {
        let err: StagegateError = ConfigError::MissingFile {
            path: PathBuf::from("/test"),
        }
        .into();
        assert_eq!(err.exit_code(), ExitCode::CONFIG_ERROR);
    }

    #[test]
    fn test_io_error_exit_code() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let err: StagegateError = io_err.into();
        assert_eq!(err.exit_code(), ExitCode::IO_ERROR);
    }

    #[test]
    fn test_validation_issue_display() {
        let issue = ValidationIssue {
            path: "phases[0].success_criteria".to_string(),
            message: "duplicate metric".to_string(),
            severity: Severity::Error,
        };
        assert_eq!(
            issue.to_string(),
            "error: duplicate metric at phases[0].success_criteria"
        );
    }

    #[test]
    fn test_validation_issue_warning_display() {
        let issue = ValidationIssue {
            path: "phases".to_string(),
            message: "catalog is empty".to_string(),
            severity: Severity::Warning,
        };
        assert_eq!(issue.to_string(), "warning: catalog is empty at phases");
    }

    #[test]
    fn test_collaborator_error_display() {
        let err = CollaboratorError::InvalidResponse {
            role: "ranker",
            message: "entry not in pool".to_string(),
        };
        assert!(err.to_string().contains("ranker"));
        assert!(err.to_string().contains("entry not in pool"));
    }

    #[test]
    fn test_state_corrupt_display() {
        let err = StateError::Corrupt {
            path: PathBuf::from("state.json"),
            message: "unexpected EOF".to_string(),
        };
        assert!(err.to_string().contains("state.json"));
        assert!(err.to_string().contains("unexpected EOF"));
    }
}
