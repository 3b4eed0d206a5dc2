//! Error types for cutover operations.
//!
//! This module defines [`CutoverError`], the primary error type used
//! throughout the application, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Use `CutoverError` for domain-specific errors that need distinct handling
//! - Use `anyhow::Error` (via `CutoverError::Other`) for unexpected errors
//! - Parameter and environment errors must be raised before a job is
//!   constructed; once the engine is running, failures surface as task
//!   outcomes rather than errors wherever possible

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for cutover operations.
#[derive(Debug, Error)]
pub enum CutoverError {
    /// Failed to parse a configuration or state file.
    #[error("Failed to parse {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// A job parameter was missing or malformed.
    #[error("Invalid parameter '{name}': {message}")]
    InvalidParameter { name: String, message: String },

    /// An environment name does not exist in the registry.
    #[error("Unknown environment: {name}")]
    UnknownEnvironment { name: String },

    /// An environment that must not exist beforehand already does.
    #[error("Environment '{name}' already exists")]
    EnvironmentExists { name: String },

    /// A task's work could not be completed.
    #[error("Task '{task}' failed: {message}")]
    TaskFailed { task: String, message: String },

    /// A provider response named a different resource than the one requested.
    /// Indicates a provider/client mismatch, never retried.
    #[error("Requested {resource} '{requested}' but provider replied with '{reported}'")]
    ProviderMismatch {
        resource: String,
        requested: String,
        reported: String,
    },

    /// A provider gateway call failed at the transport or protocol level.
    #[error("Provider request '{operation}' failed: {message}")]
    ProviderRequest { operation: String, message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for cutover operations.
pub type Result<T> = std::result::Result<T, CutoverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_parse_error_displays_path_and_message() {
        let err = CutoverError::ConfigParseError {
            path: PathBuf::from("/config.yml"),
            message: "invalid syntax".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/config.yml"));
        assert!(msg.contains("invalid syntax"));
    }

    #[test]
    fn invalid_parameter_displays_name_and_message() {
        let err = CutoverError::InvalidParameter {
            name: "db-map".into(),
            message: "expects an even number of values".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("db-map"));
        assert!(msg.contains("even number"));
    }

    #[test]
    fn unknown_environment_displays_name() {
        let err = CutoverError::UnknownEnvironment {
            name: "prod-blue".into(),
        };
        assert!(err.to_string().contains("prod-blue"));
    }

    #[test]
    fn task_failed_displays_task_and_message() {
        let err = CutoverError::TaskFailed {
            task: "snapshot-live-db".into(),
            message: "snapshot never became available".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("snapshot-live-db"));
        assert!(msg.contains("never became available"));
    }

    #[test]
    fn provider_mismatch_displays_both_identifiers() {
        let err = CutoverError::ProviderMismatch {
            resource: "snapshot".into(),
            requested: "live1-app-stage".into(),
            reported: "other-snap".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("live1-app-stage"));
        assert!(msg.contains("other-snap"));
    }

    #[test]
    fn provider_request_displays_operation() {
        let err = CutoverError::ProviderRequest {
            operation: "describe-snapshot".into(),
            message: "connection refused".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("describe-snapshot"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn io_error_converts_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: CutoverError = io_err.into();
        assert!(matches!(err, CutoverError::Io(_)));
    }

    #[test]
    fn result_type_alias_works() {
        fn returns_error() -> Result<()> {
            Err(CutoverError::UnknownEnvironment { name: "x".into() })
        }
        assert!(returns_error().is_err());
    }
}
