//! Error types and result aliases for Sprig operations.
//!
//! Provides a unified error type that covers the error conditions across
//! repositories, aggregation and dependency walking, with actionable hints.

use std::time::Duration;
use thiserror::Error;

use crate::types::VersionError;

/// Unified error type for all Sprig operations
#[derive(Error, Debug)]
pub enum SprigError {
    // Model errors
    #[error(transparent)]
    Version(#[from] VersionError),

    #[error("Invalid package id '{id}'")]
    InvalidPackageId { id: String },

    // Repository errors
    #[error("Package source '{repository}' failed: {message}")]
    Source {
        repository: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Package source '{repository}' did not respond within {timeout:?}")]
    SourceTimeout { repository: String, timeout: Duration },

    #[error("Operation '{operation}' was cancelled")]
    Cancelled { operation: String },

    #[error("Repository '{repository}' does not support {capability}")]
    UnsupportedCapability {
        repository: String,
        capability: String,
    },

    #[error("No repository can be created for source '{location}'")]
    UnsupportedSource { location: String },

    #[error("Invalid arguments: {message}")]
    ArgumentMismatch { message: String },

    #[error("Invalid package manifest {path}: {message}")]
    Manifest { path: String, message: String },

    // Resolution errors
    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    #[error("Unable to resolve dependency '{id}'{range}")]
    UnresolvedDependency { id: String, range: String },

    // Config errors
    #[error("Configuration field '{field}' is invalid: {reason}")]
    Config { field: String, reason: String },

    // IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for Sprig operations
pub type SprigResult<T> = Result<T, SprigError>;

impl SprigError {
    /// Create a source failure from any error type
    pub fn source_failure<E>(repository: impl Into<String>, message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Source {
            repository: repository.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a source failure with no underlying error
    pub fn source_message(repository: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            repository: repository.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create an IO error from std::io::Error
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    pub fn unsupported(repository: impl Into<String>, capability: impl Into<String>) -> Self {
        Self::UnsupportedCapability {
            repository: repository.into(),
            capability: capability.into(),
        }
    }

    /// Check if this error means a source became unusable
    ///
    /// Aggregates mark a source as failing only for these errors.
    pub fn is_source_failure(&self) -> bool {
        matches!(
            self,
            SprigError::Source { .. } | SprigError::SourceTimeout { .. } | SprigError::Io { .. }
        )
    }

    /// Get a user-friendly suggestion for fixing this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            SprigError::Source { .. } => {
                Some("Check that the package source is reachable, or disable it in sprig.toml")
            },
            SprigError::SourceTimeout { .. } => {
                Some("Increase [aggregate] source-timeout-ms or remove the slow source")
            },
            SprigError::UnsupportedSource { .. } => {
                Some("Use a local directory path; remote sources need a custom repository factory")
            },
            SprigError::CircularDependency { .. } => {
                Some("Remove circular dependencies by restructuring your packages")
            },
            SprigError::UnresolvedDependency { .. } => {
                Some("Check the dependency range, or allow prerelease versions")
            },
            SprigError::Manifest { .. } => Some("Fix or remove the malformed package manifest"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_error_converts() {
        let err: SprigError = VersionError::Empty.into();
        assert!(matches!(err, SprigError::Version(VersionError::Empty)));
        assert!(!err.is_source_failure());
    }

    #[test]
    fn test_source_failures() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(SprigError::source_failure("feed", "listing failed", io).is_source_failure());
        assert!(SprigError::SourceTimeout {
            repository: "feed".to_string(),
            timeout: Duration::from_millis(5),
        }
        .is_source_failure());
        assert!(!SprigError::Cancelled {
            operation: "get_packages".to_string()
        }
        .is_source_failure());
        assert!(!SprigError::unsupported("feed", "cloning").is_source_failure());
    }

    #[test]
    fn test_error_messages() {
        let err = SprigError::CircularDependency {
            cycle: "a 1.0.0 -> b 1.0.0 -> a 1.0.0".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Circular dependency detected: a 1.0.0 -> b 1.0.0 -> a 1.0.0"
        );
        assert!(err.suggestion().is_some());

        let err = SprigError::UnresolvedDependency {
            id: "Logging".to_string(),
            range: " (>= 1.0.0)".to_string(),
        };
        assert_eq!(err.to_string(), "Unable to resolve dependency 'Logging' (>= 1.0.0)");
    }
}
