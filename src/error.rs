//! Error types for parsing, generation and orchestration.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for atomgen operations
pub type Result<T> = std::result::Result<T, AtomicError>;

/// Main error type for atomgen operations
#[derive(Error, Debug)]
pub enum AtomicError {
    /// A line of an `.atomic` file could not be classified
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Malformed header value (e.g. a boolean that is not `true`/`false`)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Required fields absent or blank at generation time
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    /// The file failed lint validation
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// No writable project or directory could be determined
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// Unexpected failure inside the code generator
    #[error("Generation error: {0}")]
    Generation(String),

    /// Writing the generated file failed
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rewriting a single usage site during rename failed
    #[error("Failed to update usage at {}:{line}: {message}", file.display())]
    UsageUpdate {
        file: PathBuf,
        line: u32,
        message: String,
    },

    /// An oracle query did not answer within its budget
    #[error("Timed out waiting for {0}")]
    Timeout(String),

    /// The type oracle has not signalled readiness yet
    #[error("Type oracle is not ready")]
    OracleNotReady,

    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Tracker state could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AtomicError {
    /// Creates a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Creates a generation error
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    /// True for the errors that mean "the user's file is not ready to generate"
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. } | Self::Configuration(_) | Self::MissingFields(_) | Self::Validation(_)
        )
    }
}

impl From<serde_json::Error> for AtomicError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_lists_every_field() {
        let err = AtomicError::MissingFields(vec!["namespace".to_string(), "directory".to_string()]);
        assert_eq!(err.to_string(), "Missing required fields: namespace, directory");
        assert!(err.is_configuration());
    }

    #[test]
    fn test_write_error_mentions_path() {
        let err = AtomicError::Write {
            path: PathBuf::from("/out/Foo.cs"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/out/Foo.cs"));
        assert!(!err.is_configuration());
    }
}
