//! Core error types for Seqport

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Seqport operations
#[derive(Error, Debug)]
pub enum SeqportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Fatal problems with a job's inputs (duplicate basenames, unresolvable files,
    /// inconsistent pairing). Raised before any retention action runs.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The catalog references a file that is not on disk.
    #[error("Missing artifact: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Parsing error: {0}")]
    Parse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Other error: {0}")]
    Other(String),
}

/// Result type alias for Seqport operations
pub type SeqportResult<T> = Result<T, SeqportError>;

impl SeqportError {
    /// True for errors that must abort an ingestion job before retention fires
    pub fn is_fatal_configuration(&self) -> bool {
        matches!(self, SeqportError::Configuration(_))
    }
}

impl From<serde_json::Error> for SeqportError {
    fn from(err: serde_json::Error) -> Self {
        SeqportError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for SeqportError {
    fn from(err: anyhow::Error) -> Self {
        // Keep typed errors that were wrapped with context on the way up
        match err.downcast::<SeqportError>() {
            Ok(inner) => inner,
            Err(err) => SeqportError::Other(format!("{:#}", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_display() {
        let config_error = SeqportError::Configuration("duplicate basename".to_string());
        assert_eq!(
            format!("{}", config_error),
            "Configuration error: duplicate basename"
        );

        let missing = SeqportError::MissingArtifact(PathBuf::from("/data/a.bam"));
        assert_eq!(format!("{}", missing), "Missing artifact: /data/a.bam");

        let catalog = SeqportError::Catalog("no such readset".to_string());
        assert_eq!(format!("{}", catalog), "Catalog error: no such readset");

        let io_error = SeqportError::Io(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(format!("{}", io_error).contains("IO error"));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let parse_result: Result<serde_json::Value, serde_json::Error> =
            serde_json::from_str("{invalid json}");
        let err: SeqportError = parse_result.unwrap_err().into();
        assert!(matches!(err, SeqportError::Serialization(_)));
    }

    #[test]
    fn test_anyhow_conversion_preserves_typed_errors() {
        let typed = anyhow::Error::new(SeqportError::Configuration("pairing".to_string()))
            .context("while validating Group1");
        let err: SeqportError = typed.into();
        assert!(err.is_fatal_configuration());

        let untyped = anyhow::anyhow!("custom error message");
        match SeqportError::from(untyped) {
            SeqportError::Other(msg) => assert_eq!(msg, "custom error message"),
            other => panic!("Expected Other error variant, got {:?}", other),
        }
    }
}
