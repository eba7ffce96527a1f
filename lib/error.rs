//! Error types for mod-side-checker.

use std::path::PathBuf;
use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Result type for mod-side-checker operations.
pub type CheckResult<T> = Result<T, CheckError>;

/// Error type for mod-side-checker operations.
#[derive(Debug, Error)]
pub enum CheckError {
    /// The manifest is missing required fields or has the wrong shape.
    #[error("Malformed manifest: {0}")]
    MalformedManifest(String),

    /// No manifest or modpack archive could be found.
    #[error("Input not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// A single registry lookup failed. Recoverable: the mod is reported as unknown.
    #[error("Registry lookup failed for {id}: {reason}")]
    RegistryLookup {
        /// Project identifier (or filename when no identifier exists).
        id: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// Writing one output file failed. Other outputs are still attempted.
    #[error("Failed to write {}: {source}", .path.display())]
    OutputWrite {
        /// File that could not be written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Worker count outside the accepted range.
    #[error("Invalid worker count {0}: must be between 1 and {max}", max = crate::constants::MAX_WORKERS)]
    InvalidWorkerCount(usize),

    /// Configuration could not be loaded or saved.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Zip error.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),

    /// User cancelled operation.
    #[error("Operation cancelled")]
    Cancelled,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl CheckError {
    /// Wrap any error as a write failure for `path`.
    pub fn output_write(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        CheckError::OutputWrite {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Whether the error only affects a single mod and the run may continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CheckError::RegistryLookup { .. })
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl From<anyhow::Error> for CheckError {
    fn from(err: anyhow::Error) -> Self {
        CheckError::Generic(err.to_string())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_lookup_failures_are_recoverable() {
        let lookup = CheckError::RegistryLookup {
            id: "AANobbMI".into(),
            reason: "HTTP 404".into(),
        };
        assert!(lookup.is_recoverable());
        assert!(!CheckError::MalformedManifest("no files".into()).is_recoverable());
        assert!(!CheckError::Cancelled.is_recoverable());
    }

    #[test]
    fn test_output_write_message_names_path() {
        let err = CheckError::output_write(
            "output/Lista_Mods_Client.csv",
            std::io::Error::other("disk full"),
        );
        let msg = err.to_string();
        assert!(msg.contains("Lista_Mods_Client.csv"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn test_invalid_worker_count_message() {
        let msg = CheckError::InvalidWorkerCount(11).to_string();
        assert_eq!(msg, "Invalid worker count 11: must be between 1 and 10");
    }
}
