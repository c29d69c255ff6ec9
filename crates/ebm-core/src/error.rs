use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Custom error types for the ebm library
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory enumeration failed (permission denied, vanished entry, ...)
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    /// File not found error
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Content is not a PDF, EPUB or MOBI file
    #[error("Unsupported book format: {0}")]
    UnsupportedFormat(PathBuf),

    /// A supported file whose metadata could not be read
    #[error("Failed to read metadata from {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    /// Referential integrity cannot be guaranteed by the catalog
    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    /// A statement inside a catalog transaction failed; the transaction was rolled back
    #[error("Transaction failed while {step}: {source}")]
    TransactionFailure {
        step: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// Database error outside a transaction body
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Review batch could not be serialized or read back
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The interactive review step failed
    #[error("Review failed: {0}")]
    Review(String),

    /// Invalid configuration error
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Operation interrupted")]
    Interrupted,
}

impl Error {
    /// Whether this is the recoverable per-file "not an e-book" case
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::UnsupportedFormat(_))
    }

    pub(crate) fn metadata(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::Metadata {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Classify a failed statement inside a transaction body.
    ///
    /// Constraint failures are integrity violations; everything else is a
    /// plain transaction failure for the given step.
    pub(crate) fn in_transaction(step: &'static str, source: rusqlite::Error) -> Self {
        match &source {
            rusqlite::Error::SqliteFailure(err, msg)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::IntegrityViolation(format!(
                    "{} while {}",
                    msg.clone().unwrap_or_else(|| err.to_string()),
                    step
                ))
            }
            _ => Error::TransactionFailure { step, source },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_is_classified_by_kind() {
        assert!(Error::UnsupportedFormat(PathBuf::from("a.txt")).is_unsupported());
        assert!(!Error::Interrupted.is_unsupported());
        assert!(!Error::metadata("a.epub", "bad zip").is_unsupported());
    }

    #[test]
    fn test_non_constraint_failure_is_transaction_failure() {
        let err = Error::in_transaction("inserting books", rusqlite::Error::InvalidQuery);
        assert!(matches!(
            err,
            Error::TransactionFailure {
                step: "inserting books",
                ..
            }
        ));
    }
}
