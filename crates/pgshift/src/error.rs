//! Error types for pgshift

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pgshift operations
pub type ShiftResult<T> = Result<T, ShiftError>;

/// Error types for migration operations
#[derive(Debug, Error)]
pub enum ShiftError {
    /// Migration filename or version string is not a non-empty digit string
    #[error("Invalid migration version: {0}")]
    InvalidVersion(String),

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote history rows with no matching migration file on disk
    #[error("Found migration versions on remote database that are missing locally: {}", versions.join(", "))]
    MissingLocal { versions: Vec<String> },

    /// Local migration files older than the remote head that were never applied
    #[error("Found local migration files to be inserted before the last migration on remote database: {}", versions.join(", "))]
    MissingRemote { versions: Vec<String> },

    /// Remote and local histories do not line up
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Applier attribution: the failing statement within a migration batch
    #[error("At statement {index}: {statement}")]
    Statement {
        index: usize,
        statement: String,
        #[source]
        source: tokio_postgres::Error,
    },

    /// User or upstream cancellation
    #[error("Operation cancelled")]
    Cancelled,

    /// Connection failures and health timeouts; the caller may retry
    #[error("Transient error: {0}")]
    Transient(String),

    /// A single statement outgrew the splitter's scan buffer
    #[error("Statement longer than {max_capacity} bytes, after statement {index}: {prefix}")]
    TokenTooLong {
        index: usize,
        prefix: String,
        max_capacity: usize,
    },

    /// Filesystem read/write/permission error
    #[error("Filesystem error on {}: {source}", path.display())]
    Fs {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Query execution error
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),
}

impl ShiftError {
    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a filesystem error for a specific path
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Fs {
            path: path.into(),
            source,
        }
    }

    /// Check if this is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Suggested next command for the user, when one exists
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::MissingLocal { versions } => Some(format!(
                "Try repairing the migration history table:\npgshift migration repair --status reverted {}",
                versions.join(" ")
            )),
            Self::MissingRemote { .. } => {
                Some("Rerun the command with --include-all to apply these migrations anyway.".to_string())
            }
            _ => None,
        }
    }

    /// Classify a tokio_postgres error into a more specific ShiftError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if err.is_closed() {
            return Self::Transient(err.to_string());
        }
        Self::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_local_suggests_repair() {
        let err = ShiftError::MissingLocal {
            versions: vec!["1".to_string()],
        };
        let suggestion = err.suggestion().expect("suggestion");
        assert!(suggestion.contains("repair --status reverted 1"));
    }

    #[test]
    fn missing_remote_suggests_include_all() {
        let err = ShiftError::MissingRemote {
            versions: vec!["1".to_string()],
        };
        assert!(err.suggestion().expect("suggestion").contains("--include-all"));
    }

    #[test]
    fn cancellation_is_never_success() {
        let err = ShiftError::Cancelled;
        assert!(err.is_cancelled());
        assert!(err.suggestion().is_none());
    }
}
