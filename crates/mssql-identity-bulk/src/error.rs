//! Error types for identity-preserving bulk loads.

use thiserror::Error;

/// Main error type for bulk-copy operations.
#[derive(Error, Debug)]
pub enum BulkCopyError {
    /// Caller misuse detected before any I/O (missing identity column, etc.)
    #[error("Usage error: {0}")]
    Usage(String),

    /// Configuration error (invalid YAML, bad identifier, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// SQL Server connection or statement error
    #[error("Database error: {0}")]
    Database(#[from] tiberius::error::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Bulk load into a table failed
    #[error("Transfer failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// The bulk-copy phase exceeded its configured timeout
    #[error("Bulk copy timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Operation was cancelled between round trips
    #[error("Bulk copy cancelled")]
    Cancelled,

    /// The server returned a different number of identities than rows submitted
    #[error("Expected {expected} identity values, server returned {actual}")]
    IdentityCountMismatch { expected: usize, actual: usize },

    /// A captured row ordinal does not map to exactly one submitted row
    #[error("Identity row {position} carries ordinal {ordinal}, which does not match a pending row")]
    IdentityOrderMismatch { position: usize, ordinal: i64 },

    /// A generated identity cannot be stored in the row-set column's type
    #[error("Identity value {value} does not fit column {column}")]
    IdentityConversion { value: String, column: String },

    /// A result cell could not be decoded
    #[error("Cannot decode result value: {0}")]
    Decode(String),

    /// The operation failed and dropping the temporary tables failed too
    #[error("{original}\n  Cleanup also failed: {cleanup}")]
    Cleanup {
        #[source]
        original: Box<BulkCopyError>,
        cleanup: Box<BulkCopyError>,
    },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl BulkCopyError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        BulkCopyError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Transfer error
    pub fn transfer(table: impl Into<String>, message: impl Into<String>) -> Self {
        BulkCopyError::Transfer {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Fold a cleanup outcome into the outcome of the work it followed.
    ///
    /// A cleanup failure after success is returned as-is. A cleanup failure
    /// after a failure keeps both, with the original as the error source.
    pub fn with_cleanup<T>(outcome: Result<T>, cleanup: Result<()>) -> Result<T> {
        match (outcome, cleanup) {
            (outcome, Ok(())) => outcome,
            (Ok(_), Err(cleanup)) => Err(cleanup),
            (Err(original), Err(cleanup)) => Err(BulkCopyError::Cleanup {
                original: Box::new(original),
                cleanup: Box::new(cleanup),
            }),
        }
    }

    /// The error that started the failure, looking through cleanup wrappers.
    pub fn root(&self) -> &BulkCopyError {
        match self {
            BulkCopyError::Cleanup { original, .. } => original.root(),
            other => other,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for bulk-copy operations.
pub type Result<T> = std::result::Result<T, BulkCopyError>;
