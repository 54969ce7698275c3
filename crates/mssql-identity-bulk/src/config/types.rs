//! Configuration type definitions.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQL Server connection settings.
    pub connection: ConnectionConfig,

    /// Bulk-copy behavior.
    pub bulk_copy: BulkCopyConfig,
}

/// SQL Server connection configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 1433).
    #[serde(default = "default_mssql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// Encrypt connection (default: "true").
    #[serde(default = "default_true_string")]
    pub encrypt: String,

    /// Trust server certificate (default: false).
    #[serde(default)]
    pub trust_server_cert: bool,

    /// Application name reported to the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_name: Option<String>,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .field("application_name", &self.application_name)
            .finish()
    }
}

/// Renames a row-set column to a destination column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Column name in the row-set.
    pub source: String,
    /// Column name in the destination table.
    pub destination: String,
}

impl ColumnMapping {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

bitflags! {
    /// Provider-level bulk-copy behavior flags.
    ///
    /// Serialized in bitflags' text form, e.g. `TABLE_LOCK | USE_INTERNAL_TRANSACTION`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct BulkCopyOptions: u32 {
        /// Preserve identity values supplied by the caller. Rejected by validation:
        /// a load that keeps caller identities has no generated values to recover.
        const KEEP_IDENTITY            = 0b0000_0001;
        /// Take a table lock on the destination for the final insert.
        const TABLE_LOCK               = 0b0000_0010;
        /// Run the insert-and-capture step inside its own transaction.
        const USE_INTERNAL_TRANSACTION = 0b0000_0100;
    }
}

impl Default for BulkCopyOptions {
    fn default() -> Self {
        BulkCopyOptions::empty()
    }
}

/// How captured identity values are matched back to row-set records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowCorrelation {
    /// Stage a row ordinal beside each row and capture it with the identity.
    #[default]
    SourceOrdinal,

    /// Capture identities only and assign them in ascending identity order.
    IdentityOrder,
}

impl fmt::Display for RowCorrelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowCorrelation::SourceOrdinal => write!(f, "source_ordinal"),
            RowCorrelation::IdentityOrder => write!(f, "identity_order"),
        }
    }
}

/// Bulk-copy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkCopyConfig {
    /// Destination table, optionally schema- or database-qualified.
    pub destination_table: String,

    /// Server-generated identity column in the destination table. Required at write time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_column: Option<String>,

    /// Rows per bulk-load request (default: 0, all rows in one request).
    #[serde(default)]
    pub batch_size: usize,

    /// Timeout for the bulk-copy phase in seconds (default: 30, 0 disables).
    #[serde(default = "default_timeout_secs")]
    pub bulk_copy_timeout_secs: u64,

    /// Report progress every N copied rows (default: 0, disabled).
    #[serde(default)]
    pub notify_after: u64,

    /// Project rows batch by batch instead of all up front (default: false).
    #[serde(default)]
    pub enable_streaming: bool,

    /// Row-set to destination column renames, in order.
    #[serde(default)]
    pub column_mappings: Vec<ColumnMapping>,

    /// Bulk-copy behavior flags.
    #[serde(default)]
    pub options: BulkCopyOptions,

    /// Row correlation strategy (default: source_ordinal).
    #[serde(default)]
    pub correlation: RowCorrelation,
}

impl BulkCopyConfig {
    /// Create a configuration for the given destination with defaults elsewhere.
    pub fn new(destination_table: impl Into<String>) -> Self {
        Self {
            destination_table: destination_table.into(),
            identity_column: None,
            batch_size: 0,
            bulk_copy_timeout_secs: default_timeout_secs(),
            notify_after: 0,
            enable_streaming: false,
            column_mappings: Vec::new(),
            options: BulkCopyOptions::empty(),
            correlation: RowCorrelation::default(),
        }
    }

    pub fn with_identity_column(mut self, name: impl Into<String>) -> Self {
        self.identity_column = Some(name.into());
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.bulk_copy_timeout_secs = secs;
        self
    }

    pub fn with_notify_after(mut self, rows: u64) -> Self {
        self.notify_after = rows;
        self
    }

    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.enable_streaming = enabled;
        self
    }

    pub fn with_column_mapping(mut self, mapping: ColumnMapping) -> Self {
        self.column_mappings.push(mapping);
        self
    }

    pub fn with_options(mut self, options: BulkCopyOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_correlation(mut self, correlation: RowCorrelation) -> Self {
        self.correlation = correlation;
        self
    }

    /// Destination name for a row-set column, after mappings.
    pub fn destination_for<'a>(&'a self, source: &'a str) -> &'a str {
        self.column_mappings
            .iter()
            .find(|m| m.source == source)
            .or_else(|| {
                self.column_mappings
                    .iter()
                    .find(|m| m.source.eq_ignore_ascii_case(source))
            })
            .map(|m| m.destination.as_str())
            .unwrap_or(source)
    }
}

fn default_mssql_port() -> u16 {
    1433
}

fn default_true_string() -> String {
    "true".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}
