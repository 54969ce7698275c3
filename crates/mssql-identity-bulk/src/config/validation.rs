//! Configuration validation.

use std::collections::HashSet;

use super::{BulkCopyConfig, BulkCopyOptions, ConnectionConfig};
use crate::core::identifier::{validate_identifier, ObjectName};
use crate::error::{BulkCopyError, Result};

/// Validate connection settings.
pub fn validate_connection(config: &ConnectionConfig) -> Result<()> {
    if config.host.is_empty() {
        return Err(BulkCopyError::Config("connection.host is required".into()));
    }
    if config.database.is_empty() {
        return Err(BulkCopyError::Config(
            "connection.database is required".into(),
        ));
    }
    if config.user.is_empty() {
        return Err(BulkCopyError::Config("connection.user is required".into()));
    }
    if config.port == 0 {
        return Err(BulkCopyError::Config(
            "connection.port must be non-zero".into(),
        ));
    }
    Ok(())
}

/// Validate bulk-copy settings.
///
/// A missing identity column is not a configuration error here; it is
/// reported as a usage error when a write is attempted.
pub fn validate_bulk_copy(config: &BulkCopyConfig) -> Result<()> {
    if config.destination_table.trim().is_empty() {
        return Err(BulkCopyError::Config(
            "bulk_copy.destination_table is required".into(),
        ));
    }
    ObjectName::parse(&config.destination_table)?;

    if let Some(identity) = &config.identity_column {
        if !identity.is_empty() {
            validate_identifier(identity)?;
        }
    }

    if config.options.contains(BulkCopyOptions::KEEP_IDENTITY) {
        return Err(BulkCopyError::Config(
            "bulk_copy.options KEEP_IDENTITY cannot be combined with identity retrieval".into(),
        ));
    }

    let mut sources = HashSet::new();
    let mut destinations = HashSet::new();
    for mapping in &config.column_mappings {
        validate_identifier(&mapping.source)?;
        validate_identifier(&mapping.destination)?;
        if !sources.insert(mapping.source.to_lowercase()) {
            return Err(BulkCopyError::Config(format!(
                "bulk_copy.column_mappings maps source column {} more than once",
                mapping.source
            )));
        }
        if !destinations.insert(mapping.destination.to_lowercase()) {
            return Err(BulkCopyError::Config(format!(
                "bulk_copy.column_mappings maps more than one column to {}",
                mapping.destination
            )));
        }
    }

    Ok(())
}
