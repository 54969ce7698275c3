//! Resolved, validated description of one identity-preserving write.
//!
//! Everything that can be checked without a round trip is checked here, so
//! a bad call fails before any connection is opened.

use std::collections::HashSet;
use std::ops::Range;

use crate::config::{BulkCopyConfig, BulkCopyOptions, RowCorrelation};
use crate::core::identifier::{quote_mssql, validate_identifier, ObjectName, TempTable};
use crate::core::rowset::RowSet;
use crate::core::value::{SqlNullType, SqlValue};
use crate::error::{BulkCopyError, Result};

/// Extra holding-table column carrying each row's position in the row-set.
pub const ORDINAL_COLUMN: &str = "__row_ordinal";

/// A row-set column that is copied to the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertColumn {
    /// Position in the row-set.
    pub source_index: usize,
    /// Bracket-quoted destination column name.
    pub quoted: String,
    pub data_type: SqlNullType,
}

#[derive(Debug, Clone)]
pub struct WritePlan {
    pub destination: ObjectName,
    /// `[db].` when the destination names a database, otherwise empty.
    pub catalog_prefix: String,
    pub identity_column: String,
    pub identity_quoted: String,
    /// Row-set column that receives generated identities.
    pub identity_slot: usize,
    pub identity_type: SqlNullType,
    pub columns: Vec<InsertColumn>,
    pub holding: TempTable,
    pub retrieval: TempTable,
    pub correlation: RowCorrelation,
    pub options: BulkCopyOptions,
}

impl WritePlan {
    pub fn build(config: &BulkCopyConfig, rows: &RowSet) -> Result<Self> {
        let identity_column = config
            .identity_column
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| BulkCopyError::Usage("identity column name is not set".into()))?
            .to_string();
        if identity_column.eq_ignore_ascii_case(ORDINAL_COLUMN) {
            return Err(BulkCopyError::Usage(format!(
                "identity column cannot be named {}",
                ORDINAL_COLUMN
            )));
        }

        if config.destination_table.trim().is_empty() {
            return Err(BulkCopyError::Usage(
                "destination table name is not set".into(),
            ));
        }
        config.validate()?;
        let destination = ObjectName::parse(&config.destination_table)?;
        let identity_quoted = quote_mssql(&identity_column)?;
        let catalog_prefix = match destination.parts() {
            [database, _, _] => format!("{}.", quote_mssql(database)?),
            _ => String::new(),
        };

        let mut identity_slot = None;
        let mut columns = Vec::new();
        let mut seen = HashSet::new();
        for (source_index, column) in rows.columns().iter().enumerate() {
            let target = config.destination_for(&column.name);
            if target.eq_ignore_ascii_case(&identity_column) {
                if identity_slot.is_none() {
                    identity_slot = Some((source_index, column.data_type));
                }
                continue;
            }
            validate_identifier(target)?;
            if target.eq_ignore_ascii_case(ORDINAL_COLUMN) {
                return Err(BulkCopyError::Usage(format!(
                    "row-set column {} maps to reserved column name {}",
                    column.name, ORDINAL_COLUMN
                )));
            }
            if !seen.insert(target.to_lowercase()) {
                return Err(BulkCopyError::Usage(format!(
                    "more than one row-set column maps to destination column {}",
                    target
                )));
            }
            columns.push(InsertColumn {
                source_index,
                quoted: quote_mssql(target)?,
                data_type: column.data_type,
            });
        }

        let (identity_slot, identity_type) = identity_slot.ok_or_else(|| {
            BulkCopyError::Usage(format!(
                "row-set {} has no column for identity column {}",
                rows.name(),
                identity_column
            ))
        })?;
        if !identity_type.is_identity_capable() {
            return Err(BulkCopyError::Usage(format!(
                "row-set column {} is declared {:?}, which cannot hold an identity",
                rows.columns()[identity_slot].name,
                identity_type
            )));
        }
        if columns.is_empty() {
            return Err(BulkCopyError::Usage(format!(
                "row-set {} has no columns to insert besides {}",
                rows.name(),
                identity_column
            )));
        }
        let width = rows.columns().len();
        if let Some(position) = rows.rows().iter().position(|r| r.len() != width) {
            return Err(BulkCopyError::Usage(format!(
                "row {} of row-set {} has {} values, expected {}",
                position,
                rows.name(),
                rows.rows()[position].len(),
                width
            )));
        }
        if i32::try_from(rows.len()).is_err() {
            return Err(BulkCopyError::Usage(format!(
                "row-set {} has {} rows, more than one write can correlate",
                rows.name(),
                rows.len()
            )));
        }

        let stem = if rows.name().trim().is_empty() {
            destination.object()
        } else {
            rows.name()
        };
        let (holding, retrieval) = TempTable::pair(stem);

        Ok(Self {
            destination,
            catalog_prefix,
            identity_column,
            identity_quoted,
            identity_slot,
            identity_type,
            columns,
            holding,
            retrieval,
            correlation: config.correlation,
            options: config.options,
        })
    }

    /// Comma-joined quoted destination columns, identity excluded.
    pub fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.quoted.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Build holding-table rows for a range of records: the insert columns in
    /// order, then the record's ordinal.
    pub fn project(&self, rows: &RowSet, range: Range<usize>) -> Result<Vec<Vec<SqlValue<'static>>>> {
        let records = rows.rows().get(range.clone()).ok_or_else(|| {
            BulkCopyError::Usage(format!(
                "rows {}..{} are outside row-set {} ({} rows)",
                range.start,
                range.end,
                rows.name(),
                rows.len()
            ))
        })?;

        let mut projected = Vec::with_capacity(records.len());
        for (offset, record) in records.iter().enumerate() {
            let position = range.start + offset;
            let mut values = Vec::with_capacity(self.columns.len() + 1);
            for column in &self.columns {
                let value = &record[column.source_index];
                if value.null_type() != column.data_type {
                    return Err(BulkCopyError::Usage(format!(
                        "row {} column {}: declared {:?}, found {:?} value {}",
                        position,
                        rows.columns()[column.source_index].name,
                        column.data_type,
                        value.null_type(),
                        value
                    )));
                }
                values.push(value.clone());
            }
            // build() bounds the row count to i32
            values.push(SqlValue::I32(position as i32));
            projected.push(values);
        }
        Ok(projected)
    }
}
