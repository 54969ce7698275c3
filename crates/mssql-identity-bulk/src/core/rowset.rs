//! In-memory row-set submitted to a bulk load.
//!
//! A [`RowSet`] is an ordered list of records over a fixed column list.
//! Record order is significant: generated identities are written back to the
//! record at the position it was submitted from.

use crate::error::{BulkCopyError, Result};

use super::value::{SqlNullType, SqlValue};

/// A named, typed row-set column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSetColumn {
    /// Column name as known to the caller.
    pub name: String,
    /// Declared value type. Cells must hold this type or a NULL.
    pub data_type: SqlNullType,
}

impl RowSetColumn {
    pub fn new(name: impl Into<String>, data_type: SqlNullType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered, mutable collection of records keyed by column.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    name: String,
    columns: Vec<RowSetColumn>,
    rows: Vec<Vec<SqlValue<'static>>>,
}

impl RowSet {
    /// Create an empty row-set. The name also seeds temp table names.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Add a column while building the row-set. Records already present get
    /// a typed NULL in the new column.
    pub fn with_column(mut self, name: impl Into<String>, data_type: SqlNullType) -> Self {
        for row in &mut self.rows {
            row.push(SqlValue::Null(data_type));
        }
        self.columns.push(RowSetColumn::new(name, data_type));
        self
    }

    /// Add a column. Fails once rows exist or if the name is taken.
    pub fn add_column(&mut self, name: impl Into<String>, data_type: SqlNullType) -> Result<()> {
        let name = name.into();
        if !self.rows.is_empty() {
            return Err(BulkCopyError::Usage(format!(
                "cannot add column {} to row-set {} after rows were added",
                name, self.name
            )));
        }
        if self.column_index(&name).is_some() {
            return Err(BulkCopyError::Usage(format!(
                "row-set {} already has a column named {}",
                self.name, name
            )));
        }
        self.columns.push(RowSetColumn::new(name, data_type));
        Ok(())
    }

    /// Append a record. Values are in column order.
    pub fn push_row(&mut self, values: Vec<SqlValue<'static>>) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(BulkCopyError::Usage(format!(
                "row-set {} has {} columns, row has {} values",
                self.name,
                self.columns.len(),
                values.len()
            )));
        }
        self.rows.push(values);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn columns(&self) -> &[RowSetColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<SqlValue<'static>>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column; exact match first, then case-insensitive.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .or_else(|| {
                self.columns
                    .iter()
                    .position(|c| c.name.eq_ignore_ascii_case(name))
            })
    }

    /// Cell lookup by record position and column name.
    pub fn get(&self, row: usize, column: &str) -> Option<&SqlValue<'static>> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Overwrite one cell.
    pub fn set(&mut self, row: usize, column: usize, value: SqlValue<'static>) -> Result<()> {
        let len = self.rows.len();
        let cell = self
            .rows
            .get_mut(row)
            .and_then(|r| r.get_mut(column))
            .ok_or_else(|| {
                BulkCopyError::Usage(format!(
                    "cell ({}, {}) is outside row-set {} ({} rows)",
                    row, column, self.name, len
                ))
            })?;
        *cell = value;
        Ok(())
    }
}
