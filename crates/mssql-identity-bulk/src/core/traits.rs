//! Connection-bound operations the bulk-copy orchestrator runs against.
//!
//! - [`BulkSession`]: one database session (connection) that can be opened
//!   and closed, run plain batches, and bulk-load rows into a named table.
//!
//! Session-scoped temp tables only live as long as the session, so every
//! method of one orchestrator call must go to the same session.

use async_trait::async_trait;

use crate::error::Result;

use super::value::SqlValue;

/// A database session capable of plain batches and bulk loads.
#[async_trait]
pub trait BulkSession: Send {
    /// Whether the session currently holds a live connection.
    fn is_open(&self) -> bool;

    /// Establish the connection. Called only when [`is_open`](Self::is_open) is false.
    async fn open(&mut self) -> Result<()>;

    /// Release the connection.
    async fn close(&mut self) -> Result<()>;

    /// Run a batch as plain SQL text (not `sp_executesql`), discarding results.
    async fn execute_batch(&mut self, sql: &str) -> Result<()>;

    /// Run a batch as plain SQL text and return the rows of its first result set.
    async fn query_batch(&mut self, sql: &str) -> Result<Vec<Vec<SqlValue<'static>>>>;

    /// Bulk-load rows into `table`. Values are in the table's column order.
    async fn bulk_load(&mut self, table: &str, rows: Vec<Vec<SqlValue<'static>>>) -> Result<u64>;

    /// Database type identifier, for logs.
    fn db_type(&self) -> &str {
        "mssql"
    }
}

#[async_trait]
impl<S: BulkSession + ?Sized> BulkSession for &mut S {
    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    async fn open(&mut self) -> Result<()> {
        (**self).open().await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }

    async fn execute_batch(&mut self, sql: &str) -> Result<()> {
        (**self).execute_batch(sql).await
    }

    async fn query_batch(&mut self, sql: &str) -> Result<Vec<Vec<SqlValue<'static>>>> {
        (**self).query_batch(sql).await
    }

    async fn bulk_load(&mut self, table: &str, rows: Vec<Vec<SqlValue<'static>>>) -> Result<u64> {
        (**self).bulk_load(table, rows).await
    }

    fn db_type(&self) -> &str {
        (**self).db_type()
    }
}
