//! # mssql-identity-bulk
//!
//! Identity-preserving bulk loads into SQL Server.
//!
//! A plain bulk copy cannot report the identity values the server generated
//! for the rows it inserted. This library routes rows through two session
//! temp tables so that each row in the caller's [`RowSet`] receives its
//! generated identity:
//!
//! - **Bulk transfer** into a holding table using the TDS bulk-load protocol
//! - **Identity capture** via `OUTPUT ... INTO` while moving rows to the destination
//! - **Row correlation** by source ordinal, or by identity order
//! - **Guaranteed cleanup** of staging tables on every exit path
//!
//! ## Example
//!
//! ```rust,no_run
//! use mssql_identity_bulk::{
//!     BulkCopyConfig, Config, IdentityBulkCopy, MssqlConnection, RowSet, SqlNullType, SqlValue,
//! };
//!
//! #[tokio::main]
//! async fn main() -> mssql_identity_bulk::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let session = MssqlConnection::new(config.connection);
//!
//!     let mut rows = RowSet::new("Widget")
//!         .with_column("Id", SqlNullType::I32)
//!         .with_column("Qty", SqlNullType::I32);
//!     rows.push_row(vec![SqlValue::Null(SqlNullType::I32), SqlValue::I32(5)])?;
//!
//!     let bulk = BulkCopyConfig::new("dbo.Widget").with_identity_column("Id");
//!     let copied = IdentityBulkCopy::new(session, bulk).write(&mut rows).await?;
//!     println!("Inserted {} rows, first id {:?}", copied, rows.get(0, "Id"));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod identity;

// Re-exports for convenient access
pub use config::{
    BulkCopyConfig, BulkCopyOptions, ColumnMapping, Config, ConnectionConfig, RowCorrelation,
};
pub use crate::core::{BulkSession, RowSet, RowSetColumn, SqlNullType, SqlValue};
pub use drivers::mssql::{MssqlConnection, MssqlPool, PooledSession};
pub use error::{BulkCopyError, Result};
pub use identity::{IdentityBulkCopy, RowsCopiedCallback};
