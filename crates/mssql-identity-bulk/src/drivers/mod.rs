//! Database driver implementations.
//!
//! - [`mssql`]: Microsoft SQL Server sessions over tiberius
//!
//! # Architecture
//!
//! Each driver module implements [`BulkSession`](crate::core::BulkSession)
//! for its connection types, owning the wire-level work: connecting, running
//! plain batches, decoding result rows and streaming bulk loads. The
//! identity-preserving write itself is driver-agnostic and lives in
//! [`identity`](crate::identity).

pub mod mssql;

pub use mssql::{MssqlConnection, MssqlPool, PooledSession};
