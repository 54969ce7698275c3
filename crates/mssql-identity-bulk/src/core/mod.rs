//! Core abstractions for identity-preserving bulk loads.
//!
//! - [`identifier`]: Identifier validation, quoting, and temp table naming
//! - [`value`]: SQL value representation
//! - [`rowset`]: The in-memory row-set submitted by callers
//! - [`traits`]: The [`BulkSession`] seam implemented by drivers
//!
//! Drivers (`drivers/mssql`) implement [`BulkSession`]; the orchestrator in
//! `identity` only talks to that trait, so it can be exercised against an
//! in-memory session in tests.

pub mod identifier;
pub mod rowset;
pub mod traits;
pub mod value;

pub use identifier::{ObjectName, TempTable};
pub use rowset::{RowSet, RowSetColumn};
pub use traits::BulkSession;
pub use value::{SqlNullType, SqlValue};
