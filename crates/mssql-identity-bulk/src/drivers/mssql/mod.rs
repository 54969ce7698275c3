//! Microsoft SQL Server driver.
//!
//! - [`MssqlConnection`]: one connection, opened and closed on demand
//! - [`MssqlPool`]: bb8 pool whose checkouts ([`PooledSession`]) stay open
//! - [`encode`]: conversion between `SqlValue` and tiberius `ColumnData`

mod client;
mod connection;
pub mod encode;
mod pool;

pub use client::{connect_client, MssqlClient};
pub use connection::MssqlConnection;
pub use pool::{MssqlPool, PooledSession, TiberiusConnectionManager};
