//! bb8 connection pool over tiberius clients.
//!
//! A checked-out [`PooledSession`] is always open and is never closed by the
//! orchestrator; dropping it returns the connection to the pool.

use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use tracing::info;

use super::client::{connect_client, run_batch, run_bulk_load, run_query, MssqlClient};
use crate::config::ConnectionConfig;
use crate::core::traits::BulkSession;
use crate::core::value::SqlValue;
use crate::error::{BulkCopyError, Result};

/// Connection pool timeouts.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(300);
const POOL_MAX_LIFETIME: Duration = Duration::from_secs(1800);

/// Connection manager for bb8 pool with Tiberius.
#[derive(Clone)]
pub struct TiberiusConnectionManager {
    config: ConnectionConfig,
}

impl TiberiusConnectionManager {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl bb8::ManageConnection for TiberiusConnectionManager {
    type Connection = MssqlClient;
    type Error = BulkCopyError;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        connect_client(&self.config).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Pool of SQL Server connections.
pub struct MssqlPool {
    pool: Pool<TiberiusConnectionManager>,
}

impl MssqlPool {
    /// Create a pool and verify connectivity.
    pub async fn new(config: ConnectionConfig, max_size: u32) -> Result<Self> {
        let manager = TiberiusConnectionManager::new(config.clone());
        let pool = Pool::builder()
            .max_size(max_size)
            .min_idle(Some(1))
            .connection_timeout(POOL_CONNECTION_TIMEOUT)
            .idle_timeout(Some(POOL_IDLE_TIMEOUT))
            .max_lifetime(Some(POOL_MAX_LIFETIME))
            .test_on_check_out(true)
            .build(manager)
            .await
            .map_err(|e| BulkCopyError::pool(e, "creating MSSQL pool"))?;

        {
            let mut conn = pool
                .get()
                .await
                .map_err(|e| BulkCopyError::pool(e, "testing MSSQL connection"))?;
            conn.simple_query("SELECT 1").await?.into_results().await?;
        }

        info!(
            "Connected to MSSQL: {}:{}/{} (pool_size={})",
            config.host, config.port, config.database, max_size
        );

        Ok(Self { pool })
    }

    /// Check out a session.
    pub async fn session(&self) -> Result<PooledSession<'_>> {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| BulkCopyError::pool(e, "getting MSSQL connection"))?;
        Ok(PooledSession { conn })
    }
}

/// A pooled connection used as a bulk-copy session.
pub struct PooledSession<'a> {
    conn: PooledConnection<'a, TiberiusConnectionManager>,
}

impl PooledSession<'_> {
    pub fn client_mut(&mut self) -> &mut MssqlClient {
        &mut self.conn
    }
}

#[async_trait]
impl<'a> BulkSession for PooledSession<'a> {
    fn is_open(&self) -> bool {
        true
    }

    async fn open(&mut self) -> Result<()> {
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        // the pool owns the connection
        Ok(())
    }

    async fn execute_batch(&mut self, sql: &str) -> Result<()> {
        run_batch(&mut self.conn, sql).await
    }

    async fn query_batch(&mut self, sql: &str) -> Result<Vec<Vec<SqlValue<'static>>>> {
        run_query(&mut self.conn, sql).await
    }

    async fn bulk_load(&mut self, table: &str, rows: Vec<Vec<SqlValue<'static>>>) -> Result<u64> {
        run_bulk_load(&mut self.conn, table, rows).await
    }
}
