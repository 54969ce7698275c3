//! A single SQL Server connection that can be opened and closed on demand.

use async_trait::async_trait;
use tracing::debug;

use super::client::{connect_client, run_batch, run_bulk_load, run_query, MssqlClient};
use crate::config::ConnectionConfig;
use crate::core::traits::BulkSession;
use crate::core::value::SqlValue;
use crate::error::{BulkCopyError, Result};

/// One connection to SQL Server.
///
/// Starts closed unless built with [`MssqlConnection::connect`] or
/// [`MssqlConnection::from_client`]. Session temp tables live exactly as long
/// as the underlying client.
pub struct MssqlConnection {
    config: ConnectionConfig,
    client: Option<MssqlClient>,
}

impl MssqlConnection {
    /// Create a closed connection.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            client: None,
        }
    }

    /// Create and open a connection.
    pub async fn connect(config: ConnectionConfig) -> Result<Self> {
        let mut conn = Self::new(config);
        conn.open().await?;
        Ok(conn)
    }

    /// Wrap an already-connected client.
    pub fn from_client(config: ConnectionConfig, client: MssqlClient) -> Self {
        Self {
            config,
            client: Some(client),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Borrow the live client, e.g. to run caller statements between loads.
    pub fn client_mut(&mut self) -> Result<&mut MssqlClient> {
        self.client.as_mut().ok_or_else(|| {
            BulkCopyError::Usage(format!(
                "connection to {}:{}/{} is not open",
                self.config.host, self.config.port, self.config.database
            ))
        })
    }
}

#[async_trait]
impl BulkSession for MssqlConnection {
    fn is_open(&self) -> bool {
        self.client.is_some()
    }

    async fn open(&mut self) -> Result<()> {
        if self.client.is_none() {
            self.client = Some(connect_client(&self.config).await?);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(client) = self.client.take() {
            client.close().await?;
            debug!(
                "Closed MSSQL connection: {}:{}/{}",
                self.config.host, self.config.port, self.config.database
            );
        }
        Ok(())
    }

    async fn execute_batch(&mut self, sql: &str) -> Result<()> {
        run_batch(self.client_mut()?, sql).await
    }

    async fn query_batch(&mut self, sql: &str) -> Result<Vec<Vec<SqlValue<'static>>>> {
        run_query(self.client_mut()?, sql).await
    }

    async fn bulk_load(&mut self, table: &str, rows: Vec<Vec<SqlValue<'static>>>) -> Result<u64> {
        run_bulk_load(self.client_mut()?, table, rows).await
    }
}
