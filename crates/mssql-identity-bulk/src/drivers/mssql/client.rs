//! Connection setup and the client operations shared by every MSSQL session.

use std::time::Duration;

use tiberius::{Client, TokenRow};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, warn};

use super::encode::{column_data_to_sql_value, sql_value_to_column_data};
use crate::config::ConnectionConfig;
use crate::core::value::SqlValue;
use crate::error::{BulkCopyError, Result};

/// A tiberius client over a tokio TCP stream.
pub type MssqlClient = Client<Compat<TcpStream>>;

const TCP_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Open a TCP connection with keepalives and complete the TDS login.
pub async fn connect_client(config: &ConnectionConfig) -> Result<MssqlClient> {
    let tds_config = config.to_tiberius_config();
    let tcp = TcpStream::connect(tds_config.get_addr())
        .await
        .map_err(|e| tiberius::error::Error::Io {
            kind: e.kind(),
            message: e.to_string(),
        })?;
    tcp.set_nodelay(true).ok();

    let tcp = match with_keepalive(tcp) {
        Ok(tcp) => tcp,
        Err(e) => {
            warn!("Failed to configure TCP keepalives on MSSQL connection: {}", e);
            let tcp = TcpStream::connect(tds_config.get_addr())
                .await
                .map_err(|e| tiberius::error::Error::Io {
                    kind: e.kind(),
                    message: e.to_string(),
                })?;
            tcp.set_nodelay(true).ok();
            tcp
        }
    };

    let client = Client::connect(tds_config, tcp.compat_write()).await?;
    debug!(
        "Connected to MSSQL: {}:{}/{}",
        config.host, config.port, config.database
    );
    Ok(client)
}

fn with_keepalive(tcp: TcpStream) -> std::io::Result<TcpStream> {
    let std_tcp = tcp.into_std()?;
    let socket = socket2::Socket::from(std_tcp);

    let keepalive = socket2::TcpKeepalive::new()
        .with_time(TCP_KEEPALIVE_INTERVAL)
        .with_interval(TCP_KEEPALIVE_INTERVAL);
    if let Err(e) = socket.set_tcp_keepalive(&keepalive) {
        warn!("Failed to set TCP keepalive on MSSQL connection: {}", e);
    }

    let std_tcp: std::net::TcpStream = socket.into();
    std_tcp.set_nonblocking(true)?;
    TcpStream::from_std(std_tcp)
}

/// Run a plain batch and drain every result set.
pub async fn run_batch(client: &mut MssqlClient, sql: &str) -> Result<()> {
    client.simple_query(sql).await?.into_results().await?;
    Ok(())
}

/// Run a plain batch and decode the rows of its first result set.
pub async fn run_query(client: &mut MssqlClient, sql: &str) -> Result<Vec<Vec<SqlValue<'static>>>> {
    let rows = client.simple_query(sql).await?.into_first_result().await?;
    rows.into_iter()
        .map(|row| {
            row.into_iter()
                .map(column_data_to_sql_value)
                .collect::<Result<Vec<_>>>()
        })
        .collect()
}

/// Send rows through one TDS bulk-load request.
pub async fn run_bulk_load(
    client: &mut MssqlClient,
    table: &str,
    rows: Vec<Vec<SqlValue<'static>>>,
) -> Result<u64> {
    let mut bulk_load = client
        .bulk_insert(table)
        .await
        .map_err(|e| BulkCopyError::transfer(table, format!("bulk insert init: {}", e)))?;

    let mut sent = 0u64;
    for row in rows {
        let mut token_row = TokenRow::new();
        for value in &row {
            token_row.push(sql_value_to_column_data(value));
        }
        bulk_load
            .send(token_row)
            .await
            .map_err(|e| BulkCopyError::transfer(table, format!("bulk insert send: {}", e)))?;
        sent += 1;
    }

    bulk_load
        .finalize()
        .await
        .map_err(|e| BulkCopyError::transfer(table, format!("bulk insert finalize: {}", e)))?;

    Ok(sent)
}
