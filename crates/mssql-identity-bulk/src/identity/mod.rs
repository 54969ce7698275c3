//! Identity-preserving bulk copy.
//!
//! A write runs four round trips on one session:
//!
//! 1. Create the holding (`#<name>TB`) and retrieval (`#<name>TR`) tables
//! 2. Bulk load the row-set into the holding table
//! 3. Move holding rows into the destination, capturing generated identities
//!    into the retrieval table, then select them and drop both tables
//! 4. On failure only, drop whatever staging tables remain
//!
//! Captured identities are written back into the row-set's identity column.

mod plan;
mod sql;
mod staging;

pub use plan::{InsertColumn, WritePlan, ORDINAL_COLUMN};
pub use sql::{capture_sql, cleanup_sql, create_staging_sql};

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{BulkCopyConfig, RowCorrelation};
use crate::core::rowset::RowSet;
use crate::core::traits::BulkSession;
use crate::core::value::SqlValue;
use crate::error::{BulkCopyError, Result};
use staging::StagingTables;

/// Progress callback, called with the cumulative number of rows copied each
/// time another `notify_after` rows reach the holding table.
pub type RowsCopiedCallback = Arc<dyn Fn(u64) + Send + Sync>;

/// Bulk copy that returns server-generated identities to the caller's rows.
pub struct IdentityBulkCopy<S: BulkSession> {
    session: S,
    config: BulkCopyConfig,
    on_rows_copied: Option<RowsCopiedCallback>,
}

impl<S: BulkSession> IdentityBulkCopy<S> {
    pub fn new(session: S, config: BulkCopyConfig) -> Self {
        Self {
            session,
            config,
            on_rows_copied: None,
        }
    }

    /// Register a progress callback; only called when `notify_after > 0`.
    pub fn with_notify(mut self, callback: impl Fn(u64) + Send + Sync + 'static) -> Self {
        self.on_rows_copied = Some(Arc::new(callback));
        self
    }

    pub fn config(&self) -> &BulkCopyConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut BulkCopyConfig {
        &mut self.config
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }

    /// Insert every row of `rows` into the destination table and store each
    /// generated identity in the row's identity column.
    ///
    /// Returns the number of rows copied. If the session was closed on entry
    /// it is opened for the write and closed again before returning, on
    /// success and failure alike; an open session stays open.
    pub async fn write(&mut self, rows: &mut RowSet) -> Result<u64> {
        self.write_with_cancel(rows, &CancellationToken::new()).await
    }

    /// Like [`write`](Self::write), checking `cancel` before each round trip
    /// and between bulk-load batches.
    pub async fn write_with_cancel(
        &mut self,
        rows: &mut RowSet,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let plan = WritePlan::build(&self.config, rows)?;
        let started = Instant::now();
        info!(
            "Writing {} rows to {} (staging {}, correlation={})",
            rows.len(),
            plan.destination.quoted(),
            plan.holding.name(),
            plan.correlation
        );

        let opened_here = !self.session.is_open();
        if opened_here {
            check_cancelled(cancel)?;
            self.session.open().await?;
            debug!("Opened {} session for {}", self.session.db_type(), plan.destination.quoted());
        }

        let mut staging = StagingTables::new(plan.holding.clone(), plan.retrieval.clone());
        let outcome = self.run(&plan, rows, &mut staging, cancel).await;
        let cleanup = staging.release(&mut self.session).await;
        let mut outcome = BulkCopyError::with_cleanup(outcome, cleanup);

        if opened_here {
            let closed = self.session.close().await;
            outcome = BulkCopyError::with_cleanup(outcome, closed);
        }

        match &outcome {
            Ok(copied) => info!(
                "Wrote {} rows to {} in {:.2}s",
                copied,
                plan.destination.quoted(),
                started.elapsed().as_secs_f64()
            ),
            Err(e) => warn!("Write to {} failed: {}", plan.destination.quoted(), e),
        }
        outcome
    }

    async fn run(
        &mut self,
        plan: &WritePlan,
        rows: &mut RowSet,
        staging: &mut StagingTables,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        check_cancelled(cancel)?;
        debug!(
            "Creating staging tables {} and {}",
            plan.holding.name(),
            plan.retrieval.name()
        );
        staging.mark_created();
        self.session.execute_batch(&create_staging_sql(plan)).await?;

        let copied = self.copy_with_timeout(plan, rows, cancel).await?;

        check_cancelled(cancel)?;
        debug!(
            "Moving {} rows from {} into {}",
            copied,
            plan.holding.name(),
            plan.destination.quoted()
        );
        let captured = self.session.query_batch(&capture_sql(plan)).await?;
        staging.mark_dropped();

        write_back(plan, rows, captured)?;
        Ok(copied)
    }

    async fn copy_with_timeout(
        &mut self,
        plan: &WritePlan,
        rows: &RowSet,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let seconds = self.config.bulk_copy_timeout_secs;
        if seconds == 0 {
            return self.copy_to_holding(plan, rows, cancel).await;
        }
        tokio::time::timeout(
            Duration::from_secs(seconds),
            self.copy_to_holding(plan, rows, cancel),
        )
        .await
        .map_err(|_| BulkCopyError::Timeout { seconds })?
    }

    async fn copy_to_holding(
        &mut self,
        plan: &WritePlan,
        rows: &RowSet,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let total = rows.len();
        if total == 0 {
            debug!("No rows to load into {}", plan.holding.name());
            return Ok(0);
        }
        let batch_size = match self.config.batch_size {
            0 => total,
            n => n,
        };

        // without streaming, every row is converted before the first send
        let mut prepared = if self.config.enable_streaming {
            None
        } else {
            Some(plan.project(rows, 0..total)?.into_iter())
        };

        let mut copied = 0u64;
        for start in (0..total).step_by(batch_size) {
            check_cancelled(cancel)?;
            let end = (start + batch_size).min(total);
            let batch = match prepared.as_mut() {
                Some(all) => all.by_ref().take(end - start).collect(),
                None => plan.project(rows, start..end)?,
            };

            let sent = self.session.bulk_load(plan.holding.name(), batch).await?;
            debug!(
                "Loaded rows {}..{} into {} ({} sent)",
                start,
                end,
                plan.holding.name(),
                sent
            );
            let before = copied;
            copied += sent;
            self.notify(before, copied);
        }
        Ok(copied)
    }

    fn notify(&self, before: u64, copied: u64) {
        let every = self.config.notify_after;
        if every == 0 {
            return;
        }
        for crossed in (before / every + 1)..=(copied / every) {
            let reached = crossed * every;
            debug!("{} rows copied", reached);
            if let Some(callback) = &self.on_rows_copied {
                callback(reached);
            }
        }
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        info!("Cancellation requested, abandoning bulk copy");
        return Err(BulkCopyError::Cancelled);
    }
    Ok(())
}

/// Store captured identities in the row-set. Nothing is written unless every
/// captured row maps to exactly one submitted row.
fn write_back(
    plan: &WritePlan,
    rows: &mut RowSet,
    captured: Vec<Vec<SqlValue<'static>>>,
) -> Result<()> {
    if captured.len() != rows.len() {
        return Err(BulkCopyError::IdentityCountMismatch {
            expected: rows.len(),
            actual: captured.len(),
        });
    }

    let column = rows.columns()[plan.identity_slot].name.clone();
    let mut assigned = vec![false; rows.len()];
    let mut updates = Vec::with_capacity(captured.len());

    for (position, record) in captured.into_iter().enumerate() {
        let mut cells = record.into_iter();
        let row = match plan.correlation {
            RowCorrelation::SourceOrdinal => {
                let ordinal = cells
                    .next()
                    .and_then(|v| v.as_i64())
                    .ok_or_else(|| {
                        BulkCopyError::Decode(format!(
                            "identity row {} has no row ordinal",
                            position
                        ))
                    })?;
                usize::try_from(ordinal)
                    .ok()
                    .filter(|&row| row < assigned.len() && !assigned[row])
                    .ok_or(BulkCopyError::IdentityOrderMismatch { position, ordinal })?
            }
            RowCorrelation::IdentityOrder => position,
        };
        assigned[row] = true;

        let generated = cells.next().ok_or_else(|| {
            BulkCopyError::Decode(format!("identity row {} has no identity value", position))
        })?;
        let value = generated.cast_identity(plan.identity_type).ok_or_else(|| {
            BulkCopyError::IdentityConversion {
                value: generated.to_string(),
                column: column.clone(),
            }
        })?;
        updates.push((row, value));
    }

    for (row, value) in updates {
        rows.set(row, plan.identity_slot, value)?;
    }
    Ok(())
}
