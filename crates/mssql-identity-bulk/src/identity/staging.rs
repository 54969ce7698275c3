//! Lifetime tracking for the two staging tables of one write.

use tracing::{debug, warn};

use super::sql::drop_staging_sql;
use crate::core::identifier::TempTable;
use crate::core::traits::BulkSession;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StagingState {
    /// Nothing has been sent that could create a table.
    Pending,
    /// The create batch was sent; either table may exist.
    Created,
    /// The capture batch dropped both tables.
    Dropped,
}

/// Staging tables that must not outlive the write that created them.
#[derive(Debug)]
pub struct StagingTables {
    holding: TempTable,
    retrieval: TempTable,
    state: StagingState,
}

impl StagingTables {
    pub fn new(holding: TempTable, retrieval: TempTable) -> Self {
        Self {
            holding,
            retrieval,
            state: StagingState::Pending,
        }
    }

    /// Record that the create batch is about to be sent.
    pub fn mark_created(&mut self) {
        self.state = StagingState::Created;
    }

    /// Record that the capture batch completed, dropping both tables.
    pub fn mark_dropped(&mut self) {
        self.state = StagingState::Dropped;
    }

    pub fn needs_cleanup(&self) -> bool {
        self.state == StagingState::Created
    }

    /// Drop whatever staging tables may remain. A no-op unless the tables
    /// were possibly created and not yet dropped.
    pub async fn release<S: BulkSession + ?Sized>(self, session: &mut S) -> Result<()> {
        if !self.needs_cleanup() {
            return Ok(());
        }
        if !session.is_open() {
            // session temp tables went away with the connection
            debug!(
                "Session closed before cleanup of {} and {}",
                self.holding.name(),
                self.retrieval.name()
            );
            return Ok(());
        }

        debug!(
            "Dropping staging tables {} and {}",
            self.holding.name(),
            self.retrieval.name()
        );
        let sql = drop_staging_sql(&self.holding, &self.retrieval);
        session.execute_batch(&sql).await.map_err(|e| {
            warn!(
                "Failed to drop staging tables {} and {}: {}",
                self.holding.name(),
                self.retrieval.name(),
                e
            );
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let (holding, retrieval) = TempTable::pair("Widget");
        let mut staging = StagingTables::new(holding, retrieval);
        assert!(!staging.needs_cleanup());
        staging.mark_created();
        assert!(staging.needs_cleanup());
        staging.mark_dropped();
        assert!(!staging.needs_cleanup());
    }
}
