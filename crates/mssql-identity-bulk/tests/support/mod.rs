//! In-memory stand-in for a SQL Server session.
//!
//! Understands the batches an identity-preserving write sends well enough
//! to track which session temp tables exist, hand out identities and
//! inject failures at any phase.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use mssql_identity_bulk::{BulkCopyError, BulkSession, Result, SqlValue};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Open,
    Create,
    BulkLoad,
    Capture,
    Cleanup,
    Close,
}

/// Which batch the fake recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Create(String),
    Capture(String),
    Cleanup(String),
    Other(String),
}

impl Statement {
    pub fn sql(&self) -> &str {
        match self {
            Statement::Create(s) | Statement::Capture(s) | Statement::Cleanup(s) | Statement::Other(s) => s,
        }
    }
}

pub struct FakeSession {
    open: bool,
    pub opens: usize,
    pub closes: usize,
    pub statements: Vec<Statement>,
    /// `(table, rows)` for every bulk-load request.
    pub bulk_loads: Vec<(String, Vec<Vec<SqlValue<'static>>>)>,
    tables: BTreeMap<String, Vec<Vec<SqlValue<'static>>>>,
    next_identity: i64,
    failures: HashSet<Phase>,
    /// Insert holding rows into the destination in reverse order.
    pub reverse_insert_order: bool,
    /// Cancel this token once the first bulk-load request completes.
    pub cancel_after_first_load: Option<CancellationToken>,
    pub bulk_load_delay: Option<Duration>,
}

impl FakeSession {
    /// A session that starts closed.
    pub fn closed() -> Self {
        Self {
            open: false,
            opens: 0,
            closes: 0,
            statements: Vec::new(),
            bulk_loads: Vec::new(),
            tables: BTreeMap::new(),
            next_identity: 101,
            failures: HashSet::new(),
            reverse_insert_order: false,
            cancel_after_first_load: None,
            bulk_load_delay: None,
        }
    }

    /// A session that is already open.
    pub fn opened() -> Self {
        Self {
            open: true,
            ..Self::closed()
        }
    }

    pub fn fail_at(mut self, phase: Phase) -> Self {
        self.failures.insert(phase);
        self
    }

    pub fn with_next_identity(mut self, next: i64) -> Self {
        self.next_identity = next;
        self
    }

    /// Temp tables currently alive in the session.
    pub fn live_tables(&self) -> BTreeSet<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn count(&self, kind: fn(&Statement) -> bool) -> usize {
        self.statements.iter().filter(|s| kind(s)).count()
    }

    fn fail(&self, phase: Phase, message: &str) -> Result<()> {
        if self.failures.contains(&phase) {
            return Err(BulkCopyError::Database(tiberius::error::Error::Io {
                kind: std::io::ErrorKind::Other,
                message: message.to_string(),
            }));
        }
        Ok(())
    }

    fn require_open(&self) -> Result<()> {
        if !self.open {
            return Err(BulkCopyError::Usage("fake session is not open".into()));
        }
        Ok(())
    }

    fn run(&mut self, sql: &str) -> Result<Vec<Vec<SqlValue<'static>>>> {
        self.require_open()?;
        if sql.contains("DECLARE @identity_type") {
            self.statements.push(Statement::Create(sql.to_string()));
            self.create(sql)
        } else if sql.contains("OUTPUT") {
            self.statements.push(Statement::Capture(sql.to_string()));
            self.capture(sql)
        } else if sql.starts_with("IF OBJECT_ID") {
            self.statements.push(Statement::Cleanup(sql.to_string()));
            self.fail(Phase::Cleanup, "cleanup failed")?;
            for name in temp_names(sql, "DROP TABLE [") {
                self.tables.remove(&name);
            }
            Ok(Vec::new())
        } else {
            self.statements.push(Statement::Other(sql.to_string()));
            Ok(Vec::new())
        }
    }

    fn create(&mut self, sql: &str) -> Result<Vec<Vec<SqlValue<'static>>>> {
        for name in temp_names(sql, "DROP TABLE [") {
            self.tables.remove(&name);
        }
        self.fail(Phase::Create, "Invalid object name 'dbo.Widget'")?;
        for marker in [" INTO [", "CREATE TABLE ["] {
            if let Some(name) = temp_names(sql, marker).into_iter().next() {
                self.tables.insert(name, Vec::new());
            }
        }
        Ok(Vec::new())
    }

    fn capture(&mut self, sql: &str) -> Result<Vec<Vec<SqlValue<'static>>>> {
        self.fail(Phase::Capture, "Cannot insert the value NULL into column 'Qty'")?;
        let names = temp_names(sql, "DROP TABLE [");
        let holding = names
            .iter()
            .find(|n| n.ends_with("TB"))
            .cloned()
            .unwrap_or_default();
        let mut held = self.tables.get(&holding).cloned().ok_or_else(|| {
            BulkCopyError::Usage(format!("Invalid object name '{}'", holding))
        })?;
        if self.reverse_insert_order {
            held.reverse();
        }

        let by_ordinal = sql.contains("MERGE");
        let mut captured = Vec::with_capacity(held.len());
        for row in held {
            let identity = SqlValue::I64(self.next_identity);
            self.next_identity += 1;
            if by_ordinal {
                let ordinal = row.last().cloned().unwrap_or(SqlValue::I32(-1));
                captured.push(vec![ordinal, identity]);
            } else {
                captured.push(vec![identity]);
            }
        }
        // both selects order by their first column
        captured.sort_by_key(|r| r[0].as_i64());

        for name in names {
            self.tables.remove(&name);
        }
        Ok(captured)
    }
}

/// Names of `#` tables that follow `marker` (which ends in `[`).
fn temp_names(sql: &str, marker: &str) -> Vec<String> {
    sql.match_indices(marker)
        .filter_map(|(at, _)| {
            let rest = &sql[at + marker.len()..];
            let end = rest.find(']')?;
            let name = &rest[..end];
            name.starts_with('#').then(|| name.to_string())
        })
        .collect()
}

#[async_trait]
impl BulkSession for FakeSession {
    fn is_open(&self) -> bool {
        self.open
    }

    async fn open(&mut self) -> Result<()> {
        self.fail(Phase::Open, "Login failed")?;
        self.open = true;
        self.opens += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closes += 1;
        self.open = false;
        // session temp tables die with the connection
        self.tables.clear();
        self.fail(Phase::Close, "connection reset")
    }

    async fn execute_batch(&mut self, sql: &str) -> Result<()> {
        self.run(sql).map(|_| ())
    }

    async fn query_batch(&mut self, sql: &str) -> Result<Vec<Vec<SqlValue<'static>>>> {
        self.run(sql)
    }

    async fn bulk_load(&mut self, table: &str, rows: Vec<Vec<SqlValue<'static>>>) -> Result<u64> {
        self.require_open()?;
        if let Some(delay) = self.bulk_load_delay {
            tokio::time::sleep(delay).await;
        }
        self.bulk_loads.push((table.to_string(), rows.clone()));
        if self.failures.contains(&Phase::BulkLoad) {
            return Err(BulkCopyError::transfer(
                table,
                "bulk insert send: Operand type clash",
            ));
        }
        let held = self.tables.get_mut(table).ok_or_else(|| {
            BulkCopyError::transfer(table, format!("Invalid object name '{}'", table))
        })?;
        let sent = rows.len() as u64;
        held.extend(rows);
        if let Some(token) = self.cancel_after_first_load.take() {
            token.cancel();
        }
        Ok(sent)
    }
}
