//! Connection pool monitoring utilities
//!
//! Instrumented transactions that log how long a pooled connection waited
//! and was held. The pool is deliberately small, so long holders matter.

use sqlx::{Sqlite, Transaction};
use std::time::Instant;
use rxinv_common::{Error, Result};

/// Monitored transaction wrapper that logs acquisition and release timing
pub struct MonitoredTransaction<'c> {
    tx: Option<Transaction<'c, Sqlite>>,
    caller: &'static str,
    acquired_at: Instant,
}

impl<'c> MonitoredTransaction<'c> {
    /// Commit the transaction and log release timing
    pub async fn commit(mut self) -> Result<()> {
        let tx = self.take()?;
        tx.commit().await?;
        self.log_release("commit");
        Ok(())
    }

    /// Mutable access to the inner transaction
    pub fn inner_mut(&mut self) -> Result<&mut Transaction<'c, Sqlite>> {
        self.tx
            .as_mut()
            .ok_or_else(|| Error::Internal(format!("{}: transaction already consumed", self.caller)))
    }

    fn take(&mut self) -> Result<Transaction<'c, Sqlite>> {
        self.tx
            .take()
            .ok_or_else(|| Error::Internal(format!("{}: transaction already consumed", self.caller)))
    }

    fn log_release(&self, how: &'static str) {
        let held_ms = self.acquired_at.elapsed().as_millis();
        if held_ms > 2000 {
            tracing::warn!(
                caller = self.caller,
                held_ms,
                how,
                "LONG TRANSACTION - Connection held for extended period"
            );
        } else {
            tracing::debug!(caller = self.caller, held_ms, how, "Connection released");
        }
    }
}

impl<'c> Drop for MonitoredTransaction<'c> {
    fn drop(&mut self) {
        // Still holding the transaction here means an error path: sqlx rolls back on drop
        if self.tx.is_some() {
            self.log_release("drop");
        }
    }
}

/// Begin a monitored transaction with connection pool timing logs
pub async fn begin_monitored<'c>(
    pool: &'c sqlx::SqlitePool,
    caller: &'static str,
) -> Result<MonitoredTransaction<'c>> {
    let start = Instant::now();
    let tx = pool.begin().await?;

    let wait_ms = start.elapsed().as_millis();
    if wait_ms > 1000 {
        tracing::warn!(
            caller,
            wait_ms,
            "SLOW CONNECTION ACQUISITION - Pool may be saturated (all connections in use)"
        );
    } else {
        tracing::debug!(caller, wait_ms, "Connection acquired");
    }

    Ok(MonitoredTransaction {
        tx: Some(tx),
        caller,
        acquired_at: Instant::now(),
    })
}
