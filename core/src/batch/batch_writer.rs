use std::time::Duration;

use tracing::{debug, info, warn};

use crate::{
    batch::{confirmation::ConfirmationGate, BatchError},
    config::{BatchConfig, WriteAction},
    database::{
        mysql::query_builder::{build_write_statement, render_write_statement},
        session::{Session, WriteStatement},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Committed. The count is informational, rows changed under us are not an error.
    Written { rows_affected: u64 },
    /// The operator answered "no" and nothing was executed.
    Declined,
    /// Nothing to write.
    Empty,
}

pub struct BatchWriter {
    table: String,
    primary_key: String,
    action: WriteAction,
    sleep: Duration,
}

impl BatchWriter {
    pub fn new(config: &BatchConfig) -> Self {
        BatchWriter {
            table: config.table.clone(),
            primary_key: config.primary_key.clone(),
            action: config.action.clone(),
            sleep: config.sleep,
        }
    }

    fn question(&self) -> &'static str {
        match self.action {
            WriteAction::Update { .. } => "* Start updating?",
            WriteAction::Delete => "* Start deleting?",
        }
    }

    /// Writes one batch restricted to exactly `keys`, asking for confirmation first
    /// if the run has not been approved yet.
    pub async fn write_batch<S: Session + ?Sized>(
        &self,
        session: &mut S,
        gate: &mut ConfirmationGate<'_>,
        keys: &[i64],
    ) -> Result<WriteOutcome, BatchError> {
        if keys.is_empty() {
            return Ok(WriteOutcome::Empty);
        }

        info!("{} {} rows...", self.action.verb(), keys.len());
        info!(
            "   query: {}",
            render_write_statement(&self.action, &self.table, &self.primary_key, keys)
        );

        if !gate.confirm(self.question())? {
            warn!("{} declined by operator", self.action.kind());
            return Ok(WriteOutcome::Declined);
        }

        let statement = WriteStatement {
            sql: build_write_statement(&self.action, &self.table, &self.primary_key, keys.len()),
            keys,
        };
        let rows_affected = session.execute_write(&statement).await?;
        debug!("{} rows affected", rows_affected);

        if !self.sleep.is_zero() {
            tokio::time::sleep(self.sleep).await;
        }

        Ok(WriteOutcome::Written { rows_affected })
    }
}
