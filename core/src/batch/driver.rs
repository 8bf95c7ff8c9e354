use std::{fmt, time::Duration};

use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::{
    batch::{
        batch_writer::{BatchWriter, WriteOutcome},
        confirmation::{ConfirmationGate, Prompt},
        page_reader::{Page, PageReader},
        BatchError,
    },
    config::{ActionKind, BatchConfig},
    database::session::Session,
    helpers::format_duration,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pages: u64,
    pub batches: u64,
    pub keys_seen: u64,
    pub rows_affected: u64,
    /// Last fully processed key, rerun with this as the floor to resume.
    pub cursor: i64,
    pub elapsed: Duration,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pages, {} batches, {} rows affected, last key {} - took {}",
            self.pages,
            self.batches,
            self.rows_affected,
            self.cursor,
            format_duration(self.elapsed)
        )
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AbortReason {
    #[error("Error: {} declined.", title(.action))]
    Declined { action: ActionKind },

    #[error("{0}")]
    Failed(#[from] BatchError),
}

fn title(action: &ActionKind) -> &'static str {
    match action {
        ActionKind::Update => "Update",
        ActionKind::Delete => "Delete",
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    /// A page read came back empty, every matching row has been written.
    Done(RunSummary),
    Aborted { reason: AbortReason, summary: RunSummary },
}

impl RunOutcome {
    pub fn summary(&self) -> &RunSummary {
        match self {
            RunOutcome::Done(summary) => summary,
            RunOutcome::Aborted { summary, .. } => summary,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, RunOutcome::Done(_))
    }
}

enum RunState {
    Scanning,
    Grouping(Page),
    Writing { page: Page, next_cursor: i64 },
    Done,
    Aborted(AbortReason),
}

struct BatchRun<'a, S: ?Sized> {
    session: &'a mut S,
    reader: PageReader,
    writer: BatchWriter,
    gate: ConfirmationGate<'a>,
    write_batch_size: usize,
    action: ActionKind,
    cursor: i64,
    summary: RunSummary,
}

impl<S: Session + ?Sized> BatchRun<'_, S> {
    async fn step(&mut self, state: RunState) -> RunState {
        match state {
            RunState::Scanning => {
                match self.reader.read_page(&mut *self.session, self.cursor).await {
                    Ok(page) if page.is_empty() => {
                        info!("No more rows to modify!");
                        RunState::Done
                    }
                    Ok(page) => RunState::Grouping(page),
                    Err(e) => RunState::Aborted(e.into()),
                }
            }
            RunState::Grouping(page) => {
                self.summary.pages += 1;
                self.summary.keys_seen += page.len() as u64;
                info!("Preparing to modify {} rows...", page.len());
                match page.max_key() {
                    Some(next_cursor) => RunState::Writing { page, next_cursor },
                    None => RunState::Scanning,
                }
            }
            RunState::Writing { page, next_cursor } => match self.write_page(&page).await {
                Ok(true) => {
                    self.cursor = next_cursor;
                    self.summary.cursor = next_cursor;
                    RunState::Scanning
                }
                Ok(false) => RunState::Aborted(AbortReason::Declined { action: self.action }),
                Err(e) => RunState::Aborted(e.into()),
            },
            terminal => terminal,
        }
    }

    /// Writes every batch of the page in key order. `false` when the operator declined.
    async fn write_page(&mut self, page: &Page) -> Result<bool, BatchError> {
        for batch in page.batches(self.write_batch_size) {
            match self.writer.write_batch(&mut *self.session, &mut self.gate, batch).await? {
                WriteOutcome::Written { rows_affected } => {
                    self.summary.batches += 1;
                    self.summary.rows_affected += rows_affected;
                }
                WriteOutcome::Declined => return Ok(false),
                WriteOutcome::Empty => {}
            }
        }
        Ok(true)
    }
}

/// Runs the scan / group / write loop until a page comes back empty, the operator
/// declines, or a statement fails. The session is closed on every path.
pub async fn run_batches<S: Session + ?Sized>(
    session: &mut S,
    config: &BatchConfig,
    prompt: &mut dyn Prompt,
) -> RunOutcome {
    let started = Instant::now();
    let mut run = BatchRun {
        session,
        reader: PageReader::new(config),
        writer: BatchWriter::new(config),
        gate: ConfirmationGate::new(config.no_confirm, config.confirm_default, prompt),
        write_batch_size: config.write_batch_size,
        action: config.action.kind(),
        cursor: config.start_after,
        summary: RunSummary { cursor: config.start_after, ..Default::default() },
    };

    let mut state = RunState::Scanning;
    let reason = loop {
        state = match state {
            RunState::Done => break None,
            RunState::Aborted(reason) => break Some(reason),
            state => run.step(state).await,
        };
    };

    let close_result = run.session.close().await;
    let mut summary = run.summary;
    summary.elapsed = started.elapsed();

    match (reason, close_result) {
        (None, Ok(())) => RunOutcome::Done(summary),
        (None, Err(e)) => {
            error!("Could not close the database session: {}", e);
            RunOutcome::Aborted { reason: AbortReason::Failed(e.into()), summary }
        }
        (Some(reason), close_result) => {
            if let Err(e) = close_result {
                warn!("Could not close the database session: {}", e);
            }
            RunOutcome::Aborted { reason, summary }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        batch::testing::{MemorySession, ScriptedPrompt, WriteEffect},
        config::WriteAction,
    };

    fn config(action: WriteAction, read_batch_size: u64, write_batch_size: usize) -> BatchConfig {
        let mut config = BatchConfig::new("batch_test", "1=1", action);
        config.read_batch_size = read_batch_size;
        config.write_batch_size = write_batch_size;
        config
    }

    fn update() -> WriteAction {
        WriteAction::Update { set_clause: "date = NOW()".to_string() }
    }

    #[tokio::test]
    async fn test_update_125_rows_in_batches_of_20() {
        let mut config = config(update(), 50, 20);
        config.no_confirm = true;
        let mut session = MemorySession::new(1..=125, WriteEffect::Touch);
        let mut prompt = ScriptedPrompt::new(&[]);

        let outcome = run_batches(&mut session, &config, &mut prompt).await;

        assert!(outcome.is_done());
        // Each page is split on its own, a page's short tail is never topped up from the next.
        let sizes: Vec<usize> = session.writes.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![20, 20, 10, 20, 20, 10, 20, 5]);
        assert_eq!(session.written_keys(), (1..=125).collect::<Vec<i64>>());

        // Pages start after 0, 50, 100 and the final read after 125 comes back empty.
        let cursors: Vec<i64> = session.reads.iter().map(|read| read.cursor).collect();
        assert_eq!(cursors, vec![0, 50, 100, 125]);

        let summary = outcome.summary();
        assert_eq!(summary.pages, 3);
        assert_eq!(summary.batches, 8);
        assert_eq!(summary.rows_affected, 125);
        assert_eq!(summary.cursor, 125);
        assert_eq!(prompt.asked, 0);
        assert!(session.closed);
    }

    #[tokio::test]
    async fn test_declined_delete_writes_nothing() {
        let config = config(WriteAction::Delete, 10_000, 50);
        let mut session = MemorySession::new([1, 2, 3], WriteEffect::Remove);
        let mut prompt = ScriptedPrompt::new(&[false]);

        let outcome = run_batches(&mut session, &config, &mut prompt).await;

        match &outcome {
            RunOutcome::Aborted { reason: AbortReason::Declined { action }, .. } => {
                assert_eq!(*action, ActionKind::Delete);
            }
            other => panic!("expected a declined run, got {:?}", other),
        }
        assert!(session.writes.is_empty());
        assert_eq!(session.rows().len(), 3);
        assert_eq!(outcome.summary().cursor, 0);
        assert!(session.closed);
    }

    #[tokio::test]
    async fn test_confirmation_is_asked_once_per_run() {
        let config = config(update(), 10, 3);
        let mut session = MemorySession::new(1..=25, WriteEffect::Touch);
        let mut prompt = ScriptedPrompt::new(&[true]);

        let outcome = run_batches(&mut session, &config, &mut prompt).await;

        assert!(outcome.is_done());
        assert_eq!(prompt.asked, 1);
        assert_eq!(session.written_keys().len(), 25);
    }

    #[tokio::test]
    async fn test_confirmation_does_not_leak_between_runs() {
        let config = config(update(), 10, 5);
        let mut prompt = ScriptedPrompt::new(&[true, false]);

        let mut first = MemorySession::new(1..=10, WriteEffect::Touch);
        assert!(run_batches(&mut first, &config, &mut prompt).await.is_done());

        let mut second = MemorySession::new(1..=10, WriteEffect::Touch);
        let outcome = run_batches(&mut second, &config, &mut prompt).await;

        assert!(matches!(
            outcome,
            RunOutcome::Aborted { reason: AbortReason::Declined { .. }, .. }
        ));
        assert_eq!(prompt.asked, 2);
        assert!(second.writes.is_empty());
    }

    #[tokio::test]
    async fn test_delete_drains_matching_rows() {
        let mut config = config(WriteAction::Delete, 7, 3);
        config.no_confirm = true;
        let mut session =
            MemorySession::new(1..=40, WriteEffect::Remove).with_predicate(|key| key % 2 == 0);
        let mut prompt = ScriptedPrompt::new(&[]);

        let outcome = run_batches(&mut session, &config, &mut prompt).await;

        assert!(outcome.is_done());
        let remaining: Vec<i64> = session.rows().iter().copied().collect();
        assert_eq!(remaining, (1..=39).step_by(2).collect::<Vec<i64>>());
        assert!(session.writes.iter().all(|batch| !batch.is_empty() && batch.len() <= 3));
        assert_eq!(outcome.summary().rows_affected, 20);
    }

    #[tokio::test]
    async fn test_rows_leaving_the_predicate_are_not_revisited() {
        let mut config = config(update(), 8, 8);
        config.no_confirm = true;
        let mut session = MemorySession::new(1..=30, WriteEffect::Unmatch);
        let mut prompt = ScriptedPrompt::new(&[]);

        let outcome = run_batches(&mut session, &config, &mut prompt).await;

        assert!(outcome.is_done());
        assert_eq!(session.written_keys(), (1..=30).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn test_start_after_seeds_the_cursor() {
        let mut config = config(update(), 100, 50);
        config.no_confirm = true;
        config.start_after = 90;
        let mut session = MemorySession::new(1..=100, WriteEffect::Touch);
        let mut prompt = ScriptedPrompt::new(&[]);

        let outcome = run_batches(&mut session, &config, &mut prompt).await;

        assert!(outcome.is_done());
        assert_eq!(session.written_keys(), (91..=100).collect::<Vec<i64>>());
        assert_eq!(session.reads[0].cursor, 90);
    }

    #[tokio::test]
    async fn test_empty_table_is_done_without_writes() {
        let config = config(WriteAction::Delete, 10, 5);
        let mut session = MemorySession::new([], WriteEffect::Remove);
        let mut prompt = ScriptedPrompt::new(&[]);

        let outcome = run_batches(&mut session, &config, &mut prompt).await;

        assert!(outcome.is_done());
        assert!(session.writes.is_empty());
        assert_eq!(prompt.asked, 0);
        assert_eq!(outcome.summary().pages, 0);
    }

    #[tokio::test]
    async fn test_failed_batch_keeps_cursor_before_the_page() {
        let mut config = config(update(), 10, 4);
        config.no_confirm = true;
        // First page writes batches 0..=2, second page fails on its second batch.
        let mut session = MemorySession::new(1..=20, WriteEffect::Touch).fail_on_write(4);
        let mut prompt = ScriptedPrompt::new(&[]);

        let outcome = run_batches(&mut session, &config, &mut prompt).await;

        match &outcome {
            RunOutcome::Aborted { reason: AbortReason::Failed(BatchError::Query(_)), summary } => {
                assert_eq!(summary.cursor, 10);
                assert_eq!(summary.batches, 4);
            }
            other => panic!("expected a failed run, got {:?}", other),
        }
        assert!(session.closed);
    }

    #[tokio::test]
    async fn test_failed_page_read_is_fatal() {
        let mut config = config(update(), 10, 5);
        config.no_confirm = true;
        let mut session = MemorySession::new(1..=30, WriteEffect::Touch).fail_on_read(1);
        let mut prompt = ScriptedPrompt::new(&[]);

        let outcome = run_batches(&mut session, &config, &mut prompt).await;

        match &outcome {
            RunOutcome::Aborted { reason: AbortReason::Failed(BatchError::Query(_)), summary } => {
                assert_eq!(summary.cursor, 10);
                assert_eq!(summary.pages, 1);
            }
            other => panic!("expected a failed run, got {:?}", other),
        }
        // Not retried, and nothing after the first page was written.
        assert_eq!(session.reads.len(), 1);
        assert_eq!(session.written_keys(), (1..=10).collect::<Vec<i64>>());
        assert!(session.closed);
    }

    #[tokio::test]
    async fn test_first_read_failure_writes_nothing() {
        let mut config = config(WriteAction::Delete, 10, 5);
        config.start_after = 3;
        let mut session = MemorySession::new(1..=30, WriteEffect::Remove).fail_on_read(0);
        let mut prompt = ScriptedPrompt::new(&[]);

        let outcome = run_batches(&mut session, &config, &mut prompt).await;

        assert!(matches!(
            outcome,
            RunOutcome::Aborted { reason: AbortReason::Failed(BatchError::Query(_)), .. }
        ));
        assert_eq!(outcome.summary().cursor, 3);
        assert!(session.writes.is_empty());
        assert_eq!(prompt.asked, 0);
        assert!(session.closed);
    }

    #[tokio::test]
    async fn test_page_not_advancing_aborts() {
        let mut config = config(update(), 10, 10);
        config.no_confirm = true;
        let mut session = MemorySession::new(1..=30, WriteEffect::Touch).ignore_cursor();
        let mut prompt = ScriptedPrompt::new(&[]);

        let outcome = run_batches(&mut session, &config, &mut prompt).await;

        match &outcome {
            RunOutcome::Aborted {
                reason: AbortReason::Failed(BatchError::CursorDidNotAdvance { cursor, .. }),
                summary,
            } => {
                assert_eq!(*cursor, 10);
                assert_eq!(summary.cursor, 10);
            }
            other => panic!("expected a stalled cursor, got {:?}", other),
        }
        assert_eq!(session.written_keys(), (1..=10).collect::<Vec<i64>>());
        assert!(session.closed);
    }

    #[test]
    fn test_declined_message() {
        let reason = AbortReason::Declined { action: ActionKind::Update };
        assert_eq!(reason.to_string(), "Error: Update declined.");
    }
}
