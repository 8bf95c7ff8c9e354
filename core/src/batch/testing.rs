use std::{collections::BTreeSet, ops::Bound};

use async_trait::async_trait;

use crate::{
    batch::confirmation::{ConfirmDefault, Prompt, PromptError},
    database::session::{PageQuery, QueryError, Session, WriteStatement},
};

/// Answers from a fixed script and counts how often it was asked. Runs out as "no".
pub(crate) struct ScriptedPrompt {
    answers: Vec<bool>,
    pub asked: usize,
}

impl ScriptedPrompt {
    pub(crate) fn new(answers: &[bool]) -> Self {
        Self { answers: answers.iter().rev().copied().collect(), asked: 0 }
    }
}

impl Prompt for ScriptedPrompt {
    fn ask_yes_no(&mut self, _: &str, _: ConfirmDefault) -> Result<bool, PromptError> {
        self.asked += 1;
        Ok(self.answers.pop().unwrap_or(false))
    }
}

/// How a write changes the rows it touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteEffect {
    /// Rows stay and keep matching the predicate.
    Touch,
    /// Rows stay but stop matching, e.g. `SET date = NOW()` with `WHERE date IS NULL`.
    Unmatch,
    Remove,
}

/// In-memory table that answers page reads by key and records every statement.
pub(crate) struct MemorySession {
    rows: BTreeSet<i64>,
    matching: fn(i64) -> bool,
    unmatched: BTreeSet<i64>,
    effect: WriteEffect,
    fail_on_write: Option<usize>,
    fail_on_read: Option<usize>,
    ignore_cursor: bool,
    pub reads: Vec<PageQuery>,
    pub writes: Vec<Vec<i64>>,
    pub write_sql: Vec<String>,
    pub closed: bool,
}

impl MemorySession {
    pub(crate) fn new(rows: impl IntoIterator<Item = i64>, effect: WriteEffect) -> Self {
        Self {
            rows: rows.into_iter().collect(),
            matching: |_| true,
            unmatched: BTreeSet::new(),
            effect,
            fail_on_write: None,
            fail_on_read: None,
            ignore_cursor: false,
            reads: Vec::new(),
            writes: Vec::new(),
            write_sql: Vec::new(),
            closed: false,
        }
    }

    pub(crate) fn with_predicate(mut self, matching: fn(i64) -> bool) -> Self {
        self.matching = matching;
        self
    }

    /// Fails the n-th write statement (0-based) with a query error.
    pub(crate) fn fail_on_write(mut self, index: usize) -> Self {
        self.fail_on_write = Some(index);
        self
    }

    /// Fails the n-th page read (0-based) with a query error.
    pub(crate) fn fail_on_read(mut self, index: usize) -> Self {
        self.fail_on_read = Some(index);
        self
    }

    /// Answers every read from the start of the table, like a key column that does not order.
    pub(crate) fn ignore_cursor(mut self) -> Self {
        self.ignore_cursor = true;
        self
    }

    pub(crate) fn rows(&self) -> &BTreeSet<i64> {
        &self.rows
    }

    pub(crate) fn written_keys(&self) -> Vec<i64> {
        self.writes.iter().flatten().copied().collect()
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn fetch_keys(&mut self, query: &PageQuery) -> Result<Vec<i64>, QueryError> {
        if self.closed {
            return Err(QueryError::SessionClosed);
        }
        if self.fail_on_read == Some(self.reads.len()) {
            return Err(QueryError::MysqlError(sqlx::Error::Protocol(
                "Lost connection to MySQL server during query".to_string(),
            )));
        }
        self.reads.push(query.clone());

        let limit = usize::try_from(query.limit).unwrap_or(usize::MAX);
        let lower =
            if self.ignore_cursor { Bound::Unbounded } else { Bound::Excluded(query.cursor) };
        Ok(self
            .rows
            .range((lower, Bound::Unbounded))
            .copied()
            .filter(|key| (self.matching)(*key) && !self.unmatched.contains(key))
            .take(limit)
            .collect())
    }

    async fn execute_write(&mut self, statement: &WriteStatement<'_>) -> Result<u64, QueryError> {
        if self.closed {
            return Err(QueryError::SessionClosed);
        }
        if self.fail_on_write == Some(self.writes.len()) {
            return Err(QueryError::MysqlError(sqlx::Error::Protocol(
                "Lock wait timeout exceeded".to_string(),
            )));
        }
        self.writes.push(statement.keys.to_vec());
        self.write_sql.push(statement.sql.clone());

        let mut affected = 0;
        for key in statement.keys {
            if !self.rows.contains(key) {
                continue;
            }
            affected += 1;
            match self.effect {
                WriteEffect::Touch => {}
                WriteEffect::Unmatch => {
                    self.unmatched.insert(*key);
                }
                WriteEffect::Remove => {
                    self.rows.remove(key);
                }
            }
        }
        Ok(affected)
    }

    async fn close(&mut self) -> Result<(), QueryError> {
        self.closed = true;
        Ok(())
    }
}
