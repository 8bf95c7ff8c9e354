use async_trait::async_trait;

#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error("Query failed: {0}")]
    MysqlError(#[from] sqlx::Error),

    #[error("The database session has already been closed")]
    SessionClosed,
}

/// One page read: `sql` carries two placeholders, the cursor and the limit.
#[derive(Debug, Clone)]
pub struct PageQuery {
    pub sql: String,
    pub cursor: i64,
    pub limit: u64,
}

/// One batch write: `sql` carries exactly one placeholder per key.
#[derive(Debug, Clone)]
pub struct WriteStatement<'a> {
    pub sql: String,
    pub keys: &'a [i64],
}

/// The single database session a run owns. Used strictly sequentially.
#[async_trait]
pub trait Session: Send {
    /// Returns the key column of every row the page query selects, in result order.
    async fn fetch_keys(&mut self, query: &PageQuery) -> Result<Vec<i64>, QueryError>;

    /// Executes and commits the statement as its own unit, returning rows affected.
    async fn execute_write(&mut self, statement: &WriteStatement<'_>) -> Result<u64, QueryError>;

    async fn close(&mut self) -> Result<(), QueryError>;
}
