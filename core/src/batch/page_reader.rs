use tracing::{debug, info};

use crate::{
    batch::BatchError,
    config::BatchConfig,
    database::{
        mysql::query_builder::{build_page_select, render_page_select},
        session::{PageQuery, Session},
    },
};

/// Keys from one page read, strictly increasing and all above the cursor the read used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    keys: Vec<i64>,
}

impl Page {
    pub fn keys(&self) -> &[i64] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Largest key of the page, which is the last one since pages are ordered.
    pub fn max_key(&self) -> Option<i64> {
        self.keys.last().copied()
    }

    /// Contiguous write batches of at most `size` keys, in page order.
    pub fn batches(&self, size: usize) -> std::slice::Chunks<'_, i64> {
        self.keys.chunks(size)
    }
}

pub struct PageReader {
    table: String,
    primary_key: String,
    where_clause: String,
    page_size: u64,
    sql: String,
}

impl PageReader {
    pub fn new(config: &BatchConfig) -> Self {
        PageReader {
            table: config.table.clone(),
            primary_key: config.primary_key.clone(),
            where_clause: config.where_clause.clone(),
            page_size: config.read_batch_size,
            sql: build_page_select(&config.table, &config.primary_key, &config.where_clause),
        }
    }

    /// Reads up to `page_size` keys matching the predicate that are greater than `cursor`.
    /// An empty page means there is nothing left to do.
    pub async fn read_page<S: Session + ?Sized>(
        &self,
        session: &mut S,
        cursor: i64,
    ) -> Result<Page, BatchError> {
        info!("Selecting data...");
        debug!(
            "   query: {}",
            render_page_select(
                &self.table,
                &self.primary_key,
                &self.where_clause,
                cursor,
                self.page_size
            )
        );

        let query = PageQuery { sql: self.sql.clone(), cursor, limit: self.page_size };
        let keys = session.fetch_keys(&query).await?;

        if keys.len() as u64 > self.page_size {
            return Err(BatchError::PageTooLarge {
                returned: keys.len(),
                page_size: self.page_size,
            });
        }

        let mut previous = cursor;
        for &key in &keys {
            if key <= previous {
                return Err(BatchError::CursorDidNotAdvance { cursor, previous, key });
            }
            previous = key;
        }

        Ok(Page { keys })
    }
}
