pub mod batch_writer;
pub mod confirmation;
pub mod driver;
pub mod page_reader;

#[cfg(test)]
pub(crate) mod testing;

use crate::database::session::QueryError;

#[derive(thiserror::Error, Debug)]
pub enum BatchError {
    #[error("{0}")]
    Query(#[from] QueryError),

    #[error("Could not read the confirmation answer: {0}")]
    Prompt(#[from] confirmation::PromptError),

    #[error("Page read did not advance past cursor {cursor}: got key {key} after {previous}, keyset paging requires a unique, ordered integer key")]
    CursorDidNotAdvance { cursor: i64, previous: i64, key: i64 },

    #[error("Page read returned {returned} keys but the page size is {page_size}")]
    PageTooLarge { returned: usize, page_size: u64 },
}
