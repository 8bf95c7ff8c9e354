pub mod batch;
pub mod config;
pub mod database;

mod helpers;
pub use helpers::format_duration;

mod logger;
pub use logger::setup_logger;

pub use batch::{
    batch_writer::{BatchWriter, WriteOutcome},
    confirmation::{ConfirmDefault, ConfirmationGate, Prompt, PromptError, TerminalPrompt},
    driver::{run_batches, AbortReason, RunOutcome, RunSummary},
    page_reader::{Page, PageReader},
    BatchError,
};
pub use config::{
    password_from_env, sleep_from_secs, ActionKind, BatchConfig, ConfigurationError,
    ConnectionConfig, WriteAction,
};
pub use database::{
    mysql::client::{MysqlClient, MysqlConnectionError},
    session::{PageQuery, QueryError, Session, WriteStatement},
};

// export 3rd party dependencies
pub use tracing::level_filters::LevelFilter;
