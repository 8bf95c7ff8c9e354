use clap::Parser;
use mysql_batch::{ActionKind, ConfirmDefault, LevelFilter};

#[allow(clippy::upper_case_acronyms)]
#[derive(Parser, Debug)]
#[clap(
    name = "mysql_batch",
    version,
    about = "Run large MySQL UPDATE and DELETE queries with small batches to prevent table/row-level locks",
    long_about = None
)]
pub struct CLI {
    /// MySQL server host
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// MySQL server port
    #[clap(short = 'P', long, default_value_t = 3306)]
    pub port: u16,

    /// MySQL user
    #[clap(short = 'U', long)]
    pub user: String,

    /// MySQL password, falls back to MYSQL_PASSWORD (also read from a .env file)
    #[clap(short = 'p', long)]
    pub password: Option<String>,

    /// MySQL database name
    #[clap(short, long)]
    pub database: String,

    /// MySQL table
    #[clap(short, long)]
    pub table: String,

    /// Name of the primary key column
    #[clap(long = "primary_key", visible_alias = "id", alias = "primary-key", default_value = "id")]
    pub primary_key: String,

    /// Select WHERE clause
    #[clap(short, long = "where")]
    pub where_clause: String,

    /// Update SET clause, required for updates
    #[clap(short, long = "set")]
    pub set_clause: Option<String>,

    /// Select batch size
    #[clap(long = "read_batch_size", alias = "read-batch-size", default_value_t = 10_000)]
    pub read_batch_size: u64,

    /// Update/delete batch size
    #[clap(long = "write_batch_size", alias = "write-batch-size", default_value_t = 50)]
    pub write_batch_size: usize,

    /// Sleep after each batch, in seconds
    #[clap(short = 'S', long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub sleep: f64,

    /// Action ('update' or 'delete')
    #[clap(short, long, default_value = "update")]
    pub action: ActionKind,

    /// Don't ask for confirmation before running the write queries
    #[clap(short, long = "no_confirm", alias = "no-confirm")]
    pub no_confirm: bool,

    /// Only process keys greater than this one, e.g. to resume an interrupted run
    #[clap(
        long = "start_after",
        alias = "start-after",
        default_value_t = 0,
        allow_negative_numbers = true
    )]
    pub start_after: i64,

    /// Answer assumed when the confirmation prompt gets an empty line ('yes', 'no' or 'none')
    #[clap(long = "confirm_default", alias = "confirm-default", default_value = "yes")]
    pub confirm_default: ConfirmDefault,

    /// Log level (trace, debug, info, warn, error)
    #[clap(long = "log_level", alias = "log-level", default_value = "info")]
    pub log_level: LevelFilter,
}
