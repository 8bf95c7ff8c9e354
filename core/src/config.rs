use std::{env, fmt, str::FromStr, time::Duration};

use dotenv::dotenv;
use sqlx::mysql::MySqlConnectOptions;

use crate::batch::confirmation::ConfirmDefault;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3306;
pub const DEFAULT_PRIMARY_KEY: &str = "id";
pub const DEFAULT_READ_BATCH_SIZE: u64 = 10_000;
pub const DEFAULT_WRITE_BATCH_SIZE: usize = 50;
/// MySQL caps a prepared statement at 65535 placeholders.
pub const MAX_WRITE_BATCH_SIZE: usize = 65_535;
pub const PASSWORD_ENV: &str = "MYSQL_PASSWORD";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigurationError {
    #[error("argument -s/--set is required for updates")]
    MissingSetClause,

    #[error("{0} must not be empty")]
    EmptyArgument(&'static str),

    #[error("{0} must be greater than zero")]
    ZeroBatchSize(&'static str),

    #[error("sleep must be a finite, non-negative number of seconds, got {0}")]
    InvalidSleep(f64),

    #[error("write_batch_size can not exceed 65535 (one bound parameter per key), got {0}")]
    WriteBatchTooLarge(usize),

    #[error("invalid action '{0}', expected 'update' or 'delete'")]
    InvalidAction(String),

    #[error("invalid default answer: '{0}', expected 'yes', 'no' or 'none'")]
    InvalidConfirmDefault(String),
}

/// The kind of write requested on the command line, before the SET clause is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionKind {
    #[default]
    Update,
    Delete,
}

impl FromStr for ActionKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "update" => Ok(ActionKind::Update),
            "delete" => Ok(ActionKind::Delete),
            _ => Err(ConfigurationError::InvalidAction(s.to_string())),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Update => write!(f, "update"),
            ActionKind::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteAction {
    Update { set_clause: String },
    Delete,
}

impl WriteAction {
    pub fn from_kind(
        kind: ActionKind,
        set_clause: Option<String>,
    ) -> Result<Self, ConfigurationError> {
        match kind {
            ActionKind::Delete => Ok(WriteAction::Delete),
            ActionKind::Update => match set_clause {
                Some(set_clause) if !set_clause.trim().is_empty() => {
                    Ok(WriteAction::Update { set_clause })
                }
                _ => Err(ConfigurationError::MissingSetClause),
            },
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            WriteAction::Update { .. } => ActionKind::Update,
            WriteAction::Delete => ActionKind::Delete,
        }
    }

    /// Progressive verb used in log lines, e.g. `Updating 50 rows...`.
    pub fn verb(&self) -> &'static str {
        match self {
            WriteAction::Update { .. } => "Updating",
            WriteAction::Delete => "Deleting",
        }
    }
}

/// Everything the batching loop needs to know about one run.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub table: String,
    pub primary_key: String,
    pub where_clause: String,
    pub action: WriteAction,
    pub read_batch_size: u64,
    pub write_batch_size: usize,
    pub sleep: Duration,
    pub no_confirm: bool,
    /// Cursor floor, only keys strictly greater than this are visited.
    pub start_after: i64,
    pub confirm_default: ConfirmDefault,
}

impl BatchConfig {
    pub fn new(table: &str, where_clause: &str, action: WriteAction) -> Self {
        Self {
            table: table.to_string(),
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
            where_clause: where_clause.to_string(),
            action,
            read_batch_size: DEFAULT_READ_BATCH_SIZE,
            write_batch_size: DEFAULT_WRITE_BATCH_SIZE,
            sleep: Duration::ZERO,
            no_confirm: false,
            start_after: 0,
            confirm_default: ConfirmDefault::Yes,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if let WriteAction::Update { set_clause } = &self.action {
            if set_clause.trim().is_empty() {
                return Err(ConfigurationError::MissingSetClause);
            }
        }
        if self.table.trim().is_empty() {
            return Err(ConfigurationError::EmptyArgument("table"));
        }
        if self.primary_key.trim().is_empty() {
            return Err(ConfigurationError::EmptyArgument("primary_key"));
        }
        if self.where_clause.trim().is_empty() {
            return Err(ConfigurationError::EmptyArgument("where"));
        }
        if self.read_batch_size == 0 {
            return Err(ConfigurationError::ZeroBatchSize("read_batch_size"));
        }
        if self.write_batch_size == 0 {
            return Err(ConfigurationError::ZeroBatchSize("write_batch_size"));
        }
        if self.write_batch_size > MAX_WRITE_BATCH_SIZE {
            return Err(ConfigurationError::WriteBatchTooLarge(self.write_batch_size));
        }
        Ok(())
    }
}

pub fn sleep_from_secs(secs: f64) -> Result<Duration, ConfigurationError> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(ConfigurationError::InvalidSleep(secs));
    }
    Ok(Duration::from_secs_f64(secs))
}

#[derive(Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

// Keep the password out of logs.
impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

impl ConnectionConfig {
    pub fn new(user: &str, database: &str) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            user: user.to_string(),
            password: String::new(),
            database: database.to_string(),
        }
    }

    pub fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
            .charset("utf8mb4")
    }
}

/// Password from the environment (or a `.env` file) when none was given on the command line.
pub fn password_from_env() -> Option<String> {
    dotenv().ok();
    env::var(PASSWORD_ENV).ok()
}
