use std::time::Duration;

use async_trait::async_trait;
use sqlx::{mysql::MySqlConnection, ConnectOptions, Connection, Row};
use tokio::time::timeout;
use tracing::{debug, error};

use crate::{
    config::ConnectionConfig,
    database::session::{PageQuery, QueryError, Session, WriteStatement},
};

pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(thiserror::Error, Debug)]
pub enum MysqlConnectionError {
    #[error("MySQL connection failed, please make sure your connection details are correct: {0}")]
    CanNotConnectToDatabase(#[source] sqlx::Error),

    #[error("MySQL connection timed out after {0:?}")]
    ConnectionTimeout(Duration),

    #[error("Connected to MySQL but the health check query failed: {0}")]
    HealthCheckFailed(#[source] sqlx::Error),
}

/// A single MySQL session. Pages and batches run on the same connection, one after another.
pub struct MysqlClient {
    connection: Option<MySqlConnection>,
}

impl MysqlClient {
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, MysqlConnectionError> {
        debug!("Connecting to MySQL with {:?}", config);
        let options = config.connect_options();

        let mut connection = match timeout(CONNECT_TIMEOUT, options.connect()).await {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => {
                error!("Error connecting to database: {}", e);
                return Err(MysqlConnectionError::CanNotConnectToDatabase(e));
            }
            Err(_) => {
                error!("Timeout connecting to database {}:{}", config.host, config.port);
                return Err(MysqlConnectionError::ConnectionTimeout(CONNECT_TIMEOUT));
            }
        };

        sqlx::query("SELECT 1")
            .execute(&mut connection)
            .await
            .map_err(MysqlConnectionError::HealthCheckFailed)?;

        Ok(MysqlClient { connection: Some(connection) })
    }

    fn connection(&mut self) -> Result<&mut MySqlConnection, QueryError> {
        self.connection.as_mut().ok_or(QueryError::SessionClosed)
    }
}

#[async_trait]
impl Session for MysqlClient {
    async fn fetch_keys(&mut self, query: &PageQuery) -> Result<Vec<i64>, QueryError> {
        let connection = self.connection()?;
        let rows = sqlx::query(&query.sql)
            .bind(query.cursor)
            .bind(query.limit)
            .fetch_all(&mut *connection)
            .await?;

        let keys = rows.iter().map(|row| row.try_get::<i64, _>(0)).collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    async fn execute_write(&mut self, statement: &WriteStatement<'_>) -> Result<u64, QueryError> {
        let connection = self.connection()?;
        let mut transaction = connection.begin().await?;

        let mut query = sqlx::query(&statement.sql);
        for key in statement.keys {
            query = query.bind(*key);
        }
        let result = query.execute(&mut *transaction).await?;

        transaction.commit().await?;
        Ok(result.rows_affected())
    }

    async fn close(&mut self) -> Result<(), QueryError> {
        if let Some(connection) = self.connection.take() {
            connection.close().await?;
            debug!("MySQL session closed");
        }
        Ok(())
    }
}
