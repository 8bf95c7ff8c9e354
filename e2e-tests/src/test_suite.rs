use anyhow::{Context, Result};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use crate::docker::{self, MYSQL_DATABASE, MYSQL_ROOT_PASSWORD};
use crate::mysql_batch_client::MysqlBatchInstance;
use crate::tests::test_runner::SkipTest;

static TABLE_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A MySQL container shared by every test in one suite run.
#[derive(Debug, Clone)]
pub struct MysqlServer {
    pub container_name: String,
    pub port: u16,
}

impl MysqlServer {
    pub async fn start() -> Result<Self> {
        let (container_name, port) = docker::start_mysql_container().await?;
        info!("MySQL container {} listening on port {}", container_name, port);
        Ok(Self { container_name, port })
    }

    pub async fn stop(&self) {
        let _ = docker::stop_mysql_container(&self.container_name).await;
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host("127.0.0.1")
            .port(self.port)
            .username("root")
            .password(MYSQL_ROOT_PASSWORD)
            .database(MYSQL_DATABASE)
    }

    /// The first start of a fresh container initialises the data directory before logins work.
    async fn connect(&self) -> Result<MySqlPool> {
        let mut last_error = None;
        for _ in 0..120 {
            match MySqlPoolOptions::new()
                .max_connections(2)
                .connect_with(self.connect_options())
                .await
            {
                Ok(pool) => return Ok(pool),
                Err(e) => last_error = Some(e),
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        Err(anyhow::anyhow!("MySQL did not accept connections: {:?}", last_error))
    }
}

/// Per-test context: its own table, so tests never see each other's rows.
pub struct TestContext {
    pub mysql_batch_binary: String,
    pub server: Option<MysqlServer>,
    pub pool: Option<MySqlPool>,
    pub table: String,
}

impl TestContext {
    pub async fn new(mysql_batch_binary: String, server: Option<MysqlServer>) -> Result<Self> {
        let table = format!(
            "batch_test_{}_{}",
            std::process::id(),
            TABLE_COUNTER.fetch_add(1, Ordering::SeqCst)
        );

        let pool = match &server {
            Some(server) => Some(server.connect().await?),
            None => None,
        };

        Ok(Self { mysql_batch_binary, server, pool, table })
    }

    /// The database pool, or a skip when no MySQL container could be started.
    pub fn db(&self) -> Result<&MySqlPool> {
        self.pool.as_ref().ok_or_else(|| SkipTest("Docker/MySQL not available".to_string()).into())
    }

    fn port(&self) -> Result<u16> {
        self.server
            .as_ref()
            .map(|s| s.port)
            .ok_or_else(|| SkipTest("Docker/MySQL not available".to_string()).into())
    }

    /// Creates the test table with `rows` rows, ids 1..=rows and every `date` NULL.
    pub async fn create_batch_table(&self, rows: usize) -> Result<()> {
        let pool = self.db()?;

        sqlx::query(&format!(
            "CREATE TABLE {} (id INT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY, date DATETIME NULL)",
            self.table
        ))
        .execute(pool)
        .await
        .context("Failed to create test table")?;

        if rows > 0 {
            let values = vec!["(NULL)"; rows].join(", ");
            sqlx::query(&format!("INSERT INTO {} (date) VALUES {}", self.table, values))
                .execute(pool)
                .await
                .context("Failed to seed test table")?;
        }

        info!("Seeded {} with {} rows", self.table, rows);
        Ok(())
    }

    pub async fn execute(&self, sql: &str) -> Result<u64> {
        let result = sqlx::query(sql).execute(self.db()?).await?;
        Ok(result.rows_affected())
    }

    pub async fn count_where(&self, predicate: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {} WHERE {}", self.table, predicate))
                .fetch_one(self.db()?)
                .await?;
        Ok(count)
    }

    /// The binary with connection flags for the test server and this test's table.
    /// The password travels through MYSQL_PASSWORD.
    pub fn mysql_batch(&self) -> Result<MysqlBatchInstance> {
        let port = self.port()?.to_string();
        Ok(MysqlBatchInstance::new(&self.mysql_batch_binary)
            .args(["-H", "127.0.0.1", "-P", port.as_str(), "-U", "root", "-d", MYSQL_DATABASE])
            .args(["-t", self.table.as_str()])
            .with_env("MYSQL_PASSWORD", MYSQL_ROOT_PASSWORD))
    }

    pub async fn cleanup(&self) -> Result<()> {
        if let Some(pool) = &self.pool {
            if let Err(e) =
                sqlx::query(&format!("DROP TABLE IF EXISTS {}", self.table)).execute(pool).await
            {
                warn!("Failed to drop {}: {}", self.table, e);
            }
            pool.close().await;
        }
        Ok(())
    }
}
