pub mod mapping;
pub mod migrations;
pub mod sqlite;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::debug;

use shiftplan_config::DatabaseConfig;
use shiftplan_errors::PlanningResult;

pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// 按配置创建 SQLite 连接池，启用外键约束和 WAL 模式
    pub async fn new(config: &DatabaseConfig) -> PlanningResult<Self> {
        debug!("Connecting SQLite database at: {}", config.url);

        let connect_options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect_with(connect_options)
            .await?;

        Ok(Self { pool })
    }

    /// 内存库：单连接池，集成测试用
    pub async fn new_in_memory() -> PlanningResult<Self> {
        let connect_options =
            SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> PlanningResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub async fn health_check(&self) -> PlanningResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
