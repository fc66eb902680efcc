use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use batch_core::{BatchError, BatchResult, DatabaseConfig, ExecutionRepository};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use super::sqlite::SqliteExecutionRepository;

/// SQLite 连接池与表结构管理
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// 创建连接池（启用外键约束和WAL模式）并运行迁移
    pub async fn new(config: &DatabaseConfig) -> BatchResult<Self> {
        info!("创建SQLite数据库连接池: {}", config.url);

        let connect_options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        // 内存库随连接存在，只能保留唯一且常驻的连接
        let pool_options = if config.url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
                .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
        };

        let pool = pool_options
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .connect_with(connect_options)
            .await?;

        let manager = Self { pool };
        manager.migrate().await?;
        Ok(manager)
    }

    /// 连接指定URL，其余连接参数取默认值
    pub async fn connect(url: &str) -> BatchResult<Self> {
        let config = DatabaseConfig {
            url: url.to_string(),
            ..DatabaseConfig::default()
        };
        Self::new(&config).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn execution_repository(&self) -> Arc<dyn ExecutionRepository> {
        Arc::new(SqliteExecutionRepository::new(self.pool.clone()))
    }

    pub async fn health_check(&self) -> BatchResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await
    }

    /// 幂等的建表迁移
    pub async fn migrate(&self) -> BatchResult<()> {
        info!("运行SQLite数据库迁移");

        let statements = [
            (
                "job_instances",
                r#"
                CREATE TABLE IF NOT EXISTS job_instances (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    job_name TEXT NOT NULL,
                    job_key TEXT NOT NULL,
                    created_at DATETIME NOT NULL,
                    UNIQUE (job_name, job_key)
                )
                "#,
            ),
            (
                "job_parameters",
                r#"
                CREATE TABLE IF NOT EXISTS job_parameters (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    job_instance_id INTEGER NOT NULL REFERENCES job_instances(id),
                    key_name TEXT NOT NULL,
                    parameter_type TEXT NOT NULL,
                    value TEXT NOT NULL,
                    UNIQUE (job_instance_id, key_name)
                )
                "#,
            ),
            (
                "job_executions",
                r#"
                CREATE TABLE IF NOT EXISTS job_executions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    job_instance_id INTEGER NOT NULL REFERENCES job_instances(id),
                    job_name TEXT NOT NULL,
                    status TEXT NOT NULL,
                    exit_code TEXT NOT NULL,
                    exit_message TEXT,
                    force_run BOOLEAN NOT NULL DEFAULT 0,
                    created_at DATETIME NOT NULL,
                    start_time DATETIME,
                    end_time DATETIME
                )
                "#,
            ),
            (
                "step_executions",
                r#"
                CREATE TABLE IF NOT EXISTS step_executions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    job_execution_id INTEGER NOT NULL REFERENCES job_executions(id),
                    step_name TEXT NOT NULL,
                    status TEXT NOT NULL,
                    exit_code TEXT NOT NULL,
                    exit_message TEXT,
                    retry_count INTEGER NOT NULL DEFAULT 0,
                    read_count INTEGER,
                    write_count INTEGER,
                    filter_count INTEGER,
                    commit_count INTEGER,
                    process_skip_count INTEGER,
                    start_time DATETIME,
                    end_time DATETIME
                )
                "#,
            ),
        ];

        for (table, statement) in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| BatchError::persistence(format!("创建{table}表失败: {e}")))?;
        }

        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_job_executions_instance ON job_executions(job_instance_id)",
            "CREATE INDEX IF NOT EXISTS idx_step_executions_execution ON step_executions(job_execution_id)",
            "CREATE INDEX IF NOT EXISTS idx_step_executions_name_status ON step_executions(step_name, status)",
            "CREATE INDEX IF NOT EXISTS idx_job_parameters_instance ON job_parameters(job_instance_id)",
        ];
        for statement in indexes {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        info!("数据库迁移完成");
        Ok(())
    }
}
