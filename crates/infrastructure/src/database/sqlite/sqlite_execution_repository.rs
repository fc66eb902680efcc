use async_trait::async_trait;
use batch_core::{
    BatchError, BatchResult, ChunkMetrics, ExecutionRepository, JobExecution,
    JobExecutionSummary, JobInstance, JobParameter, ParameterType, ParameterValue, StepExecution,
};
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

const STEP_COLUMNS: &str = "id, job_execution_id, step_name, status, exit_code, exit_message, \
     retry_count, read_count, write_count, filter_count, commit_count, process_skip_count, \
     start_time, end_time";

const EXECUTION_COLUMNS: &str = "id, job_instance_id, job_name, status, exit_code, exit_message, \
     force_run, created_at, start_time, end_time";

pub struct SqliteExecutionRepository {
    pool: SqlitePool,
}

impl SqliteExecutionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_instance(row: &sqlx::sqlite::SqliteRow) -> BatchResult<JobInstance> {
        Ok(JobInstance {
            id: row.try_get("id")?,
            job_name: row.try_get("job_name")?,
            job_key: row.try_get("job_key")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_execution(row: &sqlx::sqlite::SqliteRow) -> BatchResult<JobExecution> {
        Ok(JobExecution {
            id: row.try_get("id")?,
            job_instance_id: row.try_get("job_instance_id")?,
            job_name: row.try_get("job_name")?,
            status: row.try_get("status")?,
            exit_code: row.try_get("exit_code")?,
            exit_message: row.try_get("exit_message")?,
            force: row.try_get("force_run")?,
            created_at: row.try_get("created_at")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            step_executions: Vec::new(),
        })
    }

    fn row_to_summary(row: &sqlx::sqlite::SqliteRow) -> BatchResult<JobExecutionSummary> {
        Ok(JobExecutionSummary {
            id: row.try_get("id")?,
            job_instance_id: row.try_get("job_instance_id")?,
            job_name: row.try_get("job_name")?,
            status: row.try_get("status")?,
            exit_code: row.try_get("exit_code")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
        })
    }

    fn row_to_step(row: &sqlx::sqlite::SqliteRow) -> BatchResult<StepExecution> {
        // 简单步骤的计数列为 NULL
        let read_count: Option<i64> = row.try_get("read_count")?;
        let metrics = match read_count {
            Some(read_count) => Some(ChunkMetrics {
                read_count,
                write_count: row.try_get("write_count")?,
                filter_count: row.try_get("filter_count")?,
                commit_count: row.try_get("commit_count")?,
                process_skip_count: row.try_get("process_skip_count")?,
            }),
            None => None,
        };

        Ok(StepExecution {
            id: row.try_get("id")?,
            job_execution_id: row.try_get("job_execution_id")?,
            step_name: row.try_get("step_name")?,
            status: row.try_get("status")?,
            exit_code: row.try_get("exit_code")?,
            exit_message: row.try_get("exit_message")?,
            retry_count: row.try_get("retry_count")?,
            metrics,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
        })
    }

    fn row_to_parameter(row: &sqlx::sqlite::SqliteRow) -> BatchResult<JobParameter> {
        let key: String = row.try_get("key_name")?;
        let parameter_type: String = row.try_get("parameter_type")?;
        let value: String = row.try_get("value")?;
        let parameter_type: ParameterType = parameter_type.parse()?;
        Ok(JobParameter::new(
            key,
            ParameterValue::from_canonical(parameter_type, &value)?,
        ))
    }
}

#[async_trait]
impl ExecutionRepository for SqliteExecutionRepository {
    async fn find_instance(
        &self,
        job_name: &str,
        job_key: &str,
    ) -> BatchResult<Option<JobInstance>> {
        let row = sqlx::query(
            "SELECT id, job_name, job_key, created_at FROM job_instances WHERE job_name = ? AND job_key = ?",
        )
        .bind(job_name)
        .bind(job_key)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_instance).transpose()
    }

    #[instrument(skip(self, parameters), fields(job_name = %job_name))]
    async fn create_instance_if_absent(
        &self,
        job_name: &str,
        job_key: &str,
        parameters: &[JobParameter],
    ) -> BatchResult<(JobInstance, bool)> {
        let mut tx = self.pool.begin().await?;
        let created_at = Utc::now();

        // UNIQUE(job_name, job_key) 保证并发插入只有一方成功
        let result = sqlx::query(
            r#"
            INSERT INTO job_instances (job_name, job_key, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT (job_name, job_key) DO NOTHING
            "#,
        )
        .bind(job_name)
        .bind(job_key)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 1 {
            let id = result.last_insert_rowid();
            for parameter in parameters {
                sqlx::query(
                    "INSERT INTO job_parameters (job_instance_id, key_name, parameter_type, value) VALUES (?, ?, ?, ?)",
                )
                .bind(id)
                .bind(&parameter.key)
                .bind(parameter.parameter_type().as_str())
                .bind(parameter.value.canonical())
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;

            debug!("创建作业实例成功: ID {}", id);
            return Ok((
                JobInstance {
                    id,
                    job_name: job_name.to_string(),
                    job_key: job_key.to_string(),
                    created_at,
                },
                true,
            ));
        }

        tx.rollback().await?;
        let existing = self.find_instance(job_name, job_key).await?.ok_or_else(|| {
            BatchError::persistence(format!("作业实例冲突后未能读取: {job_name}"))
        })?;
        Ok((existing, false))
    }

    async fn get_instance(&self, instance_id: i64) -> BatchResult<Option<JobInstance>> {
        let row = sqlx::query("SELECT id, job_name, job_key, created_at FROM job_instances WHERE id = ?")
            .bind(instance_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_instance).transpose()
    }

    async fn get_parameters(&self, instance_id: i64) -> BatchResult<Vec<JobParameter>> {
        let rows = sqlx::query(
            "SELECT key_name, parameter_type, value FROM job_parameters WHERE job_instance_id = ? ORDER BY key_name",
        )
        .bind(instance_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_parameter).collect()
    }

    #[instrument(skip(self, execution), fields(
        job_instance_id = %execution.job_instance_id,
        status = %execution.status,
    ))]
    async fn create_execution(&self, execution: &JobExecution) -> BatchResult<JobExecution> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO job_executions (job_instance_id, job_name, status, exit_code, exit_message,
                                        force_run, created_at, start_time, end_time)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {EXECUTION_COLUMNS}
            "#
        ))
        .bind(execution.job_instance_id)
        .bind(&execution.job_name)
        .bind(execution.status)
        .bind(execution.exit_code)
        .bind(&execution.exit_message)
        .bind(execution.force)
        .bind(execution.created_at)
        .bind(execution.start_time)
        .bind(execution.end_time)
        .fetch_one(&self.pool)
        .await?;

        let created = Self::row_to_execution(&row)?;
        debug!("创建作业执行成功: ID {}", created.id);
        Ok(created)
    }

    #[instrument(skip(self, execution), fields(
        execution_id = %execution.id,
        status = %execution.status,
    ))]
    async fn update_execution(&self, execution: &JobExecution) -> BatchResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE job_executions
            SET status = ?, exit_code = ?, exit_message = ?, start_time = ?, end_time = ?
            WHERE id = ?
            "#,
        )
        .bind(execution.status)
        .bind(execution.exit_code)
        .bind(&execution.exit_message)
        .bind(execution.start_time)
        .bind(execution.end_time)
        .bind(execution.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BatchError::JobExecutionNotFound { id: execution.id });
        }

        debug!("更新作业执行成功: ID {}", execution.id);
        Ok(())
    }

    async fn get_execution(&self, execution_id: i64) -> BatchResult<Option<JobExecution>> {
        let row = sqlx::query(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM job_executions WHERE id = ?"
        ))
        .bind(execution_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_execution).transpose()
    }

    async fn list_executions(&self) -> BatchResult<Vec<JobExecutionSummary>> {
        let rows = sqlx::query(
            "SELECT id, job_instance_id, job_name, status, exit_code, start_time, end_time FROM job_executions ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_summary).collect()
    }

    #[instrument(skip(self, step), fields(
        job_execution_id = %step.job_execution_id,
        step_name = %step.step_name,
        status = %step.status,
    ))]
    async fn create_step_execution(&self, step: &StepExecution) -> BatchResult<StepExecution> {
        let metrics = step.metrics;
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO step_executions (job_execution_id, step_name, status, exit_code, exit_message,
                                         retry_count, read_count, write_count, filter_count,
                                         commit_count, process_skip_count, start_time, end_time)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {STEP_COLUMNS}
            "#
        ))
        .bind(step.job_execution_id)
        .bind(&step.step_name)
        .bind(step.status)
        .bind(step.exit_code)
        .bind(&step.exit_message)
        .bind(step.retry_count)
        .bind(metrics.map(|m| m.read_count))
        .bind(metrics.map(|m| m.write_count))
        .bind(metrics.map(|m| m.filter_count))
        .bind(metrics.map(|m| m.commit_count))
        .bind(metrics.map(|m| m.process_skip_count))
        .bind(step.start_time)
        .bind(step.end_time)
        .fetch_one(&self.pool)
        .await?;

        let created = Self::row_to_step(&row)?;
        debug!("创建步骤执行成功: ID {}", created.id);
        Ok(created)
    }

    #[instrument(skip(self, step), fields(
        step_execution_id = %step.id,
        status = %step.status,
    ))]
    async fn update_step_execution(&self, step: &StepExecution) -> BatchResult<()> {
        let metrics = step.metrics;
        let result = sqlx::query(
            r#"
            UPDATE step_executions
            SET status = ?, exit_code = ?, exit_message = ?, retry_count = ?,
                read_count = ?, write_count = ?, filter_count = ?, commit_count = ?,
                process_skip_count = ?, start_time = ?, end_time = ?
            WHERE id = ?
            "#,
        )
        .bind(step.status)
        .bind(step.exit_code)
        .bind(&step.exit_message)
        .bind(step.retry_count)
        .bind(metrics.map(|m| m.read_count))
        .bind(metrics.map(|m| m.write_count))
        .bind(metrics.map(|m| m.filter_count))
        .bind(metrics.map(|m| m.commit_count))
        .bind(metrics.map(|m| m.process_skip_count))
        .bind(step.start_time)
        .bind(step.end_time)
        .bind(step.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BatchError::StepExecutionNotFound { id: step.id });
        }

        debug!("更新步骤执行成功: ID {}", step.id);
        Ok(())
    }

    async fn get_step_executions(&self, execution_id: i64) -> BatchResult<Vec<StepExecution>> {
        let rows = sqlx::query(&format!(
            "SELECT {STEP_COLUMNS} FROM step_executions WHERE job_execution_id = ? ORDER BY id"
        ))
        .bind(execution_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_step).collect()
    }

    async fn find_prior_successful_step(
        &self,
        instance_id: i64,
        step_name: &str,
    ) -> BatchResult<Option<StepExecution>> {
        let row = sqlx::query(
            r#"
            SELECT se.id, se.job_execution_id, se.step_name, se.status, se.exit_code, se.exit_message,
                   se.retry_count, se.read_count, se.write_count, se.filter_count, se.commit_count,
                   se.process_skip_count, se.start_time, se.end_time
            FROM step_executions se
            JOIN job_executions je ON se.job_execution_id = je.id
            WHERE je.job_instance_id = ? AND se.step_name = ? AND se.status = 'COMPLETED'
            ORDER BY se.id DESC
            LIMIT 1
            "#,
        )
        .bind(instance_id)
        .bind(step_name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_step).transpose()
    }
}
