use std::sync::Arc;

use batch_core::{
    BatchError, BatchResult, ExecutionRepository, JobExecution, JobExecutionSummary,
    JobParameter, StepExecution,
};
use batch_domain::JobRegistry;

/// 执行历史的只读查询入口
#[derive(Clone)]
pub struct JobOperator {
    registry: Arc<JobRegistry>,
    repository: Arc<dyn ExecutionRepository>,
}

impl JobOperator {
    pub fn new(registry: Arc<JobRegistry>, repository: Arc<dyn ExecutionRepository>) -> Self {
        Self {
            registry,
            repository,
        }
    }

    pub fn job_names(&self) -> Vec<String> {
        self.registry.job_names()
    }

    pub async fn list_executions(&self) -> BatchResult<Vec<JobExecutionSummary>> {
        self.repository.list_executions().await
    }

    /// 带步骤明细的作业执行
    pub async fn get_execution(&self, execution_id: i64) -> BatchResult<JobExecution> {
        let mut execution = self
            .repository
            .get_execution(execution_id)
            .await?
            .ok_or(BatchError::JobExecutionNotFound { id: execution_id })?;
        execution.step_executions = self.repository.get_step_executions(execution_id).await?;
        Ok(execution)
    }

    pub async fn get_steps(&self, execution_id: i64) -> BatchResult<Vec<StepExecution>> {
        if self.repository.get_execution(execution_id).await?.is_none() {
            return Err(BatchError::JobExecutionNotFound { id: execution_id });
        }
        self.repository.get_step_executions(execution_id).await
    }

    pub async fn get_parameters(&self, instance_id: i64) -> BatchResult<Vec<JobParameter>> {
        if self.repository.get_instance(instance_id).await?.is_none() {
            return Err(BatchError::JobInstanceNotFound { id: instance_id });
        }
        self.repository.get_parameters(instance_id).await
    }
}
