//! 内存执行仓储
//!
//! 所有状态放在同一把锁之后，实例的查找-创建因此天然是原子的。
//! 进程退出即丢失，用于测试和 `--in-memory` 临时运行。

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use batch_core::{
    BatchError, BatchResult, BatchStatus, ExecutionRepository, JobExecution, JobExecutionSummary,
    JobInstance, JobParameter, StepExecution,
};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct State {
    instances: BTreeMap<i64, JobInstance>,
    instance_keys: HashMap<(String, String), i64>,
    parameters: HashMap<i64, Vec<JobParameter>>,
    executions: BTreeMap<i64, JobExecution>,
    steps: BTreeMap<i64, StepExecution>,
    next_instance_id: i64,
    next_execution_id: i64,
    next_step_id: i64,
}

#[derive(Debug, Default)]
pub struct InMemoryExecutionRepository {
    state: Mutex<State>,
}

impl InMemoryExecutionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn instance_count(&self) -> usize {
        self.state.lock().await.instances.len()
    }
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[async_trait]
impl ExecutionRepository for InMemoryExecutionRepository {
    async fn find_instance(
        &self,
        job_name: &str,
        job_key: &str,
    ) -> BatchResult<Option<JobInstance>> {
        let state = self.state.lock().await;
        Ok(state
            .instance_keys
            .get(&(job_name.to_string(), job_key.to_string()))
            .and_then(|id| state.instances.get(id))
            .cloned())
    }

    async fn create_instance_if_absent(
        &self,
        job_name: &str,
        job_key: &str,
        parameters: &[JobParameter],
    ) -> BatchResult<(JobInstance, bool)> {
        let mut state = self.state.lock().await;
        let key = (job_name.to_string(), job_key.to_string());

        if let Some(existing) = state
            .instance_keys
            .get(&key)
            .and_then(|id| state.instances.get(id))
        {
            return Ok((existing.clone(), false));
        }

        let mut instance = JobInstance::new(job_name.to_string(), job_key.to_string());
        instance.id = next_id(&mut state.next_instance_id);

        let mut sorted = parameters.to_vec();
        sorted.sort_by(|a, b| a.key.cmp(&b.key));

        state.instance_keys.insert(key, instance.id);
        state.parameters.insert(instance.id, sorted);
        state.instances.insert(instance.id, instance.clone());
        Ok((instance, true))
    }

    async fn get_instance(&self, instance_id: i64) -> BatchResult<Option<JobInstance>> {
        Ok(self.state.lock().await.instances.get(&instance_id).cloned())
    }

    async fn get_parameters(&self, instance_id: i64) -> BatchResult<Vec<JobParameter>> {
        Ok(self
            .state
            .lock()
            .await
            .parameters
            .get(&instance_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_execution(&self, execution: &JobExecution) -> BatchResult<JobExecution> {
        let mut state = self.state.lock().await;
        if !state.instances.contains_key(&execution.job_instance_id) {
            return Err(BatchError::JobInstanceNotFound {
                id: execution.job_instance_id,
            });
        }

        let mut created = execution.clone();
        created.id = next_id(&mut state.next_execution_id);
        created.step_executions = Vec::new();
        state.executions.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_execution(&self, execution: &JobExecution) -> BatchResult<()> {
        let mut state = self.state.lock().await;
        let stored = state
            .executions
            .get_mut(&execution.id)
            .ok_or(BatchError::JobExecutionNotFound { id: execution.id })?;

        stored.status = execution.status;
        stored.exit_code = execution.exit_code;
        stored.exit_message = execution.exit_message.clone();
        stored.start_time = execution.start_time;
        stored.end_time = execution.end_time;
        Ok(())
    }

    async fn get_execution(&self, execution_id: i64) -> BatchResult<Option<JobExecution>> {
        Ok(self.state.lock().await.executions.get(&execution_id).cloned())
    }

    async fn list_executions(&self) -> BatchResult<Vec<JobExecutionSummary>> {
        Ok(self
            .state
            .lock()
            .await
            .executions
            .values()
            .map(JobExecution::summary)
            .collect())
    }

    async fn create_step_execution(&self, step: &StepExecution) -> BatchResult<StepExecution> {
        let mut state = self.state.lock().await;
        if !state.executions.contains_key(&step.job_execution_id) {
            return Err(BatchError::JobExecutionNotFound {
                id: step.job_execution_id,
            });
        }

        let mut created = step.clone();
        created.id = next_id(&mut state.next_step_id);
        state.steps.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_step_execution(&self, step: &StepExecution) -> BatchResult<()> {
        let mut state = self.state.lock().await;
        let stored = state
            .steps
            .get_mut(&step.id)
            .ok_or(BatchError::StepExecutionNotFound { id: step.id })?;
        *stored = step.clone();
        Ok(())
    }

    async fn get_step_executions(&self, execution_id: i64) -> BatchResult<Vec<StepExecution>> {
        Ok(self
            .state
            .lock()
            .await
            .steps
            .values()
            .filter(|s| s.job_execution_id == execution_id)
            .cloned()
            .collect())
    }

    async fn find_prior_successful_step(
        &self,
        instance_id: i64,
        step_name: &str,
    ) -> BatchResult<Option<StepExecution>> {
        let state = self.state.lock().await;
        Ok(state
            .steps
            .values()
            .rev()
            .find(|s| {
                s.step_name == step_name
                    && s.status == BatchStatus::Completed
                    && state
                        .executions
                        .get(&s.job_execution_id)
                        .is_some_and(|e| e.job_instance_id == instance_id)
            })
            .cloned())
    }
}
