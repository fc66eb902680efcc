//! 作业启动器：单次执行的状态机
//!
//! ```text
//! resolve instance -> JobExecution STARTING -> STARTED
//!   for step in job.steps:
//!     prior COMPLETED && !force  -> StepExecution COMPLETED (NOOP)
//!     else retry(step)           -> COMPLETED | FAILED (停止后续步骤)
//! -> JobExecution COMPLETED | FAILED
//! ```
//!
//! 每次状态转换都先持久化再继续。步骤逻辑的失败只体现在执行记录中，
//! 持久化错误直接返回给调用方。

use std::sync::Arc;

use batch_core::{
    BatchResult, BatchStatus, ChunkMetrics, EngineConfig, ExecutionRepository, JobExecution,
    JobInstance, StepExecution,
};
use batch_domain::{Job, JobParameters, JobRegistry, Step, StepContext, StepKind};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::metrics;
use crate::resolver::JobInstanceResolver;
use crate::retry::RetryPolicy;

#[derive(Clone)]
pub struct JobLauncher {
    registry: Arc<JobRegistry>,
    repository: Arc<dyn ExecutionRepository>,
    resolver: JobInstanceResolver,
    config: EngineConfig,
}

impl JobLauncher {
    pub fn new(registry: Arc<JobRegistry>, repository: Arc<dyn ExecutionRepository>) -> Self {
        Self::with_config(registry, repository, EngineConfig::default())
    }

    pub fn with_config(
        registry: Arc<JobRegistry>,
        repository: Arc<dyn ExecutionRepository>,
        config: EngineConfig,
    ) -> Self {
        Self {
            resolver: JobInstanceResolver::new(repository.clone()),
            registry,
            repository,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// 启动作业并等待其结束
    ///
    /// 作业未注册或参数非法时，在创建任何执行记录之前返回错误。
    pub async fn launch<I, K, V>(
        &self,
        job_name: &str,
        raw_parameters: I,
        force: bool,
    ) -> BatchResult<JobExecution>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let job = self.registry.lookup(job_name)?;
        let parameters = JobParameters::from_raw(raw_parameters)?;
        self.run(job, parameters, force).await
    }

    /// 在运行时上后台启动，立即返回任务句柄
    pub fn launch_detached(
        &self,
        job_name: String,
        raw_parameters: Vec<(String, String)>,
        force: bool,
    ) -> JoinHandle<BatchResult<JobExecution>> {
        let launcher = self.clone();
        tokio::spawn(async move {
            let result = launcher.launch(&job_name, raw_parameters, force).await;
            if let Err(e) = &result {
                error!("后台启动作业 {} 失败: {}", job_name, e);
            }
            result
        })
    }

    #[instrument(skip_all, fields(job = %job.name, force))]
    async fn run(
        &self,
        job: Arc<Job>,
        parameters: JobParameters,
        force: bool,
    ) -> BatchResult<JobExecution> {
        let (instance, created) = self.resolver.resolve(&job.name, &parameters).await?;

        let mut execution = self
            .repository
            .create_execution(&JobExecution::new(instance.id, job.name.clone(), force))
            .await?;
        execution.update_status(BatchStatus::Started);
        self.repository.update_execution(&execution).await?;

        info!(
            "作业 {} 开始执行: 执行 {}, 实例 {}{}",
            job.name,
            execution.id,
            instance.id,
            if created { " (新实例)" } else { "" }
        );

        let parameters = Arc::new(parameters);
        let mut step_executions = Vec::with_capacity(job.steps.len());
        let mut failure = None;

        for step in &job.steps {
            let step_execution = if force {
                self.execute_step(&job, &instance, &execution, step, &parameters)
                    .await?
            } else {
                match self
                    .repository
                    .find_prior_successful_step(instance.id, &step.name)
                    .await?
                {
                    Some(prior) => self.skip_step(&job, &execution, &prior).await?,
                    None => {
                        self.execute_step(&job, &instance, &execution, step, &parameters)
                            .await?
                    }
                }
            };

            let failed = step_execution.status == BatchStatus::Failed;
            if failed {
                failure = Some(format!(
                    "步骤 {} 失败: {}",
                    step.name,
                    step_execution.exit_message.as_deref().unwrap_or("未知错误")
                ));
            }
            step_executions.push(step_execution);
            if failed {
                break;
            }
        }

        match failure {
            Some(message) => {
                execution.update_status(BatchStatus::Failed);
                execution.exit_message = Some(message);
            }
            None => {
                execution.update_status(BatchStatus::Completed);
            }
        }
        self.repository.update_execution(&execution).await?;
        metrics::record_job_execution(&job.name, execution.status);

        match execution.status {
            BatchStatus::Completed => info!(
                "作业 {} 执行 {} 完成，耗时 {}ms",
                job.name,
                execution.id,
                execution.execution_duration_ms().unwrap_or_default()
            ),
            _ => warn!(
                "作业 {} 执行 {} 失败: {}",
                job.name,
                execution.id,
                execution.exit_message.as_deref().unwrap_or_default()
            ),
        }

        execution.step_executions = step_executions;
        Ok(execution)
    }

    async fn skip_step(
        &self,
        job: &Job,
        execution: &JobExecution,
        prior: &StepExecution,
    ) -> BatchResult<StepExecution> {
        let skipped = self
            .repository
            .create_step_execution(&StepExecution::skipped_from(execution.id, prior))
            .await?;
        info!(
            "步骤 {} 已在步骤执行 {} 中完成，跳过",
            skipped.step_name, prior.id
        );
        metrics::record_step_execution(&job.name, &skipped);
        Ok(skipped)
    }

    async fn execute_step(
        &self,
        job: &Job,
        instance: &JobInstance,
        execution: &JobExecution,
        step: &Step,
        parameters: &Arc<JobParameters>,
    ) -> BatchResult<StepExecution> {
        let mut step_execution = StepExecution::new(execution.id, step.name.clone());
        step_execution.start();
        let mut step_execution = self
            .repository
            .create_step_execution(&step_execution)
            .await?;

        info!("步骤 {} 开始执行 ({})", step.name, step.kind.as_str());

        let context = StepContext::new(
            job.name.clone(),
            step.name.clone(),
            instance.id,
            execution.id,
            parameters.clone(),
        );
        let policy = RetryPolicy::for_step(step, &self.config);
        let label = format!("{}.{}", job.name, step.name);

        let outcome = match &step.kind {
            StepKind::Simple(tasklet) => {
                policy
                    .execute(&label, |attempt| {
                        let tasklet = tasklet.clone();
                        let context = context.with_attempt(attempt);
                        async move {
                            tasklet
                                .execute(&context)
                                .await
                                .map(|_| None::<ChunkMetrics>)
                        }
                    })
                    .await
            }
            StepKind::Chunk(chunk) => {
                policy
                    .execute(&label, |attempt| {
                        let chunk = chunk.clone();
                        let context = context.with_attempt(attempt);
                        async move { chunk.run_pass(&context).await.map(Some) }
                    })
                    .await
            }
        };

        match outcome {
            Ok(attempted) => {
                if let Some(chunk_metrics) = &attempted.value {
                    metrics::record_chunk_items(&step.name, chunk_metrics);
                }
                step_execution.complete(attempted.retry_count as i32, attempted.value);
                info!(
                    "步骤 {} 完成，重试 {} 次",
                    step.name, step_execution.retry_count
                );
            }
            Err(exhausted) => {
                step_execution.fail(
                    exhausted.retry_count as i32,
                    exhausted.last_error.to_string(),
                );
                // 块步骤最后一轮已完成的提交仍然保留在历史中
                step_execution.metrics = exhausted.last_error.partial_metrics();
                error!(
                    "步骤 {} 在重试 {} 次后失败: {}",
                    step.name, exhausted.retry_count, exhausted.last_error
                );
            }
        }

        self.repository
            .update_step_execution(&step_execution)
            .await?;
        metrics::record_step_execution(&job.name, &step_execution);
        Ok(step_execution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batch_core::{BatchError, ExitCode, TaskError, TaskResult};
    use batch_domain::FnTasklet;
    use batch_infrastructure::InMemoryExecutionRepository;

    fn launcher(job: Job) -> (JobLauncher, Arc<InMemoryExecutionRepository>) {
        let registry = Arc::new(JobRegistry::builder().register(job).build().unwrap());
        let repository = Arc::new(InMemoryExecutionRepository::new());
        (JobLauncher::new(registry, repository.clone()), repository)
    }

    fn ok_step(name: &str) -> Step {
        Step::simple(name, FnTasklet::new(|_: StepContext| async { TaskResult::Ok(()) })).build()
    }

    #[tokio::test]
    async fn test_unknown_job_creates_nothing() {
        let (launcher, repository) = launcher(Job::new("known").step(ok_step("s")));

        let err = launcher
            .launch("unknown", Vec::<(String, String)>::new(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::JobNotFound { .. }));
        assert!(repository.list_executions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_parameters_create_nothing() {
        let (launcher, repository) = launcher(Job::new("known").step(ok_step("s")));

        let err = launcher
            .launch("known", [("", "1")], false)
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::InvalidParameters(_)));
        assert!(repository.list_executions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_step_records_message() {
        let job = Job::new("failing")
            .step(ok_step("first"))
            .step(
                Step::simple(
                    "boom",
                    FnTasklet::new(|_: StepContext| async {
                        Err::<(), _>(TaskError::new("Something went wrong!"))
                    }),
                )
                .build(),
            )
            .step(ok_step("never"));
        let (launcher, repository) = launcher(job);

        let execution = launcher
            .launch("failing", [("run", "1")], false)
            .await
            .unwrap();

        assert_eq!(execution.status, BatchStatus::Failed);
        assert_eq!(execution.exit_code, ExitCode::Failed);
        assert!(execution
            .exit_message
            .as_deref()
            .unwrap()
            .contains("Something went wrong!"));
        assert_eq!(execution.step_executions.len(), 2);
        assert_eq!(
            execution.step_executions[1].exit_message.as_deref(),
            Some("Something went wrong!")
        );

        let stored = repository.get_execution(execution.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BatchStatus::Failed);
        assert!(stored.end_time.is_some());
    }
}
