use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use batch_core::TaskResult;

use crate::parameters::JobParameters;

/// 步骤执行上下文
///
/// 每次尝试都会收到一份，`attempt` 从 0 开始计数。
#[derive(Debug, Clone)]
pub struct StepContext {
    pub job_name: String,
    pub step_name: String,
    pub job_instance_id: i64,
    pub job_execution_id: i64,
    pub attempt: u32,
    pub parameters: Arc<JobParameters>,
}

impl StepContext {
    pub fn new(
        job_name: impl Into<String>,
        step_name: impl Into<String>,
        job_instance_id: i64,
        job_execution_id: i64,
        parameters: Arc<JobParameters>,
    ) -> Self {
        Self {
            job_name: job_name.into(),
            step_name: step_name.into(),
            job_instance_id,
            job_execution_id,
            attempt: 0,
            parameters,
        }
    }

    pub fn with_attempt(&self, attempt: u32) -> Self {
        Self {
            attempt,
            ..self.clone()
        }
    }
}

/// 简单步骤的执行单元
#[async_trait]
pub trait Tasklet: Send + Sync {
    async fn execute(&self, context: &StepContext) -> TaskResult<()>;
}

/// 以异步闭包实现的 Tasklet
pub struct FnTasklet<F> {
    func: F,
}

impl<F, Fut> FnTasklet<F>
where
    F: Fn(StepContext) -> Fut + Send + Sync,
    Fut: Future<Output = TaskResult<()>> + Send,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F, Fut> Tasklet for FnTasklet<F>
where
    F: Fn(StepContext) -> Fut + Send + Sync,
    Fut: Future<Output = TaskResult<()>> + Send,
{
    async fn execute(&self, context: &StepContext) -> TaskResult<()> {
        (self.func)(context.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batch_core::TaskError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn context() -> StepContext {
        StepContext::new("job", "step", 1, 1, Arc::new(JobParameters::new()))
    }

    #[tokio::test]
    async fn test_fn_tasklet_sees_context() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let tasklet = FnTasklet::new(move |ctx: StepContext| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if ctx.attempt == 0 {
                    Err(TaskError::new("第一次失败"))
                } else {
                    Ok(())
                }
            }
        });

        assert!(tasklet.execute(&context()).await.is_err());
        assert!(tasklet.execute(&context().with_attempt(1)).await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
