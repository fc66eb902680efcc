use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use batch_core::EngineConfig;

use crate::chunk::ChunkTasklet;
use crate::tasklet::Tasklet;

/// 步骤类型，在注册时确定
#[derive(Clone)]
pub enum StepKind {
    Simple(Arc<dyn Tasklet>),
    Chunk(Arc<dyn ChunkTasklet>),
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Simple(_) => "simple",
            StepKind::Chunk(_) => "chunk",
        }
    }
}

impl fmt::Debug for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Simple(_) => f.write_str("Simple"),
            StepKind::Chunk(chunk) => f
                .debug_struct("Chunk")
                .field("chunk_size", &chunk.chunk_size())
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Step {
    pub name: String,
    pub kind: StepKind,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Step {
    pub fn simple<T>(name: impl Into<String>, tasklet: T) -> StepBuilder
    where
        T: Tasklet + 'static,
    {
        StepBuilder::new(name, StepKind::Simple(Arc::new(tasklet)))
    }

    pub fn chunk<C>(name: impl Into<String>, chunk: C) -> StepBuilder
    where
        C: ChunkTasklet + 'static,
    {
        StepBuilder::new(name, StepKind::Chunk(Arc::new(chunk)))
    }

    pub fn is_chunk(&self) -> bool {
        matches!(self.kind, StepKind::Chunk(_))
    }

    pub fn chunk_size(&self) -> Option<usize> {
        match &self.kind {
            StepKind::Chunk(chunk) => Some(chunk.chunk_size()),
            StepKind::Simple(_) => None,
        }
    }
}

pub struct StepBuilder {
    name: String,
    kind: StepKind,
    max_retries: Option<u32>,
    retry_delay: Option<Duration>,
}

impl StepBuilder {
    fn new(name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            name: name.into(),
            kind,
            max_retries: None,
            retry_delay: None,
        }
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = Some(retry_delay);
        self
    }

    pub fn build(self) -> Step {
        self.build_with(&EngineConfig::default())
    }

    /// 未显式设置的重试参数取引擎默认值
    pub fn build_with(self, config: &EngineConfig) -> Step {
        Step {
            name: self.name,
            kind: self.kind,
            max_retries: self.max_retries.unwrap_or(config.default_max_retries),
            retry_delay: self
                .retry_delay
                .unwrap_or_else(|| config.default_retry_delay()),
        }
    }
}

/// 作业定义：名称加有序步骤列表，注册后不可变
#[derive(Debug, Clone)]
pub struct Job {
    pub name: String,
    pub steps: Vec<Step>,
}

impl Job {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasklet::{FnTasklet, StepContext};

    fn noop() -> FnTasklet<impl Fn(StepContext) -> std::future::Ready<batch_core::TaskResult<()>> + Send + Sync>
    {
        FnTasklet::new(|_| std::future::ready(Ok(())))
    }

    #[test]
    fn test_step_builder_uses_engine_defaults() {
        let config = EngineConfig {
            default_max_retries: 4,
            default_retry_delay_ms: 250,
            ..EngineConfig::default()
        };

        let defaulted = Step::simple("a", noop()).build_with(&config);
        assert_eq!(defaulted.max_retries, 4);
        assert_eq!(defaulted.retry_delay, Duration::from_millis(250));

        let explicit = Step::simple("b", noop())
            .max_retries(1)
            .retry_delay(Duration::from_secs(2))
            .build_with(&config);
        assert_eq!(explicit.max_retries, 1);
        assert_eq!(explicit.retry_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_job_keeps_declared_order() {
        let job = Job::new("ordered")
            .step(Step::simple("first", noop()).build())
            .step(Step::simple("second", noop()).build());
        assert_eq!(job.step_names(), vec!["first", "second"]);
        assert!(!job.steps[0].is_chunk());
        assert_eq!(job.steps[0].chunk_size(), None);
        assert_eq!(job.steps[0].max_retries, 0);
    }
}
