//! 块处理运行器
//!
//! 一轮处理从读取器工厂打开一个新的读取器，逐条读取、处理并缓冲，
//! 缓冲区满 `chunk_size` 条时调用一次写入器作为一次提交，数据结束时提交剩余条目。
//! 内存中最多保留一个块的条目。

use std::sync::Arc;

use async_trait::async_trait;
use batch_core::{ChunkMetrics, EngineConfig, TaskResult};
use tracing::{debug, warn};

use crate::item::{ItemProcessor, ItemReader, ItemWriter, ListItemReader, Processed};
use crate::skip::{NeverSkipPolicy, SkipPolicy};
use crate::tasklet::StepContext;

/// 每轮处理调用一次，返回一个全新的读取器
pub type ReaderFactory<I> =
    Arc<dyn Fn(&StepContext) -> TaskResult<Box<dyn ItemReader<I>>> + Send + Sync>;

/// 类型擦除后的块步骤，供引擎统一驱动
#[async_trait]
pub trait ChunkTasklet: Send + Sync {
    fn chunk_size(&self) -> usize;

    /// 执行完整的一轮读-处理-写
    async fn run_pass(&self, context: &StepContext) -> TaskResult<ChunkMetrics>;
}

pub struct ChunkStep<I: Send + 'static, O: Send + Sync + 'static> {
    reader_factory: ReaderFactory<I>,
    processor: Arc<dyn ItemProcessor<I, O>>,
    writer: Arc<dyn ItemWriter<O>>,
    skip_policy: Arc<dyn SkipPolicy>,
    chunk_size: usize,
}

impl<I, O> ChunkStep<I, O>
where
    I: Send + 'static,
    O: Send + Sync + 'static,
{
    pub fn builder() -> ChunkStepBuilder<I, O> {
        ChunkStepBuilder {
            reader_factory: None,
            processor: None,
            writer: None,
            skip_policy: Arc::new(NeverSkipPolicy),
            chunk_size: None,
        }
    }

    async fn drive(&self, context: &StepContext, metrics: &mut ChunkMetrics) -> TaskResult<()> {
        let mut reader = (self.reader_factory)(context)?;
        let mut buffer: Vec<O> = Vec::with_capacity(self.chunk_size);
        let mut skip_count: u64 = 0;

        while let Some(item) = reader.read().await? {
            metrics.read_count += 1;

            match self.processor.process(item).await {
                Ok(Processed::Keep(output)) => {
                    buffer.push(output);
                    if buffer.len() >= self.chunk_size {
                        self.commit(&mut buffer, metrics).await?;
                    }
                }
                Ok(Processed::Drop) => metrics.filter_count += 1,
                Err(e) if self.skip_policy.should_skip(&e, skip_count) => {
                    skip_count += 1;
                    metrics.process_skip_count += 1;
                    warn!(
                        "步骤 {} 跳过第 {} 条条目: {}",
                        context.step_name, metrics.read_count, e
                    );
                }
                Err(e) => return Err(e),
            }
        }

        if !buffer.is_empty() {
            self.commit(&mut buffer, metrics).await?;
        }

        Ok(())
    }

    async fn commit(&self, buffer: &mut Vec<O>, metrics: &mut ChunkMetrics) -> TaskResult<()> {
        self.writer.write(buffer.as_slice()).await?;
        metrics.write_count += buffer.len() as i64;
        metrics.commit_count += 1;
        debug!(
            "块提交完成: 条目数 {}, 累计提交 {}",
            buffer.len(),
            metrics.commit_count
        );
        buffer.clear();
        Ok(())
    }
}

#[async_trait]
impl<I, O> ChunkTasklet for ChunkStep<I, O>
where
    I: Send + 'static,
    O: Send + Sync + 'static,
{
    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// 失败时错误携带本轮已累计的指标，已完成的提交不会回滚
    async fn run_pass(&self, context: &StepContext) -> TaskResult<ChunkMetrics> {
        let mut metrics = ChunkMetrics::default();
        match self.drive(context, &mut metrics).await {
            Ok(()) => Ok(metrics),
            Err(e) => Err(e.with_metrics(metrics)),
        }
    }
}

pub struct ChunkStepBuilder<I: Send + 'static, O: Send + Sync + 'static> {
    reader_factory: Option<ReaderFactory<I>>,
    processor: Option<Arc<dyn ItemProcessor<I, O>>>,
    writer: Option<Arc<dyn ItemWriter<O>>>,
    skip_policy: Arc<dyn SkipPolicy>,
    chunk_size: Option<usize>,
}

impl<I, O> ChunkStepBuilder<I, O>
where
    I: Send + 'static,
    O: Send + Sync + 'static,
{
    /// 设置读取器工厂，每轮处理调用一次
    pub fn reader<F, R>(mut self, factory: F) -> Self
    where
        F: Fn(&StepContext) -> TaskResult<R> + Send + Sync + 'static,
        R: ItemReader<I> + 'static,
    {
        let reader_factory: ReaderFactory<I> = Arc::new(move |context: &StepContext| {
            let reader = factory(context)?;
            Ok(Box::new(reader) as Box<dyn ItemReader<I>>)
        });
        self.reader_factory = Some(reader_factory);
        self
    }

    /// 从固定列表读取，每轮处理使用一份新的副本
    pub fn list_reader(self, items: Vec<I>) -> Self
    where
        I: Clone + Sync,
    {
        self.reader(move |_| Ok(ListItemReader::new(items.clone())))
    }

    pub fn processor<P>(mut self, processor: P) -> Self
    where
        P: ItemProcessor<I, O> + 'static,
    {
        let processor: Arc<dyn ItemProcessor<I, O>> = Arc::new(processor);
        self.processor = Some(processor);
        self
    }

    pub fn writer<W>(mut self, writer: W) -> Self
    where
        W: ItemWriter<O> + 'static,
    {
        let writer: Arc<dyn ItemWriter<O>> = Arc::new(writer);
        self.writer = Some(writer);
        self
    }

    pub fn skip_policy<S>(mut self, policy: S) -> Self
    where
        S: SkipPolicy + 'static,
    {
        self.skip_policy = Arc::new(policy);
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn build(self) -> batch_core::BatchResult<ChunkStep<I, O>> {
        self.build_with(&EngineConfig::default())
    }

    /// 未设置块大小时取引擎默认值
    pub fn build_with(self, config: &EngineConfig) -> batch_core::BatchResult<ChunkStep<I, O>> {
        let reader_factory = self
            .reader_factory
            .ok_or_else(|| batch_core::BatchError::config_error("块步骤缺少读取器"))?;
        let processor = self
            .processor
            .ok_or_else(|| batch_core::BatchError::config_error("块步骤缺少处理器"))?;
        let writer = self
            .writer
            .ok_or_else(|| batch_core::BatchError::config_error("块步骤缺少写入器"))?;
        let chunk_size = self.chunk_size.unwrap_or(config.default_chunk_size);
        if chunk_size == 0 {
            return Err(batch_core::BatchError::config_error("块大小必须大于0"));
        }

        Ok(ChunkStep {
            reader_factory,
            processor,
            writer,
            skip_policy: self.skip_policy,
            chunk_size,
        })
    }
}
