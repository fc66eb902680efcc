//! 作业定义、作业目录、参数类型推断与块处理运行器

pub mod chunk;
pub mod item;
pub mod job;
pub mod parameters;
pub mod registry;
pub mod skip;
pub mod tasklet;

pub use chunk::{ChunkStep, ChunkStepBuilder, ChunkTasklet, ReaderFactory};
pub use item::{
    FnItemProcessor, FnItemWriter, ItemProcessor, ItemReader, ItemWriter, IteratorItemReader,
    ListItemReader, ListItemWriter, PassThroughProcessor, Processed,
};
pub use job::{Job, Step, StepBuilder, StepKind};
pub use parameters::{infer_value, JobParameters};
pub use registry::{JobRegistry, JobRegistryBuilder};
pub use skip::{AlwaysSkipPolicy, LimitCheckingSkipPolicy, NeverSkipPolicy, SkipPolicy};
pub use tasklet::{FnTasklet, StepContext, Tasklet};
