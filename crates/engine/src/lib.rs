//! 批处理执行引擎：实例解析、重试包装与作业启动状态机

pub mod launcher;
pub mod metrics;
pub mod operator;
pub mod resolver;
pub mod retry;

pub use launcher::JobLauncher;
pub use operator::JobOperator;
pub use resolver::JobInstanceResolver;
pub use retry::{Attempted, RetryPolicy, DEFAULT_MAX_DELAY};
