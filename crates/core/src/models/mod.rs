//! # 数据模型
//!
//! 批处理引擎持久化的核心数据结构：作业实例、作业执行、步骤执行与作业参数。
//!
//! ## 关系
//!
//! ```text
//! job_instances 1 ── * job_executions 1 ── * step_executions
//!       1
//!       └── * job_parameters
//! ```
//!
//! - `JobInstance` 以 (作业名, 参数签名) 为身份，创建后不可变
//! - `JobExecution` 每次启动新建一条，到达终态后不再修改
//! - `StepExecution` 记录一个步骤在一次作业执行中的结果
//!
//! 所有时间字段使用 `DateTime<Utc>`，状态字段使用枚举，标识符由仓储单调分配。

pub mod job_execution;
pub mod job_instance;
pub mod parameter;
pub mod status;
pub mod step_execution;

pub use job_execution::*;
pub use job_instance::*;
pub use parameter::*;
pub use status::*;
pub use step_execution::*;
