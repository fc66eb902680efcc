//! 执行仓储接口定义
//!
//! 引擎的每一次状态转换都先经由 [`ExecutionRepository`] 持久化，再继续下一步。
//! 写入返回即代表对后续读取可见（包括进程重启之后），
//! 因此跳过策略查询到的历史总是与真实历史一致。
//!
//! ## 实现
//!
//! - SQLite 实现（`batch-infrastructure`，WAL 模式，嵌入式持久化）
//! - 内存实现（测试与临时运行）
//!
//! ## 并发约束
//!
//! `create_instance_if_absent` 是唯一的共享可变状态竞争点：
//! 同一 (作业名, 签名) 的并发首次创建必须只产生一个实例，
//! 竞争失败的一方取回胜者的实例而不是报错。

use async_trait::async_trait;

use crate::models::{
    JobExecution, JobExecutionSummary, JobInstance, JobParameter, StepExecution,
};
use crate::BatchResult;

/// 作业执行仓储
#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    /// 按 (作业名, 签名) 查找作业实例
    async fn find_instance(
        &self,
        job_name: &str,
        job_key: &str,
    ) -> BatchResult<Option<JobInstance>>;

    /// 原子地查找或创建作业实例，返回 (实例, 是否新建)
    ///
    /// 新建时参数记录与实例在同一事务中写入。
    async fn create_instance_if_absent(
        &self,
        job_name: &str,
        job_key: &str,
        parameters: &[JobParameter],
    ) -> BatchResult<(JobInstance, bool)>;

    async fn get_instance(&self, instance_id: i64) -> BatchResult<Option<JobInstance>>;

    /// 获取实例的参数，按键排序
    async fn get_parameters(&self, instance_id: i64) -> BatchResult<Vec<JobParameter>>;

    /// 持久化新的作业执行并返回分配了标识的副本
    async fn create_execution(&self, execution: &JobExecution) -> BatchResult<JobExecution>;

    /// 更新作业执行的状态、退出码与时间戳
    async fn update_execution(&self, execution: &JobExecution) -> BatchResult<()>;

    /// 返回的执行不含步骤明细，步骤通过 `get_step_executions` 读取
    async fn get_execution(&self, execution_id: i64) -> BatchResult<Option<JobExecution>>;

    /// 所有作业执行的摘要，按标识升序
    async fn list_executions(&self) -> BatchResult<Vec<JobExecutionSummary>>;

    /// 持久化新的步骤执行并返回分配了标识的副本
    async fn create_step_execution(&self, step: &StepExecution) -> BatchResult<StepExecution>;

    async fn update_step_execution(&self, step: &StepExecution) -> BatchResult<()>;

    /// 某个作业执行的全部步骤执行，按标识（即执行顺序）升序
    async fn get_step_executions(&self, execution_id: i64) -> BatchResult<Vec<StepExecution>>;

    /// 查找该实例下某步骤最近一次 COMPLETED 的步骤执行
    async fn find_prior_successful_step(
        &self,
        instance_id: i64,
        step_name: &str,
    ) -> BatchResult<Option<StepExecution>>;
}
