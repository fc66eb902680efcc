use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BatchStatus, ExitCode};

/// 块处理步骤的计数指标
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetrics {
    pub read_count: i64,
    pub write_count: i64,
    pub filter_count: i64,
    pub commit_count: i64,
    pub process_skip_count: i64,
}

/// 步骤执行记录
///
/// 属于唯一一个作业执行，对应作业中的唯一一个步骤。
/// 简单步骤没有块指标（`metrics` 为 `None`）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepExecution {
    pub id: i64,
    pub job_execution_id: i64,
    pub step_name: String,
    pub status: BatchStatus,
    pub exit_code: ExitCode,
    pub exit_message: Option<String>,
    pub retry_count: i32,
    pub metrics: Option<ChunkMetrics>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl StepExecution {
    pub fn new(job_execution_id: i64, step_name: String) -> Self {
        Self {
            id: 0, // 将由数据库生成
            job_execution_id,
            step_name,
            status: BatchStatus::Starting,
            exit_code: ExitCode::Unknown,
            exit_message: None,
            retry_count: 0,
            metrics: None,
            start_time: None,
            end_time: None,
        }
    }

    pub fn start(&mut self) {
        self.status = BatchStatus::Started;
        self.exit_code = ExitCode::Executing;
        self.start_time = Some(Utc::now());
    }

    pub fn complete(&mut self, retry_count: i32, metrics: Option<ChunkMetrics>) {
        self.status = BatchStatus::Completed;
        self.exit_code = ExitCode::Completed;
        self.retry_count = retry_count;
        self.metrics = metrics;
        self.end_time = Some(Utc::now());
    }

    pub fn fail(&mut self, retry_count: i32, error_message: String) {
        self.status = BatchStatus::Failed;
        self.exit_code = ExitCode::Failed;
        self.retry_count = retry_count;
        self.exit_message = Some(error_message);
        self.end_time = Some(Utc::now());
    }

    /// 跳过策略产生的记录：COMPLETED，指标复制自先前的成功执行，不调用任何任务
    pub fn skipped_from(job_execution_id: i64, prior: &StepExecution) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            job_execution_id,
            step_name: prior.step_name.clone(),
            status: BatchStatus::Completed,
            exit_code: ExitCode::Noop,
            exit_message: None,
            retry_count: 0,
            metrics: prior.metrics,
            start_time: Some(now),
            end_time: Some(now),
        }
    }

    pub fn is_successful(&self) -> bool {
        matches!(self.status, BatchStatus::Completed)
    }

    pub fn was_skipped(&self) -> bool {
        matches!(self.exit_code, ExitCode::Noop)
    }

    pub fn duration_ms(&self) -> Option<i64> {
        if let (Some(started), Some(ended)) = (self.start_time, self.end_time) {
            Some((ended - started).num_milliseconds())
        } else {
            None
        }
    }
}
