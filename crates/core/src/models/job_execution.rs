use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BatchStatus, ExitCode, StepExecution};

/// 作业执行
///
/// 作业实例的一次运行尝试。每次启动都新建一条，到达终态后不再修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobExecution {
    pub id: i64,
    pub job_instance_id: i64,
    pub job_name: String,
    pub status: BatchStatus,
    pub exit_code: ExitCode,
    pub exit_message: Option<String>,
    pub force: bool,
    pub created_at: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub step_executions: Vec<StepExecution>,
}

/// 执行列表使用的摘要，不带步骤明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobExecutionSummary {
    pub id: i64,
    pub job_instance_id: i64,
    pub job_name: String,
    pub status: BatchStatus,
    pub exit_code: ExitCode,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl JobExecution {
    pub fn new(job_instance_id: i64, job_name: String, force: bool) -> Self {
        Self {
            id: 0, // 将由数据库生成
            job_instance_id,
            job_name,
            status: BatchStatus::Starting,
            exit_code: ExitCode::Unknown,
            exit_message: None,
            force,
            created_at: Utc::now(),
            start_time: None,
            end_time: None,
            step_executions: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_successful(&self) -> bool {
        matches!(self.status, BatchStatus::Completed)
    }

    /// 推进状态。终态只能进入一次，之后的调用被忽略并返回 `false`。
    pub fn update_status(&mut self, status: BatchStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        match status {
            BatchStatus::Started => {
                self.exit_code = ExitCode::Executing;
                if self.start_time.is_none() {
                    self.start_time = Some(Utc::now());
                }
            }
            BatchStatus::Completed => {
                self.exit_code = ExitCode::Completed;
                self.end_time = Some(Utc::now());
            }
            BatchStatus::Failed => {
                self.exit_code = ExitCode::Failed;
                self.end_time = Some(Utc::now());
            }
            BatchStatus::Starting => {}
        }
        true
    }

    pub fn summary(&self) -> JobExecutionSummary {
        JobExecutionSummary {
            id: self.id,
            job_instance_id: self.job_instance_id,
            job_name: self.job_name.clone(),
            status: self.status,
            exit_code: self.exit_code,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }

    pub fn execution_duration_ms(&self) -> Option<i64> {
        if let (Some(started), Some(ended)) = (self.start_time, self.end_time) {
            Some((ended - started).num_milliseconds())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_status_is_reached_once() {
        let mut execution = JobExecution::new(1, "SampleJob".to_string(), false);
        assert_eq!(execution.status, BatchStatus::Starting);

        assert!(execution.update_status(BatchStatus::Started));
        assert!(execution.is_running());
        assert!(execution.start_time.is_some());

        assert!(execution.update_status(BatchStatus::Failed));
        assert_eq!(execution.exit_code, ExitCode::Failed);
        let ended = execution.end_time;

        assert!(!execution.update_status(BatchStatus::Completed));
        assert_eq!(execution.status, BatchStatus::Failed);
        assert_eq!(execution.end_time, ended);
    }

    #[test]
    fn test_summary_drops_steps() {
        let mut execution = JobExecution::new(3, "SquaresJob".to_string(), true);
        execution.id = 9;
        execution
            .step_executions
            .push(StepExecution::new(9, "squares".to_string()));

        let summary = execution.summary();
        assert_eq!(summary.id, 9);
        assert_eq!(summary.job_instance_id, 3);
        assert_eq!(summary.job_name, "SquaresJob");
    }
}
