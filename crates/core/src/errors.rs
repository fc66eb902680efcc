use thiserror::Error;

/// 批处理引擎错误类型定义
///
/// 作业逻辑自身的失败不在此列：它们以 [`TaskError`] 的形式在重试包装器内部被捕获，
/// 最终只体现为执行记录的 FAILED 状态。这里的错误都会直接返回给调用方。
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("持久化操作错误: {0}")]
    Persistence(String),

    #[error("作业未找到: {name}")]
    JobNotFound { name: String },

    #[error("作业实例未找到: {id}")]
    JobInstanceNotFound { id: i64 },

    #[error("作业执行未找到: {id}")]
    JobExecutionNotFound { id: i64 },

    #[error("步骤执行未找到: {id}")]
    StepExecutionNotFound { id: i64 },

    #[error("无效的作业参数: {0}")]
    InvalidParameters(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl BatchError {
    pub fn persistence<S: Into<String>>(msg: S) -> Self {
        Self::Persistence(msg.into())
    }
    pub fn job_not_found<S: Into<String>>(name: S) -> Self {
        Self::JobNotFound { name: name.into() }
    }
    pub fn invalid_params<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParameters(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// 未找到类错误（作业、实例、执行）
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BatchError::JobNotFound { .. }
                | BatchError::JobInstanceNotFound { .. }
                | BatchError::JobExecutionNotFound { .. }
                | BatchError::StepExecutionNotFound { .. }
        )
    }

    /// 仓储无法记录结果，调用方必须直接得知
    pub fn is_persistence(&self) -> bool {
        matches!(self, BatchError::Database(_) | BatchError::Persistence(_))
    }

    pub fn user_message(&self) -> &str {
        match self {
            BatchError::JobNotFound { .. } => "请求的作业不存在",
            BatchError::JobInstanceNotFound { .. } => "请求的作业实例不存在",
            BatchError::JobExecutionNotFound { .. } => "请求的作业执行记录不存在",
            BatchError::StepExecutionNotFound { .. } => "请求的步骤执行记录不存在",
            BatchError::InvalidParameters(_) => "作业参数有误",
            BatchError::Configuration(_) => "系统配置有误",
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<serde_json::Error> for BatchError {
    fn from(err: serde_json::Error) -> Self {
        BatchError::Serialization(err.to_string())
    }
}

/// 作业逻辑错误的分类，供条目跳过策略判断
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TaskErrorKind {
    Validation,
    Parse,
    Transform,
    Io,
    Other,
}

/// 步骤逻辑在一次尝试中抛出的错误
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TaskError {
    kind: TaskErrorKind,
    message: String,
    /// 失败前本轮块处理已累计的指标
    metrics: Option<crate::models::ChunkMetrics>,
}

impl TaskError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self::with_kind(TaskErrorKind::Other, message)
    }
    pub fn with_kind<S: Into<String>>(kind: TaskErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
            metrics: None,
        }
    }
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::with_kind(TaskErrorKind::Validation, message)
    }
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::with_kind(TaskErrorKind::Parse, message)
    }
    pub fn transform<S: Into<String>>(message: S) -> Self {
        Self::with_kind(TaskErrorKind::Transform, message)
    }
    pub fn kind(&self) -> TaskErrorKind {
        self.kind
    }
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 附加失败时已提交的块指标
    pub fn with_metrics(mut self, metrics: crate::models::ChunkMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
    pub fn partial_metrics(&self) -> Option<crate::models::ChunkMetrics> {
        self.metrics
    }
}

impl From<std::io::Error> for TaskError {
    fn from(err: std::io::Error) -> Self {
        Self::with_kind(TaskErrorKind::Io, err.to_string())
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

impl From<serde_json::Error> for TaskError {
    fn from(err: serde_json::Error) -> Self {
        Self::parse(err.to_string())
    }
}

/// 所有尝试都失败后由重试包装器产生，携带最后一次捕获的错误
#[derive(Debug, Clone, Error)]
#[error("重试耗尽 (重试 {retry_count} 次): {last_error}")]
pub struct RetryExhausted {
    pub retry_count: u32,
    #[source]
    pub last_error: TaskError,
}

/// 统一的Result类型
pub type BatchResult<T> = std::result::Result<T, BatchError>;

/// 步骤逻辑使用的Result类型
pub type TaskResult<T> = std::result::Result<T, TaskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(BatchError::job_not_found("demo").is_not_found());
        assert!(BatchError::JobExecutionNotFound { id: 7 }.is_not_found());
        assert!(!BatchError::invalid_params("空键").is_not_found());
        assert!(BatchError::persistence("磁盘已满").is_persistence());
    }

    #[test]
    fn test_task_error_kinds() {
        let err = TaskError::validation("缺少id");
        assert_eq!(err.kind(), TaskErrorKind::Validation);
        assert_eq!(err.to_string(), "缺少id");

        let io: TaskError = std::io::Error::other("broken pipe").into();
        assert_eq!(io.kind(), TaskErrorKind::Io);
    }

    #[test]
    fn test_retry_exhausted_keeps_last_error() {
        let exhausted = RetryExhausted {
            retry_count: 2,
            last_error: TaskError::new("第三次失败"),
        };
        assert!(exhausted.to_string().contains("第三次失败"));
        assert_eq!(exhausted.last_error.message(), "第三次失败");
    }
}
