use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 作业实例
///
/// 一个 (作业名, 参数签名) 组合的持久身份。同一组参数的每次启动都引用同一个实例，
/// 创建后不再修改。`job_key` 即参数集的规范签名。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInstance {
    pub id: i64,
    pub job_name: String,
    pub job_key: String,
    pub created_at: DateTime<Utc>,
}

impl JobInstance {
    pub fn new(job_name: String, job_key: String) -> Self {
        Self {
            id: 0, // 将由数据库生成
            job_name,
            job_key,
            created_at: Utc::now(),
        }
    }
}
