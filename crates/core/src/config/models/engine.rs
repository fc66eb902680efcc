use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 引擎默认值，步骤构建时未显式指定的项从这里取
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub default_max_retries: u32,
    pub default_retry_delay_ms: u64,
    pub default_chunk_size: usize,
    /// 重试间隔的指数退避倍数，1.0 表示固定间隔
    pub retry_backoff_multiplier: f64,
    pub max_retry_delay_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_max_retries: 0,
            default_retry_delay_ms: 0,
            default_chunk_size: 100,
            retry_backoff_multiplier: 1.0,
            max_retry_delay_ms: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.default_chunk_size == 0 {
            return Err(anyhow::anyhow!("默认块大小必须大于0"));
        }

        if !self.retry_backoff_multiplier.is_finite() || self.retry_backoff_multiplier < 1.0 {
            return Err(anyhow::anyhow!(
                "重试退避倍数必须不小于1.0: {}",
                self.retry_backoff_multiplier
            ));
        }

        if let Some(max_delay) = self.max_retry_delay_ms {
            if max_delay < self.default_retry_delay_ms {
                return Err(anyhow::anyhow!("最大重试间隔不能小于默认重试间隔"));
            }
        }

        Ok(())
    }

    pub fn default_retry_delay(&self) -> Duration {
        Duration::from_millis(self.default_retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Option<Duration> {
        self.max_retry_delay_ms.map(Duration::from_millis)
    }
}
