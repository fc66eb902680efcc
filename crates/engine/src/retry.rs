use std::future::Future;
use std::time::Duration;

use batch_core::{EngineConfig, RetryExhausted, TaskResult};
use batch_domain::Step;
use tracing::{debug, info, warn};

/// 未配置上限时退避间隔的最大值
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(3600);

/// 单个步骤的重试策略
///
/// 最多尝试 `max_retries + 1` 次。默认倍数 1.0 且无抖动时，
/// 每两次尝试之间固定等待 `retry_delay`。
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// 指数退避倍数
    pub backoff_multiplier: f64,
    /// 退避后的间隔上限
    pub max_delay: Option<Duration>,
    /// 重试间隔的随机抖动范围（0.0-1.0）
    pub jitter_factor: f64,
}

/// 成功的结果及其之前失败的尝试次数
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted<T> {
    pub value: T,
    pub retry_count: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(0, Duration::ZERO)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
            backoff_multiplier: 1.0,
            max_delay: None,
            jitter_factor: 0.0,
        }
    }

    /// 步骤自身的重试次数与间隔，退避参数取引擎配置
    pub fn for_step(step: &Step, config: &EngineConfig) -> Self {
        Self {
            max_retries: step.max_retries,
            retry_delay: step.retry_delay,
            backoff_multiplier: config.retry_backoff_multiplier,
            max_delay: config.max_retry_delay(),
            jitter_factor: 0.0,
        }
    }

    pub fn with_backoff(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    /// 第 `retry_number` 次重试（从1开始）之前的等待时间
    ///
    /// 未设置 `max_delay` 时以 [`DEFAULT_MAX_DELAY`] 为上限，固定间隔本身不受其限制。
    pub fn delay_for(&self, retry_number: u32) -> Duration {
        let base = self.retry_delay.as_secs_f64();
        if base == 0.0 {
            return Duration::ZERO;
        }

        let ceiling = self
            .max_delay
            .unwrap_or(DEFAULT_MAX_DELAY)
            .max(self.retry_delay);
        let ceiling_secs = ceiling.as_secs_f64();

        let exponent = retry_number.saturating_sub(1).min(i32::MAX as u32) as i32;
        let mut interval = (base * self.backoff_multiplier.max(1.0).powi(exponent)).min(ceiling_secs);

        if self.jitter_factor > 0.0 {
            let jitter = interval * self.jitter_factor * (rand::random::<f64>() - 0.5) * 2.0;
            interval = (interval + jitter).clamp(0.0, ceiling_secs);
        }

        Duration::try_from_secs_f64(interval).unwrap_or(ceiling)
    }

    /// 执行 `attempt`，失败时按策略等待后重试
    ///
    /// 闭包参数为尝试序号（从0开始）。中间失败只记录 WARN 日志，
    /// 全部失败后返回携带最后一个错误的 [`RetryExhausted`]。
    pub async fn execute<T, F, Fut>(
        &self,
        label: &str,
        mut attempt: F,
    ) -> Result<Attempted<T>, RetryExhausted>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = TaskResult<T>>,
    {
        let mut retry_count = 0;

        loop {
            match attempt(retry_count).await {
                Ok(value) => {
                    if retry_count > 0 {
                        info!("{} 在第 {} 次重试后成功", label, retry_count);
                    }
                    return Ok(Attempted { value, retry_count });
                }
                Err(e) if retry_count < self.max_retries => {
                    retry_count += 1;
                    crate::metrics::record_step_retry(label);
                    let delay = self.delay_for(retry_count);
                    warn!(
                        "{} 第 {} 次尝试失败: {}，{:?} 后进行第 {} 次重试",
                        label, retry_count, e, delay, retry_count
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => {
                    debug!("{} 重试耗尽，共重试 {} 次", label, retry_count);
                    return Err(RetryExhausted {
                        retry_count,
                        last_error: e,
                    });
                }
            }
        }
    }
}
