//! 条目跳过策略
//!
//! 仅作用于处理器抛出的错误。读取器和写入器的错误永远不会被跳过。

use std::collections::HashSet;

use batch_core::{TaskError, TaskErrorKind};

pub trait SkipPolicy: Send + Sync {
    /// `skip_count` 为本轮已跳过的条目数
    fn should_skip(&self, error: &TaskError, skip_count: u64) -> bool;
}

/// 默认策略：任何处理器错误都使步骤失败
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverSkipPolicy;

impl SkipPolicy for NeverSkipPolicy {
    fn should_skip(&self, _error: &TaskError, _skip_count: u64) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysSkipPolicy;

impl SkipPolicy for AlwaysSkipPolicy {
    fn should_skip(&self, _error: &TaskError, _skip_count: u64) -> bool {
        true
    }
}

/// 在上限内跳过指定类别的错误；未指定类别时所有类别都可跳过
#[derive(Debug, Clone)]
pub struct LimitCheckingSkipPolicy {
    skip_limit: Option<u64>,
    skippable: HashSet<TaskErrorKind>,
}

impl LimitCheckingSkipPolicy {
    pub fn new(skip_limit: u64) -> Self {
        Self {
            skip_limit: Some(skip_limit),
            skippable: HashSet::new(),
        }
    }

    /// 不限次数，只按类别判断
    pub fn unlimited() -> Self {
        Self {
            skip_limit: None,
            skippable: HashSet::new(),
        }
    }

    pub fn skippable<I>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = TaskErrorKind>,
    {
        self.skippable.extend(kinds);
        self
    }
}

impl Default for LimitCheckingSkipPolicy {
    fn default() -> Self {
        Self::new(10)
    }
}

impl SkipPolicy for LimitCheckingSkipPolicy {
    fn should_skip(&self, error: &TaskError, skip_count: u64) -> bool {
        if let Some(limit) = self.skip_limit {
            if skip_count >= limit {
                return false;
            }
        }

        self.skippable.is_empty() || self.skippable.contains(&error.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_and_always() {
        let err = TaskError::new("坏数据");
        assert!(!NeverSkipPolicy.should_skip(&err, 0));
        assert!(AlwaysSkipPolicy.should_skip(&err, 1_000));
    }

    #[test]
    fn test_limit_checking_stops_at_limit() {
        let policy = LimitCheckingSkipPolicy::new(2);
        let err = TaskError::parse("格式错误");
        assert!(policy.should_skip(&err, 0));
        assert!(policy.should_skip(&err, 1));
        assert!(!policy.should_skip(&err, 2));
    }

    #[test]
    fn test_limit_checking_filters_by_kind() {
        let policy = LimitCheckingSkipPolicy::unlimited()
            .skippable([TaskErrorKind::Validation, TaskErrorKind::Parse]);
        assert!(policy.should_skip(&TaskError::validation("缺字段"), 500));
        assert!(!policy.should_skip(&TaskError::transform("溢出"), 0));
        assert!(!policy.should_skip(&TaskError::new("未知"), 0));
    }
}
