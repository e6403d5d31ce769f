//! 验证码重试预算

use std::collections::HashMap;

/// 单一验证码类型的重试计数器
///
/// 只增不减，作用域是一条记录。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    limit: u32,
    used: u32,
}

impl RetryBudget {
    pub fn new(limit: u32) -> Self {
        Self { limit, used: 0 }
    }

    /// 尝试消耗一次重试，预算耗尽时返回 false
    pub fn try_consume(&mut self) -> bool {
        if self.used >= self.limit {
            return false;
        }
        self.used += 1;
        true
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }
}

/// 一条记录内按验证码类型分开的预算
#[derive(Debug, Clone)]
pub struct ChallengeBudgets {
    limit: u32,
    budgets: HashMap<String, RetryBudget>,
}

impl ChallengeBudgets {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            budgets: HashMap::new(),
        }
    }

    pub fn for_kind(&mut self, kind: &str) -> &mut RetryBudget {
        let limit = self.limit;
        self.budgets
            .entry(kind.to_string())
            .or_insert_with(|| RetryBudget::new(limit))
    }
}
