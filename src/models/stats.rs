//! 运行统计

use super::outcome::RowResult;

/// 按结论分类的计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub success: usize,
    pub not_found: usize,
    pub invalid_input: usize,
    pub antibot: usize,
    pub error: usize,
    /// 之前已成功、本次跳过的行
    pub skipped: usize,
}

impl RunStats {
    pub fn record(&mut self, result: &RowResult) {
        match result {
            RowResult::Success(_) => self.success += 1,
            RowResult::NotFound => self.not_found += 1,
            RowResult::InvalidInput(_) => self.invalid_input += 1,
            RowResult::AntibotSuspected => self.antibot += 1,
            RowResult::Error(_) => self.error += 1,
        }
    }

    pub fn merge(&mut self, other: &RunStats) {
        self.success += other.success;
        self.not_found += other.not_found;
        self.invalid_input += other.invalid_input;
        self.antibot += other.antibot;
        self.error += other.error;
        self.skipped += other.skipped;
    }

    /// 本次实际处理的记录数
    pub fn processed(&self) -> usize {
        self.success + self.not_found + self.invalid_input + self.antibot + self.error
    }
}
