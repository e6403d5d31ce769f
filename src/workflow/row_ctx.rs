//! 记录处理上下文
//!
//! 封装"哪个会话正在处理第几行"这一信息

use std::fmt::Display;

use crate::models::InputRecord;

/// 记录处理上下文
#[derive(Debug, Clone)]
pub struct RowCtx {
    /// 会话编号（从1开始）
    pub session: usize,

    /// 表格中的行号
    pub sheet_row: usize,

    /// 身份代码
    pub id_code: String,

    /// 在本分片中的位置（从1开始，仅用于日志显示）
    pub position: usize,

    /// 本分片的记录数
    pub total: usize,
}

impl RowCtx {
    pub fn new(session: usize, record: &InputRecord, position: usize, total: usize) -> Self {
        Self {
            session,
            sheet_row: record.sheet_row(),
            id_code: record.id_code.clone(),
            position,
            total,
        }
    }
}

impl Display for RowCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[会话 {} 行#{} 代码#{}]", self.session, self.sheet_row, self.id_code)
    }
}
