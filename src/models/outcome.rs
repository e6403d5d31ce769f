//! 页面结果与行结果
//!
//! `PageOutcome` 是一次翻页尝试的分类结果，`RowResult` 是一条记录的最终结论。

use std::fmt;

/// 从页面中提取出的值
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    /// 文档链接
    Link(String),
    /// 申请编号
    Code(String),
}

impl Extracted {
    pub fn value(&self) -> &str {
        match self {
            Extracted::Link(v) | Extracted::Code(v) => v,
        }
    }
}

/// 弹窗类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalKind {
    /// 已存在相同的申请
    Duplicate,
    /// 字段校验失败
    Validation,
}

impl fmt::Display for ModalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModalKind::Duplicate => write!(f, "duplicate"),
            ModalKind::Validation => write!(f, "validation"),
        }
    }
}

/// 页面被阻断的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// 服务器显示"没有记录"
    NotFound,
    /// 所有日期解释都被拒绝
    NoDateAccepted,
    /// 页面动作无法完成
    Action(String),
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::NotFound => write!(f, "no records found"),
            BlockReason::NoDateAccepted => write!(f, "no date format accepted"),
            BlockReason::Action(msg) => write!(f, "{}", msg),
        }
    }
}

/// 一次翻页尝试的结果，每次尝试只会命中一个变体
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// 出现了下一页（或最终成功）的标记
    Advanced {
        marker: String,
        extracted: Option<Extracted>,
    },
    Blocked(BlockReason),
    /// 出现验证码，携带验证码类型
    ChallengeDetected(String),
    ModalDetected { kind: ModalKind, text: String },
    /// 等待的标记没有出现
    TimedOut(String),
}

/// 一条记录的最终结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowResult {
    Success(Extracted),
    NotFound,
    InvalidInput(String),
    AntibotSuspected,
    Error(String),
}

impl RowResult {
    pub fn is_success(&self) -> bool {
        matches!(self, RowResult::Success(_))
    }

    /// 用于日志和统计的短标签
    pub fn label(&self) -> &'static str {
        match self {
            RowResult::Success(_) => "SUCCESS",
            RowResult::NotFound => "NOT_FOUND",
            RowResult::InvalidInput(_) => "INVALID_INPUT",
            RowResult::AntibotSuspected => "ANTIBOT",
            RowResult::Error(_) => "ERROR",
        }
    }
}

impl fmt::Display for RowResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowResult::Success(extracted) => write!(f, "SUCCESS({})", extracted.value()),
            RowResult::InvalidInput(msg) => write!(f, "INVALID_INPUT({})", msg),
            RowResult::Error(msg) => write!(f, "ERROR({})", msg),
            other => write!(f, "{}", other.label()),
        }
    }
}
