use std::path::PathBuf;

use thiserror::Error;

use crate::models::RowResult;

/// 应用程序错误类型
///
/// 只有这里的错误会终止整次运行：表头不匹配、会话不可恢复、输出写不进去。
/// 单条记录内的失败一律走 [`RecordError`]，在记录边界处被吸收。
#[derive(Debug, Error)]
pub enum AppError {
    /// 表头与流程要求不一致
    #[error("文件 {path} 的表头不符合格式: 期望 {expected:?}, 实际 {found:?}")]
    SchemaMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// 表格为空或没有工作表
    #[error("文件 {path} 中没有可读取的工作表")]
    EmptyWorkbook { path: PathBuf },

    /// 读取表格失败
    #[error("读取表格失败 ({path}): {source}")]
    SheetRead {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    /// 写入表格失败
    #[error("写入表格失败 ({path}): {source}")]
    SheetWrite {
        path: PathBuf,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },

    /// 浏览器会话不可恢复
    #[error("浏览器会话 {session} 不可恢复: {source}")]
    Session {
        session: usize,
        #[source]
        source: DriverError,
    },

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 向导配置表解析失败
    #[error("向导配置解析失败 ({path}): {source}")]
    WizardTable {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 浏览器原语执行错误
#[derive(Debug, Error)]
pub enum DriverError {
    /// CDP 调用失败（连接断开、脚本异常等）
    #[error("浏览器协议错误: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    /// 页面上找不到目标元素
    #[error("未找到元素: {0}")]
    ElementNotFound(String),

    /// 脚本返回值无法解析
    #[error("脚本返回值解析失败: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// 页面回发导航期间常见的瞬时错误
const TRANSIENT_HINTS: &[&str] = &[
    "Execution context was destroyed",
    "Cannot find context",
    "Inspected target navigated",
];

impl DriverError {
    /// 是否是导航中的瞬时错误，等待标记时可以当作"还没出现"
    pub fn is_transient(&self) -> bool {
        match self {
            DriverError::Cdp(_) => true,
            DriverError::Other(msg) => TRANSIENT_HINTS.iter().any(|hint| msg.contains(hint)),
            DriverError::ElementNotFound(_) | DriverError::Decode(_) => false,
        }
    }
}

/// 单条记录处理失败的分类
///
/// 每个变体都能落成一个 [`RowResult`]，不会越过记录边界。
#[derive(Debug, Error)]
pub enum RecordError {
    /// 输入记录不合法
    #[error("{0}")]
    Validation(String),

    /// 验证码在预算内没有通过
    #[error("验证码 {kind} 在 {attempts} 次重试后仍未通过")]
    ChallengeExhausted { kind: String, attempts: u32 },

    /// 服务器明确拒绝了提交
    #[error("{0}")]
    ModalRejection(String),

    /// 预期标记没有在时限内出现
    #[error("{0}")]
    Timeout(String),

    /// 其他异常
    #[error("{0}")]
    Unexpected(String),
}

impl From<DriverError> for RecordError {
    fn from(err: DriverError) -> Self {
        RecordError::Unexpected(format!("Excepción navegando: {}", err))
    }
}

impl From<RecordError> for RowResult {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::Validation(msg) | RecordError::ModalRejection(msg) => {
                RowResult::InvalidInput(msg)
            }
            RecordError::ChallengeExhausted { .. } => RowResult::AntibotSuspected,
            RecordError::Timeout(msg) | RecordError::Unexpected(msg) => RowResult::Error(msg),
        }
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

/// 浏览器原语结果类型
pub type DriverResult<T> = Result<T, DriverError>;
