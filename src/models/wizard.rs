//! 向导配置表
//!
//! 一个流程 = 入口 URL + 入口标记 + 表格布局 + 有序的页面表。
//! 每一页只用数据描述：就绪标记、要执行的动作、触发按钮，以及用来
//! 判定结果的一组标记（成功 / 无记录 / 验证码 / 弹窗 / 校验失败）。
//! 新的向导变体只需要新的表，不需要新代码。

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::record::{IdentityRule, InputRecord};

/// 页面上的一个标记：CSS 选择器，可选地要求包含某段文本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub selector: String,
    #[serde(default)]
    pub text: Option<String>,
    /// 为 false 时只要求元素存在于 DOM 中（隐藏的下拉框等）
    #[serde(default = "default_true")]
    pub visible: bool,
}

fn default_true() -> bool {
    true
}

impl Marker {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            text: None,
            visible: true,
        }
    }

    pub fn with_text(selector: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            text: Some(text.into()),
            visible: true,
        }
    }

    pub fn attached(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            text: None,
            visible: false,
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.text {
            Some(text) => write!(f, "{} ~ \"{}\"", self.selector, text),
            None => write!(f, "{}", self.selector),
        }
    }
}

/// 正则格式
///
/// 从 TOML 读入时立即编译，非法格式在加载阶段就报错；
/// 编译结果缓存下来，每次匹配不再重新编译。
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pattern {
    source: String,
    compiled: OnceLock<Option<Regex>>,
}

impl Pattern {
    /// 用于内置流程表，首次匹配时编译
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            compiled: OnceLock::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// 编译检查
    pub fn check(&self) -> Result<(), regex::Error> {
        match self.compiled.get() {
            Some(Some(_)) => Ok(()),
            _ => Regex::new(&self.source).map(|_| ()),
        }
    }

    /// 第一个匹配的文本
    pub fn find(&self, text: &str) -> Option<String> {
        self.compiled
            .get_or_init(|| Regex::new(&self.source).ok())
            .as_ref()?
            .find(text)
            .map(|m| m.as_str().to_string())
    }
}

impl TryFrom<String> for Pattern {
    type Error = regex::Error;

    fn try_from(source: String) -> Result<Self, Self::Error> {
        let regex = Regex::new(&source)?;
        Ok(Self {
            source,
            compiled: OnceLock::from(Some(regex)),
        })
    }
}

impl From<Pattern> for String {
    fn from(pattern: Pattern) -> Self {
        pattern.source
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// 字段值的来源
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    Code,
    Email,
    IssueDate,
    Country,
    Name,
    Literal(String),
}

impl FieldSource {
    /// 从记录中取值，缺失时返回 None
    pub fn resolve(&self, record: &InputRecord) -> Option<String> {
        match self {
            FieldSource::Code => Some(record.id_code.clone()),
            FieldSource::Email => Some(record.email.trim().to_string()),
            FieldSource::IssueDate => record.issue_date.clone(),
            FieldSource::Country => record.country.clone(),
            FieldSource::Name => record.name.clone(),
            FieldSource::Literal(value) => Some(value.clone()),
        }
    }
}

/// 页面动作
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    /// 清空并填写输入框
    Fill { selector: String, value: FieldSource },
    /// 逐键输入日期，按候选解释依次尝试
    TypeDate { selector: String },
    /// 选择下拉项并触发 change
    Select { selector: String, value: FieldSource },
    Click { selector: String },
    /// 勾选单选框/复选框，失败时重试
    Check {
        selector: String,
        #[serde(default = "default_check_attempts")]
        attempts: u32,
    },
    /// 如果弹窗在限定时间内出现就关闭它
    DismissIfPresent {
        panel: String,
        close: String,
        #[serde(default = "default_dismiss_wait_ms")]
        wait_ms: u64,
    },
    /// 固定停顿（最小退避，不用作等待手段）
    Pause { ms: u64 },
}

fn default_check_attempts() -> u32 {
    3
}

fn default_dismiss_wait_ms() -> u64 {
    5_000
}

/// 成功时要提取的值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Extraction {
    /// 读取链接的 href
    Href { selector: String },
    /// 读取文本并用正则截取编号
    Code { selector: String, pattern: Pattern },
}

/// 验证码描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeSpec {
    /// 验证码类型，每种类型单独计预算
    pub kind: String,
    pub marker: Marker,
    /// 重试前先点掉的元素（例如提示弹窗的关闭按钮）
    #[serde(default)]
    pub dismiss: Option<String>,
    /// 模拟人工操作时点击的无害元素
    #[serde(default)]
    pub human_clicks: Vec<String>,
}

/// 信息弹窗描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModalSpec {
    pub panel: String,
    pub message: String,
    pub close: String,
    /// 文本包含这些关键字之一即视为"重复申请"
    #[serde(default)]
    pub duplicate_keywords: Vec<String>,
    /// 弹窗中申请编号的格式
    pub code_pattern: Pattern,
}

impl ModalSpec {
    /// 从弹窗文本中提取申请编号
    pub fn extract_code(&self, text: &str) -> Option<String> {
        self.code_pattern.find(text)
    }

    pub fn is_duplicate(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.extract_code(text).is_some()
            || self
                .duplicate_keywords
                .iter()
                .any(|k| lowered.contains(&k.to_lowercase()))
    }
}

/// 一页的配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpec {
    pub name: String,
    /// 页面就绪的标志元素
    pub ready: Marker,
    #[serde(default)]
    pub actions: Vec<Action>,
    /// 触发翻页的按钮
    pub trigger: String,
    /// 触发前的最小停顿
    #[serde(default)]
    pub settle_ms: u64,
    /// 下一页（最后一页则为成功）的标记
    pub success: Marker,
    #[serde(default)]
    pub extract: Option<Extraction>,
    #[serde(default)]
    pub not_found: Option<Marker>,
    #[serde(default)]
    pub challenge: Option<ChallengeSpec>,
    /// 行内校验提示，出现即视为校验弹窗
    #[serde(default)]
    pub validation: Vec<Marker>,
    /// 是否监视流程级的信息弹窗
    #[serde(default)]
    pub watch_modal: bool,
}

impl PageSpec {
    pub fn date_selector(&self) -> Option<&str> {
        self.actions.iter().find_map(|a| match a {
            Action::TypeDate { selector } => Some(selector.as_str()),
            _ => None,
        })
    }
}

/// 表格布局
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetLayout {
    /// 完整且有序的表头
    pub columns: Vec<String>,
    pub number_column: String,
    pub id_column: String,
    #[serde(default)]
    pub name_column: Option<String>,
    #[serde(default)]
    pub date_column: Option<String>,
    #[serde(default)]
    pub country_column: Option<String>,
    /// 写入提取编号的列
    #[serde(default)]
    pub code_output: Option<String>,
    /// 写入文档链接的列
    #[serde(default)]
    pub link_output: Option<String>,
    pub observation_column: String,
}

impl SheetLayout {
    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

/// 一个完整流程的配置表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardTable {
    pub name: String,
    pub entry_url: String,
    pub entry_marker: Marker,
    pub layout: SheetLayout,
    pub identity: IdentityRule,
    /// 成功时写入观察列的文本
    pub success_observation: String,
    /// 单条记录的墙钟预算
    #[serde(default)]
    pub record_budget_secs: Option<u64>,
    #[serde(default)]
    pub modal: Option<ModalSpec>,
    pub pages: Vec<PageSpec>,
}

impl WizardTable {
    /// 加载后的一致性检查：至少一页、关键列在表头中、所有正则可编译
    pub fn check(&self) -> Result<(), String> {
        if self.pages.is_empty() {
            return Err("没有页面".to_string());
        }
        for column in [&self.layout.id_column, &self.layout.observation_column] {
            if self.layout.index_of(column).is_none() {
                return Err(format!("列 {} 不在表头中", column));
            }
        }

        let modal = self.modal.iter().map(|m| &m.code_pattern);
        let pages = self.pages.iter().filter_map(|p| match &p.extract {
            Some(Extraction::Code { pattern, .. }) => Some(pattern),
            _ => None,
        });
        for pattern in modal.chain(pages) {
            pattern
                .check()
                .map_err(|e| format!("编号格式 {} 不是合法的正则: {}", pattern, e))?;
        }
        Ok(())
    }
}
