//! # Apostilla Wizard
//!
//! 按表格逐行驱动海牙认证网站多步骤向导的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露原语
//! - `WizardDriver` - 标记检测、填写、点击、条件等待、后退
//! - `ChromeDriver` - 基于 chromiumoxide 的实现，所有原语都在页面内执行脚本
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理一页或一条记录
//! - `PageStep` - 按页面表完成一页，分类出 `PageOutcome`
//! - `ChallengeHandler` - 有预算的验证码重试
//! - `BackNavigator` - 有上限的后退
//! - `RecordBook` - 读表、校验表头、逐条落盘
//! - `RunLog` - 写运行日志
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一条记录"的完整处理流程
//! - `RowCtx` - 上下文封装（会话 + 行号）
//! - `RowFlow` - 状态机（校验 → 重置会话 → 逐页推进 → 终态）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 应用生命周期，管理浏览器和分片并发
//! - `orchestrator/shard_processor` - 顺序处理一个分片的记录
//!
//! ## 模块结构

pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, DriverError, RecordError};
pub use infrastructure::{ChromeDriver, WizardDriver};
pub use models::{InputRecord, PageOutcome, RowResult, WizardTable, Workflow};
pub use orchestrator::{process_shard, App};
pub use workflow::{FlowSettings, RowCtx, RowFlow};
