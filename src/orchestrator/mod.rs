//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量处理器
//! - 管理应用生命周期（初始化、运行、取消）
//! - 打开记录表，切分分片
//! - 管理浏览器资源（Browser、每个会话一个 ChromeDriver）
//! - 输出全局统计信息
//!
//! ### `shard_processor` - 分片处理器
//! - 顺序处理一个分片的记录（Vec<InputRecord>）
//! - 跳过已成功的行，每条记录后落盘
//! - 输出单个分片的统计信息
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理整张表)
//!     ↓
//! shard_processor (处理一个分片)
//!     ↓
//! workflow::RowFlow (处理单条记录)
//!     ↓
//! services (能力层：page step / challenge / back navigation / record book)
//!     ↓
//! infrastructure (基础设施：WizardDriver)
//! ```

pub mod batch_processor;
pub mod shard_processor;

// 重新导出主要类型
pub use batch_processor::App;
pub use shard_processor::{process_shard, split_shards, ShardOptions};
