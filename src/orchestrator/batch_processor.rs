//! 批量处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责资源管理和分片调度。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：运行日志、流程表、连接或启动浏览器、为每个会话创建独立上下文
//! 2. **加载记录**：打开记录表（表头不符直接失败）
//! 3. **分片并发**：记录切成互不相交的分片，每个分片一个 tokio 任务、一个会话
//! 4. **取消**：Ctrl-C 触发 `CancellationToken`，各分片在记录之间停下
//! 5. **全局统计**：汇总所有分片的结论计数
//!
//! ## 设计特点
//!
//! - **资源所有者**：唯一持有 Browser 的模块
//! - **向下委托**：委托 shard_processor 处理单个分片

use std::sync::Arc;

use anyhow::Result;
use chromiumoxide::Browser;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::browser;
use crate::config::Config;
use crate::error::AppError;
use crate::infrastructure::ChromeDriver;
use crate::models::{load_wizard_table, preset, RunStats, WizardTable};
use crate::orchestrator::shard_processor::{process_shard, split_shards, ShardOptions};
use crate::services::{RecordBook, RecordSink, RunLog};
use crate::utils::logging::{log_records_loaded, log_startup, print_final_stats};
use crate::workflow::RowFlow;

/// 应用主结构
pub struct App {
    config: Config,
    table: Arc<WizardTable>,
    run_log: RunLog,
    _browser: Browser,
    drivers: Vec<ChromeDriver>,
    cancel: CancellationToken,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        config.validate()?;

        // 初始化运行日志
        let run_log = RunLog::create(&config.output_log_file, "海牙认证处理日志")?;

        let table = Arc::new(load_table(&config).await?);
        log_startup(&table.name, config.sessions);

        let browser = if config.launch_browser {
            let chrome = config.chrome_executable.as_deref();
            browser::launch_browser(config.headless, chrome).await?
        } else {
            browser::connect_to_browser(config.browser_debug_port).await?
        };

        // 每个会话一个独立的浏览器上下文
        let mut drivers = Vec::with_capacity(config.sessions);
        for session in 1..=config.sessions {
            let page = browser::open_isolated_page(&browser, session).await?;
            drivers.push(ChromeDriver::new(page));
        }

        Ok(Self {
            config,
            table,
            run_log,
            _browser: browser,
            drivers,
            cancel: CancellationToken::new(),
        })
    }

    /// 取消令牌，触发后各分片在当前记录结束后停止
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<RunStats> {
        let book = RecordBook::open(
            &self.config.input_path,
            &self.config.output_path,
            &self.table,
        )?;
        let records = book.records(&self.config.contact_email, &self.config.default_country);

        if records.is_empty() {
            warn!("⚠️ 表格中没有数据行，程序结束");
            return Ok(RunStats::default());
        }

        let pending = records.iter().filter(|r| !book.is_complete(r.row)).count();
        let shards = split_shards(records, self.drivers.len());
        log_records_loaded(book.row_count(), pending, shards.len());

        let sink = Arc::new(Mutex::new(book));
        let flow = Arc::new(RowFlow::new(self.table.clone(), self.config.flow_settings()));

        let mut handles = Vec::with_capacity(shards.len());
        for (index, (driver, shard)) in self.drivers.iter().cloned().zip(shards).enumerate() {
            let session = index + 1;
            let flow = flow.clone();
            let sink = sink.clone();
            let run_log = self.run_log.clone();
            let cancel = self.cancel.clone();
            let options = ShardOptions {
                session,
                pause: self.config.pause_between_records,
            };

            let handle = tokio::spawn(async move {
                let run_log = Some(&run_log);
                process_shard(&driver, &flow, &shard, &*sink, run_log, options, &cancel).await
            });
            handles.push((session, handle));
        }

        // 等待所有分片完成
        let mut stats = RunStats::default();
        let mut fatal: Option<AppError> = None;
        for (session, handle) in handles {
            match handle.await {
                Ok(Ok(shard_stats)) => stats.merge(&shard_stats),
                Ok(Err(e)) => {
                    error!("[会话 {}] ❌ 分片中止: {}", session, e);
                    fatal.get_or_insert(e);
                }
                Err(e) => {
                    error!("[会话 {}] 任务执行失败: {}", session, e);
                }
            }
        }

        print_final_stats(
            &stats,
            &self.config.output_path.display().to_string(),
            &self.config.output_log_file,
        );

        if let Some(e) = fatal {
            return Err(e.into());
        }
        Ok(stats)
    }
}

/// 加载流程表：自定义 TOML 优先，否则使用内置流程
async fn load_table(config: &Config) -> Result<WizardTable> {
    let table = match &config.wizard_file {
        Some(path) => {
            info!("📁 加载自定义向导配置: {}", path.display());
            load_wizard_table(path).await?
        }
        None => preset(config.workflow, &config.payer),
    };
    table
        .check()
        .map_err(|msg| AppError::Config(format!("流程 {}: {}", table.name, msg)))?;
    Ok(table)
}
