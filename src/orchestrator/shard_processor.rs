//! 分片处理器 - 编排层
//!
//! ## 职责
//!
//! 按顺序处理一个分片内的记录：
//! - 跳过之前已成功的行
//! - 委托 `RowFlow` 得到结论
//! - 每条记录处理完立即落盘，再写运行日志
//! - 两条记录之间停顿，期间响应取消
//!
//! 一个分片只使用一个会话，会话之间不共享浏览器状态。

use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::AppResult;
use crate::infrastructure::WizardDriver;
use crate::models::{InputRecord, RunStats};
use crate::services::{RecordSink, RunLog};
use crate::utils::logging::{log_shard_complete, log_shard_start};
use crate::workflow::{RowCtx, RowFlow};

/// 分片参数
#[derive(Debug, Clone, Copy)]
pub struct ShardOptions {
    /// 会话编号（从1开始）
    pub session: usize,
    /// 两条记录之间的停顿
    pub pause: Duration,
}

/// 处理一个分片
///
/// # 返回
/// 分片统计；会话不可恢复时返回错误，已处理的记录都已落盘
pub async fn process_shard<S>(
    driver: &dyn WizardDriver,
    flow: &RowFlow,
    records: &[InputRecord],
    sink: &Mutex<S>,
    run_log: Option<&RunLog>,
    options: ShardOptions,
    cancel: &CancellationToken,
) -> AppResult<RunStats>
where
    S: RecordSink + ?Sized,
{
    let mut stats = RunStats::default();
    let total = records.len();
    if let (Some(first), Some(last)) = (records.first(), records.last()) {
        log_shard_start(options.session, first.sheet_row(), last.sheet_row(), total);
    }

    for (i, record) in records.iter().enumerate() {
        if cancel.is_cancelled() {
            warn!("[会话 {}] 🛑 收到取消信号，停止处理", options.session);
            break;
        }

        let ctx = RowCtx::new(options.session, record, i + 1, total);
        if sink.lock().await.is_complete(record.row) {
            info!("{} ⏭️ 之前已成功，跳过", ctx);
            stats.skipped += 1;
            continue;
        }

        info!("{} ▶️ 开始处理 ({}/{})", ctx, ctx.position, ctx.total);
        let result = flow.process(driver, record, &ctx).await?;
        info!("{} 🏁 结论: {}", ctx, result);

        sink.lock().await.persist(record.row, &result)?;
        if let Some(log) = run_log {
            if let Err(e) = log.append(options.session, record, &result) {
                warn!("{} ⚠️ 写入运行日志失败: {}", ctx, e);
            }
        }
        stats.record(&result);

        if i + 1 < total && !options.pause.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(options.pause) => {}
                _ = cancel.cancelled() => {}
            }
        }
    }

    log_shard_complete(options.session, &stats);
    Ok(stats)
}

/// 把记录切成 `n` 个互不相交的连续分片
///
/// 分片数不超过记录数，也不会出现空分片。
pub fn split_shards(records: Vec<InputRecord>, n: usize) -> Vec<Vec<InputRecord>> {
    let n = n.max(1).min(records.len().max(1));
    let base = records.len() / n;
    let extra = records.len() % n;

    let mut shards = Vec::with_capacity(n);
    let mut rest = records.into_iter();
    for i in 0..n {
        let size = base + usize::from(i < extra);
        let shard: Vec<InputRecord> = rest.by_ref().take(size).collect();
        if !shard.is_empty() {
            shards.push(shard);
        }
    }
    shards
}
