/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use tracing::info;

use crate::models::RunStats;

/// 记录程序启动信息
///
/// # 参数
/// - `workflow`: 流程名
/// - `sessions`: 会话数
pub fn log_startup(workflow: &str, sessions: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 流程 {}", workflow);
    info!("📊 并行会话数: {}", sessions);
    info!("{}", "=".repeat(60));
}

/// 记录表格加载信息
///
/// # 参数
/// - `total`: 记录总数
/// - `pending`: 尚未成功的记录数
/// - `sessions`: 会话数
pub fn log_records_loaded(total: usize, pending: usize, sessions: usize) {
    info!("✓ 读取到 {} 条记录，其中 {} 条待处理", total, pending);
    info!("📋 分成 {} 个分片并行处理", sessions);
}

/// 记录分片开始信息
pub fn log_shard_start(session: usize, first_row: usize, last_row: usize, count: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 会话 {} 开始处理", session);
    info!("📄 表格行: {}-{} / 共 {} 条", first_row, last_row, count);
    info!("{}", "=".repeat(60));
}

/// 记录分片完成信息
pub fn log_shard_complete(session: usize, stats: &RunStats) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ 会话 {} 完成: 成功 {}/{} (跳过 {})",
        session,
        stats.success,
        stats.processed(),
        stats.skipped
    );
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `stats`: 汇总统计
/// - `output_path`: 结果表格路径
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(stats: &RunStats, output_path: &str, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", stats.success, stats.processed());
    info!("🔎 无记录: {}", stats.not_found);
    info!("🚫 输入不合法: {}", stats.invalid_input);
    info!("🤖 疑似反爬: {}", stats.antibot);
    info!("❌ 错误: {}", stats.error);
    info!("⏭️ 跳过: {}", stats.skipped);
    info!("{}", "=".repeat(60));
    info!("\n结果已保存至: {}", output_path);
    info!("日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
