//! 终端日志初始化

use tracing_subscriber::EnvFilter;

/// 初始化 tracing 订阅者
///
/// `RUST_LOG` 优先；未设置时 `verbose` 打开本 crate 的 debug 日志。
pub fn init(verbose: bool) {
    let fallback = if verbose {
        "info,apostilla_wizard=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
