use anyhow::Result;
use clap::Parser;
use tracing::warn;

use apostilla_wizard::cli::Cli;
use apostilla_wizard::{logger, App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置：默认值 → 环境变量 → 命令行
    let config = Config::from_env().with_cli(&cli);

    // 初始化日志
    logger::init(config.verbose_logging);

    // 初始化并运行应用
    let app = App::initialize(config).await?;

    let cancel = app.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 收到 Ctrl-C，当前记录完成后停止");
            cancel.cancel();
        }
    });

    app.run().await?;

    Ok(())
}
