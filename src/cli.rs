//! 命令行参数
//!
//! 命令行的值覆盖环境变量，环境变量覆盖默认值。

use std::path::PathBuf;

use clap::Parser;

use crate::models::Workflow;

/// 海牙认证网站批量处理工具
#[derive(Debug, Parser)]
#[command(name = "apostilla_wizard", version, about)]
pub struct Cli {
    /// 要运行的流程
    #[arg(long, short = 'w', value_enum)]
    pub workflow: Option<Workflow>,

    /// 输入表格
    #[arg(long = "excel", short = 'i')]
    pub input: Option<PathBuf>,

    /// 输出表格（已存在时从中继续）
    #[arg(long = "salida", short = 'o')]
    pub output: Option<PathBuf>,

    /// 联系邮箱
    #[arg(long = "correo")]
    pub email: Option<String>,

    /// 两条记录之间的停顿（秒）
    #[arg(long = "pausa")]
    pub pause_secs: Option<f64>,

    /// 并行会话数
    #[arg(long)]
    pub sessions: Option<usize>,

    /// 连接已有浏览器的调试端口
    #[arg(long)]
    pub port: Option<u16>,

    /// 自己启动浏览器而不是连接已有浏览器
    #[arg(long, default_value_t = false)]
    pub launch: bool,

    /// 启动浏览器时使用无头模式
    #[arg(long, default_value_t = false)]
    pub headless: bool,

    /// 浏览器可执行文件
    #[arg(long)]
    pub chrome: Option<PathBuf>,

    /// 自定义向导配置表（TOML），替代内置流程
    #[arg(long)]
    pub wizard: Option<PathBuf>,

    /// 显示详细日志
    #[arg(long, short, default_value_t = false)]
    pub verbose: bool,
}
