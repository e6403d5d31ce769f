use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Cli;
use crate::error::{AppError, AppResult};
use crate::infrastructure::Waits;
use crate::models::{Payer, Workflow};
use crate::workflow::FlowSettings;

/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    /// 要运行的流程
    pub workflow: Workflow,
    /// 输入表格
    pub input_path: PathBuf,
    /// 输出表格
    pub output_path: PathBuf,
    /// 所有记录共用的联系邮箱
    pub contact_email: String,
    /// 两条记录之间的停顿
    pub pause_between_records: Duration,
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 自己启动浏览器而不是连接
    pub launch_browser: bool,
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
    /// 并行会话数
    pub sessions: usize,
    // --- 等待与重试 ---
    pub marker_timeout: Duration,
    pub poll_interval: Duration,
    /// 触发后等待文档被替换的时间
    pub transition_grace: Duration,
    pub challenge_budget: u32,
    pub timeout_retries: u32,
    pub back_navigation_cap: u32,
    /// 覆盖流程表里的单条记录时限
    pub record_budget: Option<Duration>,
    /// 自定义向导配置表
    pub wizard_file: Option<PathBuf>,
    // --- 流程常量 ---
    pub default_country: String,
    pub payer: Payer,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 运行日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workflow: Workflow::Consulta,
            input_path: PathBuf::from("entrada.xlsx"),
            output_path: PathBuf::from("salida.xlsx"),
            contact_email: "apostillamen@gmail.com".to_string(),
            pause_between_records: Duration::from_millis(2_500),
            browser_debug_port: 9222,
            launch_browser: false,
            headless: false,
            chrome_executable: None,
            sessions: 1,
            marker_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_millis(250),
            transition_grace: Duration::from_secs(3),
            challenge_budget: 2,
            timeout_retries: 2,
            back_navigation_cap: 8,
            record_budget: None,
            wizard_file: None,
            default_country: "173".to_string(),
            payer: Payer {
                document_type: "2".to_string(),
                ..Payer::default()
            },
            verbose_logging: false,
            output_log_file: "apostilla.log".to_string(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn env_or(name: &str, default: String) -> String {
    std::env::var(name).unwrap_or(default)
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name).ok().map(PathBuf::from)
}

fn env_secs(name: &str) -> Option<Duration> {
    env_parse::<f64>(name).and_then(|s| Duration::try_from_secs_f64(s).ok())
}

fn env_millis(name: &str) -> Option<Duration> {
    env_parse(name).map(Duration::from_millis)
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        let payer = default.payer;
        Self {
            workflow: env_parse("APOSTILLA_WORKFLOW").unwrap_or(default.workflow),
            input_path: env_path("INPUT_FILE").unwrap_or(default.input_path),
            output_path: env_path("OUTPUT_FILE").unwrap_or(default.output_path),
            contact_email: env_or("CONTACT_EMAIL", default.contact_email),
            pause_between_records: env_secs("PAUSE_SECS").unwrap_or(default.pause_between_records),
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT")
                .unwrap_or(default.browser_debug_port),
            launch_browser: env_parse("LAUNCH_BROWSER").unwrap_or(default.launch_browser),
            headless: env_parse("HEADLESS").unwrap_or(default.headless),
            chrome_executable: env_path("CHROME_EXECUTABLE").or(default.chrome_executable),
            sessions: env_parse("SESSIONS").unwrap_or(default.sessions),
            marker_timeout: env_secs("MARKER_TIMEOUT_SECS").unwrap_or(default.marker_timeout),
            poll_interval: env_millis("POLL_INTERVAL_MS").unwrap_or(default.poll_interval),
            transition_grace: env_millis("TRANSITION_GRACE_MS")
                .unwrap_or(default.transition_grace),
            challenge_budget: env_parse("CHALLENGE_BUDGET").unwrap_or(default.challenge_budget),
            timeout_retries: env_parse("TIMEOUT_RETRIES").unwrap_or(default.timeout_retries),
            back_navigation_cap: env_parse("BACK_NAVIGATION_CAP")
                .unwrap_or(default.back_navigation_cap),
            record_budget: env_secs("RECORD_BUDGET_SECS").or(default.record_budget),
            wizard_file: env_path("WIZARD_FILE").or(default.wizard_file),
            default_country: env_or("DEFAULT_COUNTRY", default.default_country),
            payer: Payer {
                document_type: env_or("PAYER_DOCUMENT_TYPE", payer.document_type),
                document_number: env_or("PAYER_DOCUMENT_NUMBER", payer.document_number),
                full_name: env_or("PAYER_NAME", payer.full_name),
                phone: env_or("PAYER_PHONE", payer.phone),
                email: env_or("PAYER_EMAIL", payer.email),
            },
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(default.verbose_logging),
            output_log_file: env_or("OUTPUT_LOG_FILE", default.output_log_file),
        }
    }

    /// 用命令行参数覆盖
    pub fn with_cli(mut self, cli: &Cli) -> Self {
        if let Some(workflow) = cli.workflow {
            self.workflow = workflow;
        }
        if let Some(input) = &cli.input {
            self.input_path = input.clone();
        }
        if let Some(output) = &cli.output {
            self.output_path = output.clone();
        }
        if let Some(email) = &cli.email {
            self.contact_email = email.clone();
        }
        if let Some(pause) = cli.pause_secs.and_then(|s| Duration::try_from_secs_f64(s).ok()) {
            self.pause_between_records = pause;
        }
        if let Some(sessions) = cli.sessions {
            self.sessions = sessions;
        }
        if let Some(port) = cli.port {
            self.browser_debug_port = port;
        }
        if let Some(chrome) = &cli.chrome {
            self.chrome_executable = Some(chrome.clone());
        }
        if let Some(wizard) = &cli.wizard {
            self.wizard_file = Some(wizard.clone());
        }
        self.launch_browser |= cli.launch;
        self.headless |= cli.headless;
        self.verbose_logging |= cli.verbose;
        self
    }

    /// 启动前检查
    pub fn validate(&self) -> AppResult<()> {
        if self.sessions == 0 {
            return Err(AppError::Config("会话数必须大于 0".to_string()));
        }
        if self.input_path == self.output_path {
            return Err(AppError::Config(
                "输入和输出不能是同一个文件".to_string(),
            ));
        }
        if self.contact_email.trim().is_empty() {
            return Err(AppError::Config("联系邮箱不能为空".to_string()));
        }
        if self.workflow == Workflow::Liquidacion
            && self.wizard_file.is_none()
            && !self.payer.is_complete()
        {
            return Err(AppError::Config(format!(
                "liquidacion 流程需要完整的缴费人信息 ({})",
                "PAYER_DOCUMENT_NUMBER, PAYER_NAME, PAYER_PHONE, PAYER_EMAIL"
            )));
        }
        Ok(())
    }

    pub fn waits(&self) -> Waits {
        Waits {
            marker_timeout: self.marker_timeout,
            poll: self.poll_interval,
            transition: self.transition_grace,
        }
    }

    /// 流程参数
    pub fn flow_settings(&self) -> FlowSettings {
        FlowSettings {
            waits: self.waits(),
            challenge_budget: self.challenge_budget,
            timeout_retries: self.timeout_retries,
            back_cap: self.back_navigation_cap,
            record_budget: self.record_budget,
            ..FlowSettings::default()
        }
    }
}
