use crate::error::{AppError, AppResult};
use crate::models::wizard::WizardTable;
use std::path::Path;
use tokio::fs;

/// 从 TOML 文件加载向导配置表
pub async fn load_wizard_table(toml_file_path: &Path) -> AppResult<WizardTable> {
    let content = fs::read_to_string(toml_file_path).await?;
    let table = parse_wizard_table(&content, toml_file_path)?;

    tracing::info!(
        "已加载向导配置 {}: {} 个页面",
        toml_file_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy(),
        table.pages.len()
    );

    Ok(table)
}

/// 解析 TOML 文本
pub fn parse_wizard_table(content: &str, origin: &Path) -> AppResult<WizardTable> {
    let table: WizardTable = toml::from_str(content).map_err(|source| AppError::WizardTable {
        path: origin.to_path_buf(),
        source,
    })?;

    table
        .check()
        .map_err(|msg| AppError::Config(format!("向导配置 {}: {}", origin.display(), msg)))?;

    Ok(table)
}
