//! 运行日志 - 业务能力层
//!
//! 只负责"写运行日志文件"能力：每条记录一行，便于事后对账。

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::AppResult;
use crate::models::{InputRecord, RowResult};

/// 运行日志
///
/// 职责：
/// - 启动时写入带时间的表头
/// - 每条记录处理完追加一行
/// - 不关心流程顺序
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    /// 创建日志文件并写入表头（覆盖旧文件）
    pub fn create(path: impl Into<PathBuf>, title: &str) -> AppResult<Self> {
        let path = path.into();
        let header = format!(
            "{}\n{} - {}\n{}\n\n",
            "=".repeat(60),
            title,
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            "=".repeat(60)
        );
        fs::write(&path, header)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 追加一条记录的结果
    ///
    /// # 参数
    /// - `session`: 会话编号
    /// - `record`: 输入记录
    /// - `result`: 最终结论
    pub fn append(
        &self,
        session: usize,
        record: &InputRecord,
        result: &RowResult,
    ) -> AppResult<()> {
        debug!("写入运行日志: {} {}", record, result.label());

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let line = format!(
            "{} | 会话 {} | 行 {} | 代码 {} | {}\n",
            chrono::Local::now().format("%H:%M:%S"),
            session,
            record.sheet_row(),
            record.id_code,
            result
        );
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}
