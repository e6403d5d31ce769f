//! 记录表 - 业务能力层
//!
//! 读取输入表格、校验表头、给出输入记录，并在每条记录处理完后整表落盘。
//! 已存在输出文件时从输出文件继续，已成功的行会被跳过。

use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, DataType, Reader};
use rust_xlsxwriter::{Color, Format, Workbook, XlsxError};
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::presets::{MSG_ANTIBOT, MSG_NOT_FOUND, MSG_NO_DATE_ACCEPTED};
use crate::models::record::{MSG_EMPTY_CODE, MSG_INVALID_DATE, MSG_INVALID_EMAIL};
use crate::models::{clean_code, Extracted, InputRecord, RowResult, SheetLayout, WizardTable};

/// 无记录、输入不合法时的底色
pub const FILL_RED: u32 = 0xFF9999;
/// 疑似反爬时的底色
pub const FILL_YELLOW: u32 = 0xFFFF99;
/// 网站返回的拒绝文本写入观察列时加的前缀，重新打开时据此还原底色
pub const REJECTION_PREFIX: &str = "Rechazado: ";

/// 结果落盘的去处
///
/// 每次 `persist` 返回时结果必须已经持久化，进程随后被杀也不会丢。
pub trait RecordSink: Send {
    /// 该行是否已经成功处理过
    fn is_complete(&self, row: usize) -> bool;

    /// 写入一条记录的结果
    fn persist(&mut self, row: usize, result: &RowResult) -> AppResult<()>;
}

/// 单元格样式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellMark {
    Plain,
    /// 超链接（蓝色下划线）
    Hyperlink,
    /// 带底色
    Fill(u32),
}

/// 内存中的整张表，写回时保留所有输入列
pub struct RecordBook {
    output: PathBuf,
    layout: SheetLayout,
    success_observation: String,
    rows: Vec<Vec<String>>,
    marks: Vec<Vec<CellMark>>,
}

impl RecordBook {
    /// 打开记录表
    ///
    /// 输出文件已存在时读取输出文件，否则读取输入文件。
    /// 表头（去空白、转大写后）必须与流程的列定义完全一致。
    pub fn open(input: &Path, output: &Path, table: &WizardTable) -> AppResult<Self> {
        let source = if output.exists() { output } else { input };
        if source == output {
            info!("📂 发现已有输出文件，继续上次进度: {}", output.display());
        } else {
            info!("📂 读取输入文件: {}", input.display());
        }

        let layout = table.layout.clone();
        let read_error = |e: calamine::Error| AppError::SheetRead {
            path: source.to_path_buf(),
            source: e,
        };

        let mut workbook = open_workbook_auto(source).map_err(read_error)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| AppError::EmptyWorkbook {
                path: source.to_path_buf(),
            })?
            .map_err(read_error)?;

        let mut sheet_rows = range.rows();
        let mut header: Vec<String> = sheet_rows
            .next()
            .ok_or_else(|| AppError::EmptyWorkbook {
                path: source.to_path_buf(),
            })?
            .iter()
            .map(|cell| cell_text(cell).to_uppercase())
            .collect();
        while header.last().is_some_and(|h| h.is_empty()) {
            header.pop();
        }
        if header != layout.columns {
            return Err(AppError::SchemaMismatch {
                path: source.to_path_buf(),
                expected: layout.columns.clone(),
                found: header,
            });
        }

        let width = layout.columns.len();
        let rows: Vec<Vec<String>> = sheet_rows
            .map(|row| {
                (0..width)
                    .map(|i| row.get(i).map(cell_text).unwrap_or_default())
                    .collect::<Vec<_>>()
            })
            .filter(|cells| cells.iter().any(|c| !c.is_empty()))
            .collect();

        let marks = rows.iter().map(|cells| derive_marks(&layout, cells)).collect();
        debug!("读取到 {} 行数据", rows.len());

        Ok(Self {
            output: output.to_path_buf(),
            layout,
            success_observation: table.success_observation.clone(),
            rows,
            marks,
        })
    }

    /// 把每一行转换成输入记录
    ///
    /// # 参数
    /// - `email`: 所有记录共用的联系邮箱
    /// - `default_country`: 没有国家列或国家为空时使用
    pub fn records(&self, email: &str, default_country: &str) -> Vec<InputRecord> {
        let layout = &self.layout;
        let text = |cells: &[String], column: Option<&str>| -> Option<String> {
            column
                .and_then(|c| layout.index_of(c))
                .and_then(|i| cells.get(i))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        self.rows
            .iter()
            .enumerate()
            .map(|(row, cells)| InputRecord {
                row,
                number: text(cells, Some(&layout.number_column)).unwrap_or_default(),
                id_code: clean_code(&text(cells, Some(&layout.id_column)).unwrap_or_default()),
                name: text(cells, layout.name_column.as_deref()),
                email: email.to_string(),
                issue_date: text(cells, layout.date_column.as_deref()),
                country: text(cells, layout.country_column.as_deref()).or_else(|| {
                    Some(default_country.trim().to_string()).filter(|c| !c.is_empty())
                }),
            })
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// 读取单元格文本
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.layout.index_of(column)?;
        self.rows.get(row)?.get(index).map(String::as_str)
    }

    /// 读取单元格样式
    pub fn mark(&self, row: usize, column: &str) -> CellMark {
        self.layout
            .index_of(column)
            .and_then(|i| self.marks.get(row)?.get(i).copied())
            .unwrap_or(CellMark::Plain)
    }

    /// 把结果写进内存中的行
    pub fn apply(&mut self, row: usize, result: &RowResult) {
        let layout = &self.layout;
        let (Some(cells), Some(marks)) = (self.rows.get_mut(row), self.marks.get_mut(row)) else {
            return;
        };
        let Some(obs) = layout.index_of(&layout.observation_column) else {
            return;
        };

        let (observation, mark) = match result {
            RowResult::Success(extracted) => {
                let (column, mark) = match extracted {
                    Extracted::Link(url) => (
                        layout.link_output.as_deref().or(layout.code_output.as_deref()),
                        if url.starts_with("http") {
                            CellMark::Hyperlink
                        } else {
                            CellMark::Plain
                        },
                    ),
                    Extracted::Code(_) => (layout.code_output.as_deref(), CellMark::Plain),
                };
                if let Some(index) = column.and_then(|c| layout.index_of(c)) {
                    cells[index] = extracted.value().to_string();
                    marks[index] = mark;
                }
                (self.success_observation.clone(), CellMark::Plain)
            }
            RowResult::NotFound => (MSG_NOT_FOUND.to_string(), CellMark::Fill(FILL_RED)),
            RowResult::InvalidInput(msg) => (invalid_observation(msg), CellMark::Fill(FILL_RED)),
            RowResult::AntibotSuspected => (MSG_ANTIBOT.to_string(), CellMark::Fill(FILL_YELLOW)),
            RowResult::Error(msg) => (msg.clone(), CellMark::Plain),
        };
        cells[obs] = observation;
        marks[obs] = mark;
    }

    /// 整表写入输出文件
    ///
    /// 先写临时文件再改名，写到一半被杀不会损坏已有的输出。
    pub fn flush(&self) -> AppResult<()> {
        let temp = self.output.with_extension("xlsx.part");
        self.write_to(&temp).map_err(|e| AppError::SheetWrite {
            path: temp.clone(),
            source: e,
        })?;
        std::fs::rename(&temp, &self.output)?;
        debug!("已保存: {}", self.output.display());
        Ok(())
    }

    fn write_to(&self, path: &Path) -> Result<(), XlsxError> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        let bold = Format::new().set_bold();
        let red = Format::new().set_background_color(Color::RGB(FILL_RED));
        let yellow = Format::new().set_background_color(Color::RGB(FILL_YELLOW));

        for (col, name) in self.layout.columns.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, name, &bold)?;
        }

        let number = self.layout.index_of(&self.layout.number_column);
        for (r, (cells, marks)) in self.rows.iter().zip(&self.marks).enumerate() {
            let row = (r + 1) as u32;
            for (c, (text, mark)) in cells.iter().zip(marks).enumerate() {
                let col = c as u16;
                match mark {
                    CellMark::Hyperlink if !text.is_empty() => {
                        sheet.write_url(row, col, text.as_str())?;
                    }
                    CellMark::Fill(rgb) => {
                        let format = if *rgb == FILL_YELLOW { &yellow } else { &red };
                        if text.is_empty() {
                            sheet.write_blank(row, col, format)?;
                        } else {
                            sheet.write_string_with_format(row, col, text, format)?;
                        }
                    }
                    _ if text.is_empty() => {}
                    _ => match text.parse::<f64>() {
                        Ok(n) if Some(c) == number => {
                            sheet.write_number(row, col, n)?;
                        }
                        _ => {
                            sheet.write_string(row, col, text)?;
                        }
                    },
                }
            }
        }

        sheet.autofit();
        workbook.save(path)?;
        Ok(())
    }
}

impl RecordSink for RecordBook {
    fn is_complete(&self, row: usize) -> bool {
        let layout = &self.layout;
        let observation_done = self
            .cell(row, &layout.observation_column)
            .is_some_and(|obs| obs.trim() == self.success_observation);
        let output_filled = [layout.link_output.as_deref(), layout.code_output.as_deref()]
            .into_iter()
            .flatten()
            .filter(|column| *column != layout.id_column)
            .any(|column| self.cell(row, column).is_some_and(|v| !v.trim().is_empty()));
        observation_done || output_filled
    }

    fn persist(&mut self, row: usize, result: &RowResult) -> AppResult<()> {
        self.apply(row, result);
        self.flush()
    }
}

/// 单元格转成文本
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_date()
            .map(|d| d.format("%d/%m/%Y").to_string())
            .unwrap_or_else(|| cell.to_string()),
        other => other.to_string().trim().to_string(),
    }
}

/// 从已有的文本还原单元格样式（读回已有输出文件时使用）
fn derive_marks(layout: &SheetLayout, cells: &[String]) -> Vec<CellMark> {
    let link = layout.link_output.as_deref().and_then(|c| layout.index_of(c));
    let obs = layout.index_of(&layout.observation_column);

    cells
        .iter()
        .enumerate()
        .map(|(i, text)| {
            if Some(i) == link && text.starts_with("http") {
                CellMark::Hyperlink
            } else if Some(i) == obs {
                observation_mark(text)
            } else {
                CellMark::Plain
            }
        })
        .collect()
}

/// 输入不合法时写入观察列的文本
///
/// 固定的校验文本原样写入，网站返回的自由文本加上 `REJECTION_PREFIX`。
fn invalid_observation(msg: &str) -> String {
    if observation_mark(msg) == CellMark::Fill(FILL_RED) {
        msg.to_string()
    } else {
        format!("{}{}", REJECTION_PREFIX, msg.trim())
    }
}

fn observation_mark(text: &str) -> CellMark {
    let text = text.trim();
    if text == MSG_ANTIBOT {
        CellMark::Fill(FILL_YELLOW)
    } else if text == MSG_NOT_FOUND
        || text == MSG_EMPTY_CODE
        || text == MSG_INVALID_DATE
        || text == MSG_INVALID_EMAIL
        || text == MSG_NO_DATE_ACCEPTED
        || text.starts_with("Código inválido")
        || text.starts_with(REJECTION_PREFIX)
    {
        CellMark::Fill(FILL_RED)
    } else {
        CellMark::Plain
    }
}
