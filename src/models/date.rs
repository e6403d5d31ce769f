//! 发证日期的候选解释
//!
//! 表格里的日期经常只有数字（例如 `08061997`），日在前还是月在前无法确定。
//! 这里按"日在前、月在前"的顺序给出所有合法解释，统一格式化成网站输入框
//! 需要的 `DDMMYYYY` 数字串。

use chrono::NaiveDate;

/// 网站日期输入框的格式
pub const MASK_FORMAT: &str = "%d%m%Y";

/// 生成日期候选，按优先级排序并去重
///
/// 无法解析时返回空列表。
pub fn date_candidates(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    // 带分隔符且年份在前：YYYY-MM-DD，没有歧义
    let groups: Vec<&str> = trimmed
        .split(|c: char| !c.is_ascii_digit())
        .filter(|g| !g.is_empty())
        .collect();
    if groups.len() == 3 && groups[0].len() == 4 {
        return parse_ymd(groups[0], groups[1], groups[2])
            .map(|d| vec![d.format(MASK_FORMAT).to_string()])
            .unwrap_or_default();
    }

    let digits: String = if groups.len() == 3 {
        format!("{:0>2}{:0>2}{}", groups[0], groups[1], groups[2])
    } else {
        trimmed.chars().filter(|c| c.is_ascii_digit()).collect()
    };

    // 数值单元格会丢掉前导零
    let digits = match digits.len() {
        7 => format!("0{}", digits),
        8 => digits,
        _ => return Vec::new(),
    };

    let (first, second, year) = (&digits[0..2], &digits[2..4], &digits[4..8]);

    let mut candidates = Vec::new();
    let interpretations = [
        parse_ymd(year, second, first), // 日在前
        parse_ymd(year, first, second), // 月在前
    ];
    for date in interpretations.into_iter().flatten() {
        let formatted = date.format(MASK_FORMAT).to_string();
        if !candidates.contains(&formatted) {
            candidates.push(formatted);
        }
    }
    candidates
}

fn parse_ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}
