//! 输入记录与身份校验

use std::fmt;

use serde::{Deserialize, Serialize};

use super::date::date_candidates;

/// 空代码的观察文本
pub const MSG_EMPTY_CODE: &str = "Código vacío";
/// 非法日期的观察文本
pub const MSG_INVALID_DATE: &str = "Fecha de expedición inválida";
/// 非法邮箱的观察文本
pub const MSG_INVALID_EMAIL: &str = "Correo electrónico inválido";

/// 表格中的一行输入，读取后不再修改
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRecord {
    /// 数据行下标（表头之后从 0 开始）
    pub row: usize,
    /// `#` 列的原始值
    pub number: String,
    /// 身份代码（申请编号或证件号），已清理
    pub id_code: String,
    pub name: Option<String>,
    pub email: String,
    pub issue_date: Option<String>,
    pub country: Option<String>,
}

impl InputRecord {
    /// 表格中的行号（1 是表头）
    pub fn sheet_row(&self) -> usize {
        self.row + 2
    }
}

impl fmt::Display for InputRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[行 {} 代码 {}]", self.sheet_row(), self.id_code)
    }
}

/// 清理单元格里的身份代码
///
/// 去掉首尾空白以及数值单元格留下的 `.0` 后缀。
pub fn clean_code(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed.strip_suffix(".0").unwrap_or(trimmed).to_string()
}

/// 身份校验规则
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRule {
    /// 代码必须以此前缀开头
    #[serde(default)]
    pub prefix: Option<String>,
    /// 代码最小长度
    #[serde(default)]
    pub min_len: usize,
    #[serde(default)]
    pub require_email: bool,
    #[serde(default)]
    pub require_issue_date: bool,
}

impl IdentityRule {
    /// 校验记录，失败时返回写入观察列的文本
    pub fn validate(&self, record: &InputRecord) -> Result<(), String> {
        let code = record.id_code.as_str();
        if code.is_empty() {
            return Err(MSG_EMPTY_CODE.to_string());
        }

        let numeric = code.chars().all(|c| c.is_ascii_digit());
        let prefixed = self
            .prefix
            .as_deref()
            .map_or(true, |prefix| code.starts_with(prefix));
        if !numeric || !prefixed || code.len() < self.min_len {
            return Err(self.invalid_code_message());
        }

        if self.require_email && !looks_like_email(&record.email) {
            return Err(MSG_INVALID_EMAIL.to_string());
        }

        if self.require_issue_date {
            let valid = record
                .issue_date
                .as_deref()
                .map_or(false, |d| !date_candidates(d).is_empty());
            if !valid {
                return Err(MSG_INVALID_DATE.to_string());
            }
        }

        Ok(())
    }

    fn invalid_code_message(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("Código inválido o no inicia con {}", prefix),
            None => "Código inválido".to_string(),
        }
    }
}

fn looks_like_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((user, domain)) => !user.is_empty() && domain.contains('.') && !domain.ends_with('.'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str) -> InputRecord {
        InputRecord {
            row: 0,
            number: "1".into(),
            id_code: clean_code(code),
            name: None,
            email: "apostillamen@gmail.com".into(),
            issue_date: None,
            country: None,
        }
    }

    fn prefixed_rule() -> IdentityRule {
        IdentityRule {
            prefix: Some("52".into()),
            ..Default::default()
        }
    }

    #[test]
    fn conforming_code_passes() {
        assert!(prefixed_rule().validate(&record("5212345678")).is_ok());
        assert!(prefixed_rule().validate(&record(" 5212345678.0 ")).is_ok());
    }

    #[test]
    fn non_conforming_codes_are_rejected() {
        let rule = prefixed_rule();
        assert_eq!(rule.validate(&record("")), Err(MSG_EMPTY_CODE.to_string()));
        assert_eq!(
            rule.validate(&record("4312345678")),
            Err("Código inválido o no inicia con 52".to_string())
        );
        assert!(rule.validate(&record("52AB345678")).is_err());
        assert!(rule.validate(&record("52-123")).is_err());
    }

    #[test]
    fn issue_date_and_email_are_checked_when_required() {
        let rule = IdentityRule {
            require_email: true,
            require_issue_date: true,
            ..Default::default()
        };
        let mut rec = record("1073249475");
        assert_eq!(rule.validate(&rec), Err(MSG_INVALID_DATE.to_string()));

        rec.issue_date = Some("02122015".into());
        assert!(rule.validate(&rec).is_ok());

        rec.email = "sin-arroba".into();
        assert_eq!(rule.validate(&rec), Err(MSG_INVALID_EMAIL.to_string()));
    }
}
