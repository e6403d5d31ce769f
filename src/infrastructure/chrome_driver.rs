//! Chrome 驱动 - 基础设施层
//!
//! 持有唯一的 page 资源，把向导原语翻译成页面内执行的 JS

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tokio::time::sleep;
use tracing::debug;

use crate::error::{DriverError, DriverResult};
use crate::infrastructure::driver::WizardDriver;

/// 逐键输入时的按键间隔
const KEY_DELAY: Duration = Duration::from_millis(100);

/// Chrome 驱动
///
/// 职责：
/// - 持有一个会话的 Page（每个会话独立的浏览器上下文）
/// - 暴露 eval() 和向导原语
/// - 不认识记录 / 页面表 / 流程
#[derive(Clone)]
pub struct ChromeDriver {
    page: Page,
}

/// 读取类脚本的统一返回结构（null 无法直接反序列化）
#[derive(Debug, Deserialize)]
struct Lookup {
    found: bool,
    #[serde(default)]
    value: Option<String>,
}

impl ChromeDriver {
    /// 创建新的驱动
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于其他操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> DriverResult<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(
        &self,
        js_code: impl Into<String>,
    ) -> DriverResult<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    /// 对第一个匹配元素执行一段脚本，元素不存在时报错
    ///
    /// `body` 中可以使用变量 `el`。
    async fn with_element(&self, selector: &str, body: &str) -> DriverResult<Lookup> {
        let js_code = format!(
            r#"
            (() => {{
                const el = document.querySelector({selector});
                if (!el) {{
                    return {{ found: false }};
                }}
                {body}
            }})()
            "#,
            selector = serde_json::to_string(selector)?,
            body = body,
        );
        let lookup: Lookup = self.eval_as(js_code).await?;
        if !lookup.found {
            return Err(DriverError::ElementNotFound(selector.to_string()));
        }
        Ok(lookup)
    }
}

#[async_trait]
impl WizardDriver for ChromeDriver {
    async fn goto(&self, url: &str) -> DriverResult<()> {
        debug!("导航到: {}", url);
        self.page.goto(url).await?;
        Ok(())
    }

    async fn probe(&self, selector: &str, text: Option<&str>, visible: bool) -> DriverResult<bool> {
        let js_code = format!(
            r#"
            (() => {{
                const text = {text};
                const visible = {visible};
                return Array.from(document.querySelectorAll({selector})).some((el) => {{
                    if (visible) {{
                        const style = window.getComputedStyle(el);
                        const rect = el.getBoundingClientRect();
                        if (style.display === 'none' || style.visibility === 'hidden') return false;
                        if (rect.width === 0 && rect.height === 0) return false;
                    }}
                    if (text === null) return true;
                    return (el.innerText || el.textContent || '').includes(text);
                }});
            }})()
            "#,
            selector = serde_json::to_string(selector)?,
            text = serde_json::to_string(&text)?,
            visible = visible,
        );
        self.eval_as(js_code).await
    }

    async fn read_text(&self, selector: &str) -> DriverResult<Option<String>> {
        match self
            .with_element(
                selector,
                "return { found: true, value: (el.innerText || el.textContent || '').trim() };",
            )
            .await
        {
            Ok(lookup) => Ok(lookup.value),
            Err(DriverError::ElementNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn read_attribute(&self, selector: &str, name: &str) -> DriverResult<Option<String>> {
        // 优先取属性对象上的值，href 会被解析成绝对地址
        let body = format!(
            r#"
            const name = {};
            const prop = el[name];
            const value = typeof prop === 'string' && prop ? prop : el.getAttribute(name);
            return {{ found: true, value: value }};
            "#,
            serde_json::to_string(name)?
        );
        match self.with_element(selector, &body).await {
            Ok(lookup) => Ok(lookup.value),
            Err(DriverError::ElementNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn fill(&self, selector: &str, value: &str) -> DriverResult<()> {
        let body = format!(
            r#"
            el.focus();
            el.value = {};
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return {{ found: true }};
            "#,
            serde_json::to_string(value)?
        );
        self.with_element(selector, &body).await?;
        Ok(())
    }

    async fn type_keys(&self, selector: &str, value: &str) -> DriverResult<()> {
        // 先清空，掩码输入框只认真实按键
        self.with_element(selector, "el.value = ''; el.focus(); return { found: true };")
            .await?;

        let element = self.page.find_element(selector).await?;
        element.click().await?;
        for ch in value.chars() {
            element.type_str(ch.to_string()).await?;
            sleep(KEY_DELAY).await;
        }
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> DriverResult<()> {
        // change 放到下一轮事件循环，避免回发导航打断本次脚本执行
        let body = format!(
            r#"
            el.value = {};
            setTimeout(() => el.dispatchEvent(new Event('change', {{ bubbles: true }})), 0);
            return {{ found: true, value: el.value }};
            "#,
            serde_json::to_string(value)?
        );
        let lookup = self.with_element(selector, &body).await?;
        if lookup.value.as_deref() != Some(value) {
            return Err(DriverError::Other(format!(
                "下拉框 {} 中没有选项 {}",
                selector, value
            )));
        }
        Ok(())
    }

    async fn click(&self, selector: &str) -> DriverResult<()> {
        self.with_element(
            selector,
            r#"
            el.scrollIntoView({ block: 'center' });
            setTimeout(() => el.click(), 0);
            return { found: true };
            "#,
        )
        .await?;
        Ok(())
    }

    async fn set_checked(&self, selector: &str) -> DriverResult<bool> {
        let lookup = self
            .with_element(
                selector,
                r#"
                el.scrollIntoView({ block: 'center' });
                if (!el.checked) el.click();
                return { found: true, value: String(el.checked) };
                "#,
            )
            .await?;
        Ok(lookup.value.as_deref() == Some("true"))
    }

    async fn go_back(&self) -> DriverResult<()> {
        self.eval("(() => { setTimeout(() => window.history.back(), 0); return true; })()")
            .await?;
        Ok(())
    }

    async fn stamp_document(&self, token: &str) -> DriverResult<()> {
        let js_code = format!(
            "(() => {{ window.__wizardStamp = {}; return true; }})()",
            serde_json::to_string(token)?
        );
        self.eval(js_code).await?;
        Ok(())
    }

    async fn document_stamped(&self, token: &str) -> DriverResult<bool> {
        let js_code = format!(
            "(() => window.__wizardStamp === {})()",
            serde_json::to_string(token)?
        );
        self.eval_as(js_code).await
    }
}
