//! 浏览器原语 - 基础设施层
//!
//! 核心只依赖这几类原语：标记检测、填写字段、点击触发、条件等待、后退。
//! 任何能提供这些原语的自动化工具都可以承载上层流程。

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::{DriverError, DriverResult};
use crate::models::Marker;

/// 向导页面的操作原语
///
/// 所有选择器都是 CSS 选择器。实现者不认识记录、页面表或流程。
#[async_trait]
pub trait WizardDriver: Send + Sync {
    /// 打开 URL，等待文档加载完成
    async fn goto(&self, url: &str) -> DriverResult<()>;

    /// 元素是否存在；`visible` 为 true 时还要求可见，`text` 要求包含该文本
    async fn probe(&self, selector: &str, text: Option<&str>, visible: bool) -> DriverResult<bool>;

    /// 读取第一个匹配元素的文本
    async fn read_text(&self, selector: &str) -> DriverResult<Option<String>>;

    /// 读取第一个匹配元素的属性
    async fn read_attribute(&self, selector: &str, name: &str) -> DriverResult<Option<String>>;

    /// 清空并填写输入框
    async fn fill(&self, selector: &str, value: &str) -> DriverResult<()>;

    /// 聚焦后逐键输入（用于带输入掩码的字段）
    async fn type_keys(&self, selector: &str, value: &str) -> DriverResult<()>;

    /// 选择下拉项并触发 change 事件
    async fn select_option(&self, selector: &str, value: &str) -> DriverResult<()>;

    async fn click(&self, selector: &str) -> DriverResult<()>;

    /// 勾选单选框/复选框，返回勾选后的状态
    async fn set_checked(&self, selector: &str) -> DriverResult<bool>;

    /// 浏览器历史后退一步
    async fn go_back(&self) -> DriverResult<()>;

    /// 给当前文档打上标记，文档被回发替换后标记随之消失
    async fn stamp_document(&self, token: &str) -> DriverResult<()>;

    /// 当前文档是否还带着该标记
    async fn document_stamped(&self, token: &str) -> DriverResult<bool>;
}

/// 等待参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Waits {
    /// 等待一个标记出现的上限
    pub marker_timeout: Duration,
    /// 轮询间隔
    pub poll: Duration,
    /// 触发后文档一直没有被替换时，最多等这么久再按原地更新处理
    pub transition: Duration,
}

impl Default for Waits {
    fn default() -> Self {
        Self {
            marker_timeout: Duration::from_secs(15),
            poll: Duration::from_millis(250),
            transition: Duration::from_secs(3),
        }
    }
}

/// 条件等待：反复执行 `probe`，直到返回 `Some` 或超时
///
/// 至少会执行一次探测。超时返回 `Ok(None)`。
/// 瞬时错误（回发导航中执行上下文被销毁等）视为"还没出现"；
/// 到期时如果最后一次探测仍是瞬时错误，返回该错误。
pub async fn wait_until<T, F, Fut>(
    timeout: Duration,
    poll: Duration,
    mut probe: F,
) -> DriverResult<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DriverResult<Option<T>>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        let last_error = match probe().await {
            Ok(Some(value)) => return Ok(Some(value)),
            Ok(None) => None,
            Err(e) if e.is_transient() => {
                debug!("等待中出现瞬时错误，继续等待: {}", e);
                Some(e)
            }
            Err(e) => return Err(e),
        };
        if Instant::now() >= deadline {
            return match last_error {
                Some(e) => Err(e),
                None => Ok(None),
            };
        }
        sleep(poll).await;
    }
}

/// 标记当前是否存在
pub async fn marker_present(driver: &dyn WizardDriver, marker: &Marker) -> DriverResult<bool> {
    driver
        .probe(&marker.selector, marker.text.as_deref(), marker.visible)
        .await
}

/// 等待标记出现，超时返回 false
pub async fn wait_for_marker(
    driver: &dyn WizardDriver,
    marker: &Marker,
    timeout: Duration,
    poll: Duration,
) -> DriverResult<bool> {
    let found = wait_until(timeout, poll, || async move {
        let present = marker_present(driver, marker).await?;
        Ok::<_, DriverError>(present.then_some(()))
    })
    .await?;
    Ok(found.is_some())
}
