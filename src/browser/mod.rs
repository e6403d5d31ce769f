//! 浏览器资源
//!
//! 连接或启动浏览器，并为每个会话创建独立的浏览器上下文：
//! 向导的服务端状态绑定在 cookie 上，两个会话共用上下文会互相污染。

pub mod connection;
pub mod headless;

use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, Page};
use tracing::{debug, info};

use crate::error::{AppError, AppResult, DriverError};

pub use connection::connect_to_browser;
pub use headless::launch_browser;

/// 在独立的浏览器上下文中打开一个空白页
pub async fn open_isolated_page(browser: &Browser, session: usize) -> AppResult<Page> {
    let session_error = |e: CdpError| AppError::Session {
        session,
        source: DriverError::Cdp(e),
    };

    let context = browser
        .execute(CreateBrowserContextParams::default())
        .await
        .map_err(session_error)?;
    debug!("[会话 {}] 浏览器上下文已创建", session);

    let mut params = CreateTargetParams::new("about:blank");
    params.browser_context_id = Some(context.result.browser_context_id.clone());

    let page = browser.new_page(params).await.map_err(session_error)?;
    info!("[会话 {}] ✓ 页面已就绪", session);
    Ok(page)
}
