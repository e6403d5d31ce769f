//! 有界后退 - 业务能力层
//!
//! 弹窗之后用浏览器历史回到入口页。后退次数有上限，
//! 超过上限只记一条异常日志，由下一条记录的会话重置兜底。

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::DriverResult;
use crate::infrastructure::{marker_present, wait_for_marker, WizardDriver};
use crate::models::Marker;

/// 后退结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackTrack {
    /// 已回到入口页，共后退 `steps` 次
    Confirmed { steps: u32 },
    /// 达到上限仍未确认入口页
    CapExhausted { steps: u32 },
}

impl BackTrack {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, BackTrack::Confirmed { .. })
    }
}

/// 有界后退导航器
#[derive(Debug, Clone, Copy)]
pub struct BackNavigator {
    cap: u32,
    confirm_timeout: Duration,
    poll: Duration,
}

impl BackNavigator {
    /// # 参数
    /// - `cap`: 最多后退的次数
    /// - `confirm_timeout`: 每次后退后等待入口标记的时间
    pub fn new(cap: u32, confirm_timeout: Duration, poll: Duration) -> Self {
        Self {
            cap,
            confirm_timeout,
            poll,
        }
    }

    pub fn cap(&self) -> u32 {
        self.cap
    }

    /// 后退直到看到入口标记或达到上限
    ///
    /// 已经在入口页时不后退。
    pub async fn return_to_entry(
        &self,
        driver: &dyn WizardDriver,
        entry: &Marker,
        tag: &str,
    ) -> DriverResult<BackTrack> {
        if marker_present(driver, entry).await? {
            debug!("{} 已在入口页，无需后退", tag);
            return Ok(BackTrack::Confirmed { steps: 0 });
        }

        for step in 1..=self.cap {
            driver.go_back().await?;
            if wait_for_marker(driver, entry, self.confirm_timeout, self.poll).await? {
                info!("{} ↩️ 后退 {} 次后回到入口页", tag, step);
                return Ok(BackTrack::Confirmed { steps: step });
            }
            debug!("{} 后退第 {} 次，尚未看到 {}", tag, step, entry);
        }

        warn!(
            "{} ⚠️ 后退 {} 次后仍未回到入口页，交由下一条记录重置会话",
            tag, self.cap
        );
        Ok(BackTrack::CapExhausted { steps: self.cap })
    }
}
