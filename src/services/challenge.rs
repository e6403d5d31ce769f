//! 验证码处理 - 业务能力层
//!
//! 检测到验证码后：消耗一次该类型的预算 → 关闭提示 → 做几次无害点击 → 重试当前页。
//! 预算耗尽即放弃，不会无限重试。

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::RecordError;
use crate::infrastructure::WizardDriver;
use crate::models::{ChallengeBudgets, ChallengeSpec, PageOutcome};
use crate::services::page_step::PageStep;

/// 验证码处理器
#[derive(Debug, Clone, Copy)]
pub struct ChallengeHandler {
    /// 模拟人工操作的随机停顿区间（毫秒）
    pause_ms: (u64, u64),
}

impl ChallengeHandler {
    pub fn new(pause_ms: (u64, u64)) -> Self {
        let (low, high) = pause_ms;
        Self {
            pause_ms: (low.min(high), low.max(high)),
        }
    }

    /// 处理当前页上的验证码，返回第一个不是验证码的页面结果
    ///
    /// # 参数
    /// - `tag`: 日志前缀
    /// - `kind`: 刚检测到的验证码类型
    /// - `budgets`: 本条记录的预算，跨页面共享
    /// - `reattempt`: 重新尝试当前页，超时重试由调用方负责
    pub async fn resolve<F, Fut>(
        &self,
        step: &PageStep<'_>,
        driver: &dyn WizardDriver,
        tag: &str,
        mut kind: String,
        budgets: &mut ChallengeBudgets,
        mut reattempt: F,
    ) -> Result<PageOutcome, RecordError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<PageOutcome, RecordError>>,
    {
        loop {
            let budget = budgets.for_kind(&kind);
            if !budget.try_consume() {
                warn!(
                    "{} 🛑 验证码 {} 已出现 {} 次，预算耗尽",
                    tag,
                    kind,
                    budget.used() + 1
                );
                return Err(RecordError::ChallengeExhausted {
                    kind,
                    attempts: budget.used() + 1,
                });
            }
            info!(
                "{} 🤖 页面 {} 检测到验证码 {}，重试 {}/{}",
                tag,
                step.name(),
                kind,
                budget.used(),
                budget.limit()
            );

            self.act_human(driver, step.spec().challenge.as_ref()).await;

            match reattempt().await? {
                PageOutcome::ChallengeDetected(next) => kind = next,
                outcome => return Ok(outcome),
            }
        }
    }

    /// 关闭提示并做几次无害点击
    ///
    /// 这些点击失败不影响流程，只记录调试日志。
    async fn act_human(&self, driver: &dyn WizardDriver, spec: Option<&ChallengeSpec>) {
        if let Some(close) = spec.and_then(|s| s.dismiss.as_deref()) {
            match driver.probe(close, None, true).await {
                Ok(true) => {
                    if let Err(e) = driver.click(close).await {
                        debug!("关闭验证码提示失败: {}", e);
                    }
                }
                Ok(false) => {}
                Err(e) => debug!("检测验证码提示失败: {}", e),
            }
        }

        let targets = spec.map(|s| s.human_clicks.as_slice()).unwrap_or_default();
        for target in targets {
            if let Err(e) = driver.click(target).await {
                debug!("无害点击 {} 失败: {}", target, e);
            }
            sleep(self.human_pause()).await;
        }
        if targets.is_empty() {
            sleep(self.human_pause()).await;
        }
    }

    fn human_pause(&self) -> Duration {
        let (low, high) = self.pause_ms;
        let ms = rand::thread_rng().gen_range(low..=high);
        Duration::from_millis(ms)
    }
}

impl Default for ChallengeHandler {
    fn default() -> Self {
        Self::new((400, 1_200))
    }
}
