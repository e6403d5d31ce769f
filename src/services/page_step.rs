//! 页面步骤 - 业务能力层
//!
//! 一个参数化的步骤执行器，按页面表完成一页：
//! 等待就绪标记 → 执行动作 → 触发翻页 → 在一组标记之间竞速，分类出 `PageOutcome`。
//! 不写表格，不决定记录的最终结论。

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::error::{DriverError, DriverResult};
use crate::infrastructure::{marker_present, wait_for_marker, wait_until, Waits, WizardDriver};
use crate::models::{
    date_candidates, Action, BlockReason, Extracted, Extraction, InputRecord, Marker, ModalKind,
    PageOutcome, PageSpec, WizardTable,
};

/// 勾选失败后等待回发的时间
const CHECK_RETRY_PAUSE: Duration = Duration::from_millis(1_500);

/// 校验提示没有文本时的观察内容
const MSG_FORM_ERROR: &str = "Error en formulario";

/// 文档标记的序号
static STAMPS: AtomicU64 = AtomicU64::new(0);

/// 一个页面步骤
pub struct PageStep<'a> {
    index: usize,
    table: &'a WizardTable,
    page: &'a PageSpec,
    waits: Waits,
}

impl<'a> PageStep<'a> {
    /// # Panics
    /// `index` 必须在页面表范围内
    pub fn new(table: &'a WizardTable, index: usize, waits: Waits) -> Self {
        Self {
            index,
            table,
            page: &table.pages[index],
            waits,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.page.name
    }

    pub fn spec(&self) -> &PageSpec {
        self.page
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.table.pages.len()
    }

    /// 完整地尝试一次本页
    ///
    /// 带日期字段的页面会依次尝试每种日期解释，第一种被接受的即生效；
    /// 全部被拒绝时返回 `Blocked(NoDateAccepted)`。
    pub async fn attempt(
        &self,
        driver: &dyn WizardDriver,
        record: &InputRecord,
    ) -> DriverResult<PageOutcome> {
        let ready = wait_for_marker(
            driver,
            &self.page.ready,
            self.waits.marker_timeout,
            self.waits.poll,
        )
        .await?;
        if !ready {
            return Ok(PageOutcome::TimedOut(format!(
                "Tiempo de espera agotado cargando la página {}",
                self.page.name
            )));
        }

        for action in &self.page.actions {
            if let Some(reason) = self.perform(driver, action, record).await? {
                return Ok(PageOutcome::Blocked(reason));
            }
        }

        let candidates: Vec<Option<String>> = match self.page.date_selector() {
            Some(_) => {
                let dates = record
                    .issue_date
                    .as_deref()
                    .map(date_candidates)
                    .unwrap_or_default();
                if dates.is_empty() {
                    return Ok(PageOutcome::Blocked(BlockReason::NoDateAccepted));
                }
                dates.into_iter().map(Some).collect()
            }
            None => vec![None],
        };

        let total = candidates.len();
        for (i, candidate) in candidates.into_iter().enumerate() {
            let date_field = self.page.date_selector().zip(candidate.as_deref());
            if let Some((selector, date)) = date_field {
                debug!("页面 {} 输入日期 {} ({}/{})", self.page.name, date, i + 1, total);
                driver.type_keys(selector, date).await?;
            }

            if self.page.settle_ms > 0 {
                sleep(Duration::from_millis(self.page.settle_ms)).await;
            }
            let token = self.next_token();
            driver.stamp_document(&token).await?;
            driver.click(&self.page.trigger).await?;

            let outcome = self.classify(driver, &token).await?;
            let date_rejected = candidate.is_some()
                && matches!(
                    outcome,
                    PageOutcome::ModalDetected {
                        kind: ModalKind::Validation,
                        ..
                    }
                );
            if !date_rejected {
                return Ok(outcome);
            }

            debug!("页面 {} 拒绝了日期解释 {}/{}", self.page.name, i + 1, total);
            dismiss_modal(driver, self.table, self.waits).await?;
        }

        Ok(PageOutcome::Blocked(BlockReason::NoDateAccepted))
    }

    /// 执行一个动作，无法完成时返回阻断原因
    async fn perform(
        &self,
        driver: &dyn WizardDriver,
        action: &Action,
        record: &InputRecord,
    ) -> DriverResult<Option<BlockReason>> {
        match action {
            Action::Fill { selector, value } => match value.resolve(record) {
                Some(v) => driver.fill(selector, &v).await?,
                None => return Ok(Some(missing_field(selector))),
            },
            Action::Select { selector, value } => match value.resolve(record) {
                Some(v) => driver.select_option(selector, &v).await?,
                None => return Ok(Some(missing_field(selector))),
            },
            Action::Click { selector } => driver.click(selector).await?,
            Action::Check { selector, attempts } => {
                let mut checked = false;
                for attempt in 1..=*attempts {
                    if driver.set_checked(selector).await? {
                        checked = true;
                        break;
                    }
                    debug!("勾选 {} 失败 (尝试 {}/{})", selector, attempt, attempts);
                    sleep(CHECK_RETRY_PAUSE).await;
                }
                if !checked {
                    return Ok(Some(BlockReason::Action(format!(
                        "No se pudo marcar {}",
                        selector
                    ))));
                }
            }
            Action::DismissIfPresent {
                panel,
                close,
                wait_ms,
            } => {
                let marker = Marker::new(panel.clone());
                let shown = wait_for_marker(
                    driver,
                    &marker,
                    Duration::from_millis(*wait_ms),
                    self.waits.poll,
                )
                .await?;
                if shown {
                    debug!("关闭提示弹窗 {}", panel);
                    driver.click(close).await?;
                }
            }
            Action::Pause { ms } => sleep(Duration::from_millis(*ms)).await,
            // 日期在触发前单独输入
            Action::TypeDate { .. } => {}
        }
        Ok(None)
    }

    fn next_token(&self) -> String {
        let n = STAMPS.fetch_add(1, Ordering::Relaxed);
        format!("{}#{}", self.page.name, n)
    }

    /// 在预期标记之间竞速，直到命中一个或超时
    ///
    /// 触发前的文档还在时不分类，上一次提交留下的标记不算数。
    /// 文档在 `transition` 内没有被替换，按原地更新处理。
    async fn classify(&self, driver: &dyn WizardDriver, token: &str) -> DriverResult<PageOutcome> {
        let started = Instant::now();
        let transition = self.waits.transition;
        let hit = wait_until(self.waits.marker_timeout, self.waits.poll, || async move {
            if started.elapsed() < transition && driver.document_stamped(token).await? {
                return Ok(None);
            }
            self.probe_outcome(driver).await
        })
        .await?;

        Ok(hit.unwrap_or_else(|| {
            PageOutcome::TimedOut(format!(
                "Tiempo de espera agotado en la página {}",
                self.page.name
            ))
        }))
    }

    /// 单次探测，按优先级检查各个标记
    async fn probe_outcome(
        &self,
        driver: &dyn WizardDriver,
    ) -> DriverResult<Option<PageOutcome>> {
        let page = self.page;

        if marker_present(driver, &page.success).await? {
            let extracted = self.extract(driver).await?;
            return Ok(Some(PageOutcome::Advanced {
                marker: page.success.selector.clone(),
                extracted,
            }));
        }

        if let Some(marker) = &page.not_found {
            if marker_present(driver, marker).await? {
                return Ok(Some(PageOutcome::Blocked(BlockReason::NotFound)));
            }
        }

        if let Some(challenge) = &page.challenge {
            if marker_present(driver, &challenge.marker).await? {
                return Ok(Some(PageOutcome::ChallengeDetected(challenge.kind.clone())));
            }
        }

        if page.watch_modal {
            if let Some(modal) = &self.table.modal {
                if driver.probe(&modal.panel, None, true).await? {
                    let text = driver.read_text(&modal.message).await?.unwrap_or_default();
                    let kind = if modal.is_duplicate(&text) {
                        ModalKind::Duplicate
                    } else {
                        ModalKind::Validation
                    };
                    return Ok(Some(PageOutcome::ModalDetected { kind, text }));
                }
            }
        }

        for marker in &page.validation {
            if marker_present(driver, marker).await? {
                let text = driver
                    .read_text(&marker.selector)
                    .await?
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| MSG_FORM_ERROR.to_string());
                return Ok(Some(PageOutcome::ModalDetected {
                    kind: ModalKind::Validation,
                    text,
                }));
            }
        }

        Ok(None)
    }

    /// 成功时提取链接或编号
    async fn extract(&self, driver: &dyn WizardDriver) -> DriverResult<Option<Extracted>> {
        let Some(extraction) = &self.page.extract else {
            return Ok(None);
        };

        match extraction {
            Extraction::Href { selector } => Ok(driver
                .read_attribute(selector, "href")
                .await?
                .filter(|href| !href.trim().is_empty())
                .map(Extracted::Link)),
            Extraction::Code { selector, pattern } => {
                let text = driver.read_text(selector).await?.unwrap_or_default();
                Ok(pattern.find(&text).map(Extracted::Code))
            }
        }
    }
}

fn missing_field(selector: &str) -> BlockReason {
    BlockReason::Action(format!("Falta el dato requerido para {}", selector))
}

/// 如果信息弹窗可见就关闭它，并等待它消失
pub async fn dismiss_modal(
    driver: &dyn WizardDriver,
    table: &WizardTable,
    waits: Waits,
) -> DriverResult<()> {
    let Some(modal) = &table.modal else {
        return Ok(());
    };
    if !driver.probe(&modal.panel, None, true).await? {
        return Ok(());
    }

    driver.click(&modal.close).await?;
    let closed = wait_until(waits.marker_timeout, waits.poll, || async move {
        let visible = driver.probe(&modal.panel, None, true).await?;
        Ok::<_, DriverError>((!visible).then_some(()))
    })
    .await?;
    if closed.is_none() {
        warn!("⚠️ 弹窗 {} 点击关闭后仍然可见", modal.panel);
    }
    Ok(())
}
