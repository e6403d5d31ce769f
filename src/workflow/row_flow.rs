//! 记录处理流程 - 流程层
//!
//! 核心职责：定义"一条记录"的完整处理流程
//!
//! 状态机：
//! 1. 校验输入（不合法时不碰浏览器）
//! 2. 重置会话：打开入口页，等待入口标记
//! 3. 按页面表逐页推进，步骤只前进不回头
//! 4. 落到唯一的终态 `RowResult`

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{AppError, DriverError, RecordError};
use crate::infrastructure::{wait_for_marker, Waits, WizardDriver};
use crate::models::presets::{MSG_NO_DATE_ACCEPTED, MSG_RECORD_TIMEOUT};
use crate::models::{
    BlockReason, ChallengeBudgets, Extracted, InputRecord, ModalKind, PageOutcome, RowResult,
    WizardTable,
};
use crate::services::{dismiss_modal, BackNavigator, ChallengeHandler, PageStep};
use crate::utils::logging::truncate_text;
use crate::workflow::row_ctx::RowCtx;

/// 入口页打不开时的观察文本
pub const MSG_ENTRY_UNAVAILABLE: &str = "No se pudo cargar la página inicial";
/// 重复申请但提示里没有编号时的观察文本
pub const MSG_DUPLICATE_WITHOUT_CODE: &str = "Solicitud duplicada sin código";
/// 最后一页成功但没有取到值时的观察文本
pub const MSG_SUCCESS_WITHOUT_VALUE: &str = "Proceso terminado sin enlace ni código";

/// 会话重置的尝试次数
const RESET_ATTEMPTS: u32 = 2;

/// 流程参数
#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub waits: Waits,
    /// 每种验证码的重试次数
    pub challenge_budget: u32,
    /// 单页超时后的重试次数
    pub timeout_retries: u32,
    /// 弹窗后最多后退的次数
    pub back_cap: u32,
    /// 每次后退后等待入口标记的时间
    pub back_confirm: Duration,
    /// 验证码处理时的随机停顿区间（毫秒）
    pub human_pause_ms: (u64, u64),
    /// 单条记录的总时限，`None` 时使用流程表里的值
    pub record_budget: Option<Duration>,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            waits: Waits::default(),
            challenge_budget: 2,
            timeout_retries: 2,
            back_cap: 8,
            back_confirm: Duration::from_secs(5),
            human_pause_ms: (400, 1_200),
            record_budget: None,
        }
    }
}

/// 记录状态
#[derive(Debug)]
enum RowState {
    Start,
    Step(usize),
    Terminal(RowResult),
}

/// 记录处理流程
///
/// - 编排一条记录从入口页到终态的全过程
/// - 不持有页面，不写表格
/// - 只依赖业务能力（services）
pub struct RowFlow {
    table: Arc<WizardTable>,
    settings: FlowSettings,
    challenge: ChallengeHandler,
    back: BackNavigator,
}

impl RowFlow {
    pub fn new(table: Arc<WizardTable>, settings: FlowSettings) -> Self {
        let challenge = ChallengeHandler::new(settings.human_pause_ms);
        let back = BackNavigator::new(
            settings.back_cap,
            settings.back_confirm,
            settings.waits.poll,
        );
        Self {
            table,
            settings,
            challenge,
            back,
        }
    }

    pub fn table(&self) -> &WizardTable {
        &self.table
    }

    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    /// 单条记录的总时限
    pub fn record_budget(&self) -> Option<Duration> {
        self.settings
            .record_budget
            .or_else(|| self.table.record_budget_secs.map(Duration::from_secs))
    }

    /// 处理一条记录
    ///
    /// 记录内的任何失败都落成 `RowResult`；只有会话无法重置时才返回错误。
    pub async fn process(
        &self,
        driver: &dyn WizardDriver,
        record: &InputRecord,
        ctx: &RowCtx,
    ) -> Result<RowResult, AppError> {
        if let Err(msg) = self.table.identity.validate(record) {
            warn!("{} ⚠️ 输入不合法: {}", ctx, msg);
            return Ok(RecordError::Validation(msg).into());
        }

        let Some(limit) = self.record_budget() else {
            return self.drive(driver, record, ctx).await;
        };
        match timeout(limit, self.drive(driver, record, ctx)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("{} ⏰ 超过单条记录时限 {:?}", ctx, limit);
                Ok(RowResult::Error(MSG_RECORD_TIMEOUT.to_string()))
            }
        }
    }

    /// 运行状态机
    async fn drive(
        &self,
        driver: &dyn WizardDriver,
        record: &InputRecord,
        ctx: &RowCtx,
    ) -> Result<RowResult, AppError> {
        let mut budgets = ChallengeBudgets::new(self.settings.challenge_budget);
        let mut state = RowState::Start;

        loop {
            state = match state {
                RowState::Start => self.reset_session(driver, ctx).await?,
                RowState::Step(index) => {
                    match self.advance(index, driver, record, ctx, &mut budgets).await {
                        Ok(next) => next,
                        Err(err) => {
                            warn!("{} ❌ {}", ctx, err);
                            RowState::Terminal(err.into())
                        }
                    }
                }
                RowState::Terminal(result) => return Ok(result),
            };
        }
    }

    /// 打开入口页，连续失败时视为会话不可恢复
    async fn reset_session(
        &self,
        driver: &dyn WizardDriver,
        ctx: &RowCtx,
    ) -> Result<RowState, AppError> {
        let mut last_error: Option<DriverError> = None;
        for attempt in 1..=RESET_ATTEMPTS {
            match driver.goto(&self.table.entry_url).await {
                Ok(()) => {
                    last_error = None;
                    break;
                }
                Err(e) => {
                    warn!(
                        "{} 打开入口页失败 (尝试 {}/{}): {}",
                        ctx, attempt, RESET_ATTEMPTS, e
                    );
                    last_error = Some(e);
                }
            }
        }
        if let Some(source) = last_error {
            return Err(AppError::Session {
                session: ctx.session,
                source,
            });
        }

        let waits = self.settings.waits;
        let entry = &self.table.entry_marker;
        let ready = wait_for_marker(driver, entry, waits.marker_timeout, waits.poll)
            .await
            .map_err(|source| AppError::Session {
                session: ctx.session,
                source,
            })?;
        if !ready {
            warn!("{} ⚠️ 入口页未出现 {}", ctx, self.table.entry_marker);
            return Ok(RowState::Terminal(RowResult::Error(
                MSG_ENTRY_UNAVAILABLE.to_string(),
            )));
        }
        debug!("{} 会话已重置", ctx);
        Ok(RowState::Step(0))
    }

    /// 推进一页，返回下一个状态
    async fn advance(
        &self,
        index: usize,
        driver: &dyn WizardDriver,
        record: &InputRecord,
        ctx: &RowCtx,
        budgets: &mut ChallengeBudgets,
    ) -> Result<RowState, RecordError> {
        let step = PageStep::new(&self.table, index, self.settings.waits);
        info!(
            "{} 📄 第 {}/{} 页: {}",
            ctx,
            index + 1,
            self.table.pages.len(),
            step.name()
        );

        let mut outcome = self.attempt_with_retries(&step, driver, record, ctx).await?;
        if let PageOutcome::ChallengeDetected(kind) = outcome {
            let tag = ctx.to_string();
            let step = &step;
            let reattempt = || self.attempt_with_retries(step, driver, record, ctx);
            outcome = self
                .challenge
                .resolve(step, driver, &tag, kind, budgets, reattempt)
                .await?;
        }

        match outcome {
            PageOutcome::Advanced { extracted, .. } if step.is_last() => {
                self.finish(&step, record, extracted).map(RowState::Terminal)
            }
            PageOutcome::Advanced { .. } => Ok(RowState::Step(index + 1)),
            PageOutcome::Blocked(BlockReason::NotFound) => {
                info!("{} 🔎 没有记录", ctx);
                Ok(RowState::Terminal(RowResult::NotFound))
            }
            PageOutcome::Blocked(BlockReason::NoDateAccepted) => {
                Err(RecordError::Validation(MSG_NO_DATE_ACCEPTED.to_string()))
            }
            PageOutcome::Blocked(BlockReason::Action(msg)) => Err(RecordError::Unexpected(msg)),
            PageOutcome::ChallengeDetected(kind) => Err(RecordError::ChallengeExhausted {
                attempts: budgets.for_kind(&kind).used(),
                kind,
            }),
            PageOutcome::ModalDetected {
                kind: ModalKind::Duplicate,
                text,
            } => {
                info!("{} 📋 重复申请: {}", ctx, truncate_text(&text, 80));
                let code = self.table.modal.as_ref().and_then(|m| m.extract_code(&text));
                self.recover(driver, ctx).await;
                match code {
                    Some(code) => {
                        let result = RowResult::Success(Extracted::Code(code));
                        Ok(RowState::Terminal(result))
                    }
                    None => Err(RecordError::Unexpected(MSG_DUPLICATE_WITHOUT_CODE.to_string())),
                }
            }
            PageOutcome::ModalDetected {
                kind: ModalKind::Validation,
                text,
            } => {
                self.recover(driver, ctx).await;
                Err(RecordError::ModalRejection(text))
            }
            PageOutcome::TimedOut(what) => Err(RecordError::Timeout(what)),
        }
    }

    /// 超时的页面按重试次数重新尝试
    async fn attempt_with_retries(
        &self,
        step: &PageStep<'_>,
        driver: &dyn WizardDriver,
        record: &InputRecord,
        ctx: &RowCtx,
    ) -> Result<PageOutcome, RecordError> {
        let mut retries = 0;
        loop {
            let outcome = step.attempt(driver, record).await?;
            match outcome {
                PageOutcome::TimedOut(what) if retries < self.settings.timeout_retries => {
                    retries += 1;
                    warn!(
                        "{} ⏳ {}，重试 {}/{}",
                        ctx, what, retries, self.settings.timeout_retries
                    );
                }
                other => return Ok(other),
            }
        }
    }

    /// 最后一页成功后的结论
    fn finish(
        &self,
        step: &PageStep<'_>,
        record: &InputRecord,
        extracted: Option<Extracted>,
    ) -> Result<RowResult, RecordError> {
        match (extracted, &step.spec().extract) {
            (Some(value), _) => Ok(RowResult::Success(value)),
            (None, None) => Ok(RowResult::Success(Extracted::Code(record.id_code.clone()))),
            (None, Some(_)) => Err(RecordError::Unexpected(MSG_SUCCESS_WITHOUT_VALUE.to_string())),
        }
    }

    /// 关闭弹窗并后退回入口页
    ///
    /// 这里的失败只记录异常，下一条记录会重置会话。
    async fn recover(&self, driver: &dyn WizardDriver, ctx: &RowCtx) {
        if let Err(e) = dismiss_modal(driver, &self.table, self.settings.waits).await {
            warn!("{} ⚠️ 关闭弹窗失败: {}", ctx, e);
        }
        let tag = ctx.to_string();
        if let Err(e) = self
            .back
            .return_to_entry(driver, &self.table.entry_marker, &tag)
            .await
        {
            warn!("{} ⚠️ 后退失败: {}", ctx, e);
        }
    }
}
