//! 测试用的脚本化站点
//!
//! `FakeSite` 实现 `WizardDriver`，用一个规则闭包根据事件修改"屏幕"状态。
//! 回发可以延迟生效（`Screen::defer`），延迟期间旧文档保持原样。

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use apostilla_wizard::error::{DriverError, DriverResult};
use apostilla_wizard::models::{InputRecord, RowResult};
use apostilla_wizard::services::RecordSink;
use apostilla_wizard::WizardDriver;

/// 驱动收到的操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Goto(String),
    Fill(String, String),
    Type(String, String),
    Select(String, String),
    Click(String),
    Check(String),
    Back,
}

type Change = Box<dyn FnOnce(&mut Screen) + Send>;

/// 页面状态
#[derive(Default)]
pub struct Screen {
    /// 可见元素
    pub visible: HashSet<String>,
    /// 存在但不可见的元素
    pub attached: HashSet<String>,
    pub texts: HashMap<String, String>,
    pub attrs: HashMap<(String, String), String>,
    pub fields: HashMap<String, String>,
    /// 勾选总是失败的元素
    pub uncheckable: HashSet<String>,
    /// 当前文档上的标记，文档被替换时清空
    pub stamp: Option<String>,
    /// 接下来这么多次读取会报"执行上下文已销毁"
    pub glitches: u32,
    pending: Vec<(Instant, Change)>,
}

impl Screen {
    pub fn show(&mut self, selector: &str) {
        self.visible.insert(selector.to_string());
    }

    pub fn hide(&mut self, selector: &str) {
        self.visible.remove(selector);
    }

    pub fn show_text(&mut self, selector: &str, text: &str) {
        self.show(selector);
        self.texts.insert(selector.to_string(), text.to_string());
    }

    /// 清空页面，只保留给定的可见元素
    pub fn replace(&mut self, selectors: &[&str]) {
        self.reload();
        self.visible.clear();
        self.attached.clear();
        self.texts.clear();
        self.attrs.clear();
        for s in selectors {
            self.show(s);
        }
    }

    /// 服务器返回了新文档，内容不变
    pub fn reload(&mut self) {
        self.stamp = None;
    }

    /// 回发在 `delay` 之后才生效
    pub fn defer(&mut self, delay: Duration, change: impl FnOnce(&mut Screen) + Send + 'static) {
        self.pending.push((Instant::now() + delay, Box::new(change)));
    }

    /// 应用已经到期的回发
    fn settle(&mut self) {
        let now = Instant::now();
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|(at, _)| *at <= now);
        self.pending = waiting;
        for (_, change) in due {
            change(self);
        }
    }

    fn take_glitch(&mut self) -> DriverResult<()> {
        if self.glitches > 0 {
            self.glitches -= 1;
            return Err(DriverError::Other(
                "Execution context was destroyed, most likely because of a navigation".into(),
            ));
        }
        Ok(())
    }
}

type Rule = Box<dyn FnMut(&Event, &mut Screen) + Send>;

struct Inner {
    screen: Screen,
    events: Vec<Event>,
    rule: Rule,
}

/// 脚本化站点
pub struct FakeSite {
    inner: Mutex<Inner>,
}

impl FakeSite {
    pub fn new(rule: impl FnMut(&Event, &mut Screen) + Send + 'static) -> Self {
        Self {
            inner: Mutex::new(Inner {
                screen: Screen::default(),
                events: Vec::new(),
                rule: Box::new(rule),
            }),
        }
    }

    fn emit(&self, event: Event) {
        let mut inner = self.inner.lock().unwrap();
        let Inner {
            screen,
            events,
            rule,
        } = &mut *inner;
        screen.settle();
        rule(&event, screen);
        events.push(event);
    }

    /// 读取前先应用到期的回发
    fn screen<T>(&self, read: impl FnOnce(&mut Screen) -> T) -> T {
        let mut inner = self.inner.lock().unwrap();
        inner.screen.settle();
        read(&mut inner.screen)
    }

    pub fn events(&self) -> Vec<Event> {
        self.inner.lock().unwrap().events.clone()
    }

    pub fn clicks(&self, selector: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Click(s) if s == selector))
            .count()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }

    pub fn field(&self, selector: &str) -> Option<String> {
        self.inner.lock().unwrap().screen.fields.get(selector).cloned()
    }
}

#[async_trait]
impl WizardDriver for FakeSite {
    async fn goto(&self, url: &str) -> DriverResult<()> {
        self.emit(Event::Goto(url.to_string()));
        Ok(())
    }

    async fn probe(&self, selector: &str, text: Option<&str>, visible: bool) -> DriverResult<bool> {
        self.screen(|screen| -> DriverResult<bool> {
            screen.take_glitch()?;
            let present = screen.visible.contains(selector)
                || (!visible && screen.attached.contains(selector));
            let text_ok = match text {
                Some(t) => screen.texts.get(selector).is_some_and(|v| v.contains(t)),
                None => true,
            };
            Ok(present && text_ok)
        })
    }

    async fn read_text(&self, selector: &str) -> DriverResult<Option<String>> {
        Ok(self.screen(|screen| screen.texts.get(selector).cloned()))
    }

    async fn read_attribute(&self, selector: &str, name: &str) -> DriverResult<Option<String>> {
        let key = (selector.to_string(), name.to_string());
        Ok(self.screen(|screen| screen.attrs.get(&key).cloned()))
    }

    async fn fill(&self, selector: &str, value: &str) -> DriverResult<()> {
        self.inner
            .lock()
            .unwrap()
            .screen
            .fields
            .insert(selector.to_string(), value.to_string());
        self.emit(Event::Fill(selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn type_keys(&self, selector: &str, value: &str) -> DriverResult<()> {
        self.inner
            .lock()
            .unwrap()
            .screen
            .fields
            .insert(selector.to_string(), value.to_string());
        self.emit(Event::Type(selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> DriverResult<()> {
        self.emit(Event::Select(selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn click(&self, selector: &str) -> DriverResult<()> {
        self.emit(Event::Click(selector.to_string()));
        Ok(())
    }

    async fn set_checked(&self, selector: &str) -> DriverResult<bool> {
        let blocked = self.inner.lock().unwrap().screen.uncheckable.contains(selector);
        self.emit(Event::Check(selector.to_string()));
        Ok(!blocked)
    }

    async fn go_back(&self) -> DriverResult<()> {
        self.emit(Event::Back);
        Ok(())
    }

    async fn stamp_document(&self, token: &str) -> DriverResult<()> {
        self.screen(|screen| screen.stamp = Some(token.to_string()));
        Ok(())
    }

    async fn document_stamped(&self, token: &str) -> DriverResult<bool> {
        self.screen(|screen| -> DriverResult<bool> {
            screen.take_glitch()?;
            Ok(screen.stamp.as_deref() == Some(token))
        })
    }
}

/// 打不开任何页面的驱动
pub struct DeadSite;

#[async_trait]
impl WizardDriver for DeadSite {
    async fn goto(&self, url: &str) -> DriverResult<()> {
        Err(DriverError::Other(format!("connection refused: {}", url)))
    }

    async fn probe(&self, _: &str, _: Option<&str>, _: bool) -> DriverResult<bool> {
        Ok(false)
    }

    async fn read_text(&self, _: &str) -> DriverResult<Option<String>> {
        Ok(None)
    }

    async fn read_attribute(&self, _: &str, _: &str) -> DriverResult<Option<String>> {
        Ok(None)
    }

    async fn fill(&self, selector: &str, _: &str) -> DriverResult<()> {
        Err(DriverError::ElementNotFound(selector.to_string()))
    }

    async fn type_keys(&self, selector: &str, _: &str) -> DriverResult<()> {
        Err(DriverError::ElementNotFound(selector.to_string()))
    }

    async fn select_option(&self, selector: &str, _: &str) -> DriverResult<()> {
        Err(DriverError::ElementNotFound(selector.to_string()))
    }

    async fn click(&self, selector: &str) -> DriverResult<()> {
        Err(DriverError::ElementNotFound(selector.to_string()))
    }

    async fn set_checked(&self, selector: &str) -> DriverResult<bool> {
        Err(DriverError::ElementNotFound(selector.to_string()))
    }

    async fn go_back(&self) -> DriverResult<()> {
        Ok(())
    }

    async fn stamp_document(&self, _: &str) -> DriverResult<()> {
        Ok(())
    }

    async fn document_stamped(&self, _: &str) -> DriverResult<bool> {
        Ok(false)
    }
}

/// 内存中的结果去处
#[derive(Debug, Default)]
pub struct MemorySink {
    pub done: HashSet<usize>,
    pub persisted: Vec<(usize, RowResult)>,
}

impl RecordSink for MemorySink {
    fn is_complete(&self, row: usize) -> bool {
        self.done.contains(&row)
    }

    fn persist(&mut self, row: usize, result: &RowResult) -> apostilla_wizard::AppResult<()> {
        if result.is_success() {
            self.done.insert(row);
        }
        self.persisted.push((row, result.clone()));
        Ok(())
    }
}

pub fn record(row: usize, code: &str) -> InputRecord {
    InputRecord {
        row,
        number: (row + 1).to_string(),
        id_code: code.to_string(),
        name: None,
        email: "apostillamen@gmail.com".to_string(),
        issue_date: None,
        country: Some("173".to_string()),
    }
}

pub fn person(row: usize, cedula: &str, issue_date: &str) -> InputRecord {
    InputRecord {
        issue_date: Some(issue_date.to_string()),
        name: Some("Ana Pérez".to_string()),
        ..record(row, cedula)
    }
}
