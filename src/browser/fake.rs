//! 测试用的内存浏览器：按脚本应答，并记录每一次调用

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{BrowserCapability, BrowserFactory, WaitCondition, WaitOptions};
use crate::error::BrowserError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Navigate(String),
    WaitFor(String),
    WaitNavigation,
    Type(String, String),
    Click(String),
    Evaluate(String),
    Screenshot,
    Close,
}

#[derive(Debug, Default)]
pub(crate) struct FakeState {
    pub url: String,
    pub title: String,
    pub content: String,
    /// wait_for_element 能立即找到的选择器
    pub present: HashSet<String>,
}

impl FakeState {
    pub fn show(&mut self, selector: &str) {
        self.present.insert(selector.to_string());
    }

    pub fn hide(&mut self, selector: &str) {
        self.present.remove(selector);
    }
}

type ScriptHandler =
    Box<dyn Fn(&str, &[JsonValue], &mut FakeState) -> Result<JsonValue, BrowserError> + Send + Sync>;
type PageHook = Box<dyn Fn(&str, &mut FakeState) + Send + Sync>;

struct Inner {
    state: Mutex<FakeState>,
    calls: Mutex<Vec<Call>>,
    on_script: ScriptHandler,
    on_click: PageHook,
    on_navigate: PageHook,
}

#[derive(Clone)]
pub(crate) struct FakeBrowser {
    inner: Arc<Inner>,
}

pub(crate) struct FakeBrowserBuilder {
    state: FakeState,
    on_script: ScriptHandler,
    on_click: PageHook,
    on_navigate: PageHook,
}

impl FakeBrowserBuilder {
    pub fn url(mut self, url: &str) -> Self {
        self.state.url = url.to_string();
        self
    }

    pub fn present(mut self, selectors: &[&str]) -> Self {
        for s in selectors {
            self.state.show(s);
        }
        self
    }

    pub fn on_script(
        mut self,
        f: impl Fn(&str, &[JsonValue], &mut FakeState) -> Result<JsonValue, BrowserError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.on_script = Box::new(f);
        self
    }

    pub fn on_click(mut self, f: impl Fn(&str, &mut FakeState) + Send + Sync + 'static) -> Self {
        self.on_click = Box::new(f);
        self
    }

    /// 导航默认把 url 设为目标地址，钩子在之后执行
    pub fn on_navigate(mut self, f: impl Fn(&str, &mut FakeState) + Send + Sync + 'static) -> Self {
        self.on_navigate = Box::new(f);
        self
    }

    pub fn build(self) -> FakeBrowser {
        FakeBrowser {
            inner: Arc::new(Inner {
                state: Mutex::new(self.state),
                calls: Mutex::new(Vec::new()),
                on_script: self.on_script,
                on_click: self.on_click,
                on_navigate: self.on_navigate,
            }),
        }
    }
}

impl FakeBrowser {
    pub fn builder() -> FakeBrowserBuilder {
        FakeBrowserBuilder {
            state: FakeState::default(),
            on_script: Box::new(|_, _, _| Ok(JsonValue::Null)),
            on_click: Box::new(|_, _| {}),
            on_navigate: Box::new(|_, _| {}),
        }
    }

    fn record(&self, call: Call) {
        self.inner.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Click(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn typed(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Type(s, t) => Some((s, t)),
                _ => None,
            })
            .collect()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Navigate(u) => Some(u),
                _ => None,
            })
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.calls().iter().filter(|c| **c == Call::Close).count()
    }

    /// 某段脚本被执行的次数
    pub fn evaluations_of(&self, function: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Evaluate(f) if f == function))
            .count()
    }
}

#[async_trait]
impl BrowserCapability for FakeBrowser {
    async fn navigate(
        &self,
        url: &str,
        _wait: WaitCondition,
        _timeout: Duration,
    ) -> Result<(), BrowserError> {
        self.record(Call::Navigate(url.to_string()));
        let mut state = self.inner.state.lock().unwrap();
        state.url = url.to_string();
        (self.inner.on_navigate)(url, &mut state);
        Ok(())
    }

    async fn wait_for_element(
        &self,
        selector: &str,
        options: WaitOptions,
    ) -> Result<(), BrowserError> {
        self.record(Call::WaitFor(selector.to_string()));
        if self.inner.state.lock().unwrap().present.contains(selector) {
            Ok(())
        } else {
            Err(BrowserError::Timeout {
                what: selector.to_string(),
                after: options.timeout,
            })
        }
    }

    async fn wait_for_navigation(&self, _timeout: Duration) -> Result<(), BrowserError> {
        self.record(Call::WaitNavigation);
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
        self.record(Call::Type(selector.to_string(), text.to_string()));
        if self.inner.state.lock().unwrap().present.contains(selector) {
            Ok(())
        } else {
            Err(BrowserError::ElementNotFound(selector.to_string()))
        }
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        self.record(Call::Click(selector.to_string()));
        let mut state = self.inner.state.lock().unwrap();
        (self.inner.on_click)(selector, &mut state);
        Ok(())
    }

    async fn evaluate(
        &self,
        function: &str,
        args: Vec<JsonValue>,
    ) -> Result<JsonValue, BrowserError> {
        self.record(Call::Evaluate(function.to_string()));
        let mut state = self.inner.state.lock().unwrap();
        (self.inner.on_script)(function, &args, &mut state)
    }

    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError> {
        self.record(Call::Screenshot);
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.inner.state.lock().unwrap().url.clone())
    }

    async fn title(&self) -> Result<String, BrowserError> {
        Ok(self.inner.state.lock().unwrap().title.clone())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        Ok(self.inner.state.lock().unwrap().content.clone())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.record(Call::Close);
        Ok(())
    }
}

/// 每次 open 都返回同一个 FakeBrowser 的克隆
pub(crate) struct FakeFactory {
    pub browser: FakeBrowser,
}

#[async_trait]
impl BrowserFactory for FakeFactory {
    async fn open(&self) -> Result<Box<dyn BrowserCapability>, BrowserError> {
        Ok(Box::new(self.browser.clone()))
    }
}
