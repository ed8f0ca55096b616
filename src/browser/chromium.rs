//! 基于 chromiumoxide 的浏览器能力实现

use async_trait::async_trait;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, Page};
use serde_json::Value as JsonValue;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use super::{BrowserCapability, BrowserFactory, WaitCondition, WaitOptions};
use crate::config::Config;
use crate::error::BrowserError;

/// 元素轮询间隔
const POLL_INTERVAL: Duration = Duration::from_millis(250);
/// readyState 完成后的静默期
const NETWORK_IDLE_GRACE: Duration = Duration::from_millis(500);

const ELEMENT_STATE_SCRIPT: &str = r#"(selector, visible) => {
    const el = document.querySelector(selector);
    if (!el) return false;
    if (!visible) return true;
    const rect = el.getBoundingClientRect();
    const style = window.getComputedStyle(el);
    return rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden' && style.display !== 'none';
}"#;

const CLEAR_INPUT_SCRIPT: &str = r#"(selector) => {
    const el = document.querySelector(selector);
    if (el && 'value' in el) el.value = '';
    return true;
}"#;

const READY_STATE_SCRIPT: &str = "() => document.readyState";

/// 一个页面 + 其所属浏览器连接
pub struct ChromiumBrowser {
    page: Page,
    /// 自己启动的浏览器需要在关闭时一并退出；连接模式只关页面
    browser: Mutex<Option<Browser>>,
    owns_process: bool,
    events: JoinHandle<()>,
}

impl ChromiumBrowser {
    pub fn new(browser: Browser, page: Page, owns_process: bool, events: JoinHandle<()>) -> Self {
        Self {
            page,
            browser: Mutex::new(Some(browser)),
            owns_process,
            events,
        }
    }

    async fn bounded<T, F>(&self, what: &str, limit: Duration, fut: F) -> Result<T, BrowserError>
    where
        F: Future<Output = Result<T, chromiumoxide::error::CdpError>>,
    {
        match timeout(limit, fut).await {
            Ok(result) => result.map_err(BrowserError::from),
            Err(_) => Err(BrowserError::Timeout {
                what: what.to_string(),
                after: limit,
            }),
        }
    }

    /// 等待 readyState 为 complete，然后留一小段静默期
    async fn settle(&self, limit: Duration) -> Result<(), BrowserError> {
        let deadline = Instant::now() + limit;
        loop {
            let state = self.evaluate(READY_STATE_SCRIPT, Vec::new()).await?;
            if state.as_str() == Some("complete") {
                sleep(NETWORK_IDLE_GRACE).await;
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout {
                    what: "document.readyState".to_string(),
                    after: limit,
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

/// 把函数源码和参数拼成一个调用表达式
pub(crate) fn call_expression(function: &str, args: &[JsonValue]) -> Result<String, BrowserError> {
    let rendered = args
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!("({})({})", function.trim(), rendered.join(", ")))
}

#[async_trait]
impl BrowserCapability for ChromiumBrowser {
    async fn navigate(
        &self,
        url: &str,
        wait: WaitCondition,
        limit: Duration,
    ) -> Result<(), BrowserError> {
        debug!("导航到: {}", url);
        match timeout(limit, self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(BrowserError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(BrowserError::Timeout {
                    what: url.to_string(),
                    after: limit,
                })
            }
        }
        match wait {
            WaitCondition::Load | WaitCondition::DomContentLoaded => Ok(()),
            WaitCondition::NetworkIdle => self.settle(limit).await,
        }
    }

    async fn wait_for_element(
        &self,
        selector: &str,
        options: WaitOptions,
    ) -> Result<(), BrowserError> {
        let deadline = Instant::now() + options.timeout;
        loop {
            let found = self
                .evaluate(
                    ELEMENT_STATE_SCRIPT,
                    vec![JsonValue::from(selector), JsonValue::from(options.visible)],
                )
                .await?;
            if found.as_bool() == Some(true) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout {
                    what: selector.to_string(),
                    after: options.timeout,
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for_navigation(&self, limit: Duration) -> Result<(), BrowserError> {
        self.bounded("navigation", limit, async {
            self.page.wait_for_navigation().await.map(|_| ())
        })
        .await
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
        self.evaluate(CLEAR_INPUT_SCRIPT, vec![JsonValue::from(selector)])
            .await?;
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::ElementNotFound(selector.to_string()))?;
        element.click().await?;
        element.type_str(text).await?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::ElementNotFound(selector.to_string()))?;
        element.click().await?;
        Ok(())
    }

    async fn evaluate(
        &self,
        function: &str,
        args: Vec<JsonValue>,
    ) -> Result<JsonValue, BrowserError> {
        let expression = call_expression(function, &args)?;
        let result = self.page.evaluate(expression).await?;
        Ok(result.value().cloned().unwrap_or(JsonValue::Null))
    }

    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError> {
        let bytes = self
            .page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await?;
        Ok(bytes)
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn title(&self) -> Result<String, BrowserError> {
        Ok(self.page.get_title().await?.unwrap_or_default())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        Ok(self.page.content().await?)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let mut guard = self.browser.lock().await;
        let Some(mut browser) = guard.take() else {
            return Err(BrowserError::Closed);
        };

        if let Err(e) = self.page.clone().close().await {
            warn!("关闭页面失败: {}", e);
        }
        if self.owns_process {
            if let Err(e) = browser.close().await {
                warn!("关闭浏览器失败: {}", e);
            }
            let _ = browser.wait().await;
        }
        self.events.abort();
        debug!("浏览器上下文已关闭");
        Ok(())
    }
}

/// 按配置连接或启动 Chrome，为每次运行打开一个新页面
pub struct ChromiumFactory {
    config: Config,
}

impl ChromiumFactory {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

#[async_trait]
impl BrowserFactory for ChromiumFactory {
    async fn open(&self) -> Result<Box<dyn BrowserCapability>, BrowserError> {
        let (browser, events, owns_process) = match self.config.browser_debug_port {
            Some(port) => {
                let (browser, events) = super::connect_to_browser(port)
                    .await
                    .map_err(|e| BrowserError::Launch(e.to_string()))?;
                (browser, events, false)
            }
            None => {
                let (browser, events) = super::launch_headless_browser(
                    self.config.chrome_executable.as_deref(),
                    self.config.headless,
                )
                .await
                .map_err(|e| BrowserError::Launch(e.to_string()))?;
                (browser, events, true)
            }
        };

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                events.abort();
                return Err(BrowserError::Launch(format!("创建页面失败: {}", e)));
            }
        };

        Ok(Box::new(ChromiumBrowser::new(browser, page, owns_process, events)))
    }
}
