//! 浏览器能力层
//!
//! 引擎只通过 `BrowserCapability` 接触网络和 DOM，测试时可替换

pub mod chromium;
pub mod connection;
pub mod headless;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::time::Duration;

use crate::error::BrowserError;

pub use chromium::{ChromiumBrowser, ChromiumFactory};
pub use connection::connect_to_browser;
pub use headless::launch_headless_browser;

/// 导航完成条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitCondition {
    Load,
    DomContentLoaded,
    NetworkIdle,
}

/// 元素等待参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub visible: bool,
    pub timeout: Duration,
}

impl WaitOptions {
    pub fn visible(timeout: Duration) -> Self {
        Self {
            visible: true,
            timeout,
        }
    }

    pub fn attached(timeout: Duration) -> Self {
        Self {
            visible: false,
            timeout,
        }
    }
}

/// 单个浏览器上下文的能力
///
/// 所有方法都必须有上界：实现方不得无限等待
#[async_trait]
pub trait BrowserCapability: Send + Sync {
    async fn navigate(
        &self,
        url: &str,
        wait: WaitCondition,
        timeout: Duration,
    ) -> Result<(), BrowserError>;

    async fn wait_for_element(&self, selector: &str, options: WaitOptions)
        -> Result<(), BrowserError>;

    /// 等待一次导航结束（提交表单后）
    async fn wait_for_navigation(&self, timeout: Duration) -> Result<(), BrowserError>;

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), BrowserError>;

    async fn click(&self, selector: &str) -> Result<(), BrowserError>;

    /// 在页面中以 `args` 调用 JS 函数 `function`，返回 JSON 结果（Promise 会被等待）
    async fn evaluate(&self, function: &str, args: Vec<JsonValue>)
        -> Result<JsonValue, BrowserError>;

    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;

    async fn title(&self) -> Result<String, BrowserError>;

    async fn content(&self) -> Result<String, BrowserError>;

    async fn close(&self) -> Result<(), BrowserError>;
}

/// 为每次运行打开一个独立的浏览器上下文
#[async_trait]
pub trait BrowserFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrowserCapability>, BrowserError>;
}
