//! JS 执行器 - 基础设施层
//!
//! 借用当前运行的浏览器上下文，只暴露"执行 JS 并解码"的能力

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::browser::BrowserCapability;
use crate::error::BrowserError;

/// JS 执行器
///
/// 职责：
/// - 借用运行协调器持有的浏览器上下文
/// - 暴露 eval() / eval_as() 能力
/// - 浏览器返回的值在这里被解码成强类型，不把裸 JSON 往上传
#[derive(Clone, Copy)]
pub struct JsExecutor<'a> {
    browser: &'a dyn BrowserCapability,
}

impl<'a> JsExecutor<'a> {
    /// 创建新的 JS 执行器
    pub fn new(browser: &'a dyn BrowserCapability) -> Self {
        Self { browser }
    }

    /// 获取浏览器能力的引用（用于其他操作）
    pub fn browser(&self) -> &'a dyn BrowserCapability {
        self.browser
    }

    /// 以参数调用页面内的 JS 函数并返回 JSON 结果
    pub async fn eval(
        &self,
        function: &str,
        args: Vec<JsonValue>,
    ) -> Result<JsonValue, BrowserError> {
        self.browser.evaluate(function, args).await
    }

    /// 调用 JS 函数并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(
        &self,
        function: &str,
        args: Vec<JsonValue>,
    ) -> Result<T, BrowserError> {
        let json_value = self.eval(function, args).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }
}
