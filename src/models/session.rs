use chrono::{DateTime, Utc};
use reqwest::Url;

use crate::browser::BrowserCapability;
use crate::infrastructure::JsExecutor;

/// 登录成功后的会话
///
/// 借用运行协调器持有的浏览器上下文；上下文关闭时会话随之失效
pub struct Session<'a> {
    browser: &'a dyn BrowserCapability,
    target_id: String,
    current_url: String,
    domain: String,
    authenticated_at: DateTime<Utc>,
}

impl<'a> Session<'a> {
    pub fn new(
        browser: &'a dyn BrowserCapability,
        target_id: impl Into<String>,
        current_url: impl Into<String>,
    ) -> Self {
        let current_url = current_url.into();
        let domain = host_of(&current_url).unwrap_or_default();
        Self {
            browser,
            target_id: target_id.into(),
            current_url,
            domain,
            authenticated_at: Utc::now(),
        }
    }

    pub fn browser(&self) -> &'a dyn BrowserCapability {
        self.browser
    }

    pub fn executor(&self) -> JsExecutor<'a> {
        JsExecutor::new(self.browser)
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn current_url(&self) -> &str {
        &self.current_url
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn authenticated_at(&self) -> DateTime<Utc> {
        self.authenticated_at
    }

    /// 后续导航是否仍在本目标的域名下
    pub fn is_on_domain(&self, url: &str) -> bool {
        host_of(url).is_some_and(|host| host_matches(&host, &self.domain))
    }
}

/// 提取 URL 的主机名
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

/// 主机名等于域名或是其子域
pub fn host_matches(host: &str, domain: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let domain = domain.trim_start_matches('.').to_ascii_lowercase();
    !domain.is_empty() && (host == domain || host.ends_with(&format!(".{}", domain)))
}
