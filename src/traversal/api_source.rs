//! REST 分页策略
//!
//! 请求在页面内发出（`credentials: 'include'`），复用登录后的会话；
//! 第一页读取总页数，之后在以下任一条件满足时停止：
//! 页码达到总页数、某页为空、达到硬上限。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info, warn};

use super::PageSource;
use crate::infrastructure::JsExecutor;
use crate::models::{ApiPagination, Provenance, Record, Session};
use crate::taxonomy::{ClassifiedError, ErrorKind, StageResult};

pub(crate) const FETCH_JSON_SCRIPT: &str = r#"async (url, cookieName) => {
    const headers = { 'Accept': 'application/json' };
    if (cookieName) {
        const match = document.cookie.split('; ').find((c) => c.startsWith(cookieName + '='));
        if (match) headers['Authorization'] = 'Bearer ' + decodeURIComponent(match.slice(cookieName.length + 1));
    }
    try {
        const res = await fetch(url, { credentials: 'include', headers });
        const text = await res.text();
        let body = null;
        try { body = text ? JSON.parse(text) : null; } catch (_) { body = null; }
        return { status: res.status, body, snippet: text.slice(0, 200) };
    } catch (err) {
        return { status: 0, body: null, snippet: String(err) };
    }
}"#;

/// 页面内请求的结果
#[derive(Debug, Deserialize)]
struct FetchResponse {
    status: u16,
    #[serde(default)]
    body: Option<JsonValue>,
    #[serde(default)]
    snippet: String,
}

/// HTTP 状态 → 错误种类；成功返回 None
pub fn classify_status(status: u16) -> Option<ErrorKind> {
    match status {
        0 => Some(ErrorKind::NetworkError),
        204 | 404 => Some(ErrorKind::NoDataFound),
        200..=299 => None,
        401 => Some(ErrorKind::SessionExpired),
        403 => Some(ErrorKind::WafBlocked),
        429 => Some(ErrorKind::RateLimited),
        500..=599 => Some(ErrorKind::ServerUnavailable),
        _ => Some(ErrorKind::ServerError),
    }
}

pub struct ApiSource<'a> {
    executor: JsExecutor<'a>,
    target_id: String,
    api: &'a ApiPagination,
    next_page: u32,
    total_pages: Option<u32>,
    done: bool,
}

impl<'a> ApiSource<'a> {
    pub fn new(session: &'a Session<'a>, target_id: &str, api: &'a ApiPagination) -> Self {
        Self {
            executor: session.executor(),
            target_id: target_id.to_string(),
            api,
            next_page: 1,
            total_pages: None,
            done: false,
        }
    }

    /// 在页面内 GET 一个 JSON 资源
    async fn fetch_json(&self, url: &str) -> StageResult<JsonValue> {
        let cookie = self
            .api
            .auth_cookie
            .as_deref()
            .map_or(JsonValue::Null, JsonValue::from);
        let response: FetchResponse = self
            .executor
            .eval_as(FETCH_JSON_SCRIPT, vec![JsonValue::from(url), cookie])
            .await
            .map_err(|e| e.classify_as(ErrorKind::ScriptError))?;

        if let Some(kind) = classify_status(response.status) {
            return Err(ClassifiedError::new(
                kind,
                format!("GET {} → {} {}", url, response.status, response.snippet),
            )
            .with_details(json!({ "url": url, "status": response.status })));
        }

        response.body.ok_or_else(|| {
            ClassifiedError::new(
                ErrorKind::ApiShapeChanged,
                format!("GET {} 返回的不是 JSON: {}", url, response.snippet),
            )
        })
    }

    /// 解出记录数组；形状不对说明接口变了
    fn page_items<'b>(&self, body: &'b JsonValue, page: u32) -> StageResult<&'b Vec<JsonValue>> {
        body.get(&self.api.records_field)
            .and_then(JsonValue::as_array)
            .ok_or_else(|| {
                ClassifiedError::new(
                    ErrorKind::ApiShapeChanged,
                    format!("第 {} 页缺少数组字段 '{}'", page, self.api.records_field),
                )
            })
    }

    fn total_pages_of(&self, body: &JsonValue) -> Option<u32> {
        let value = body.get(&self.api.total_pages_field)?;
        value
            .as_u64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
            .map(|n| n.min(u64::from(u32::MAX)) as u32)
    }

    fn to_record(&self, item: &JsonValue, page: u32) -> Option<Record> {
        let key = match item.get(&self.api.key_field) {
            Some(JsonValue::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(JsonValue::Number(n)) => n.to_string(),
            _ => {
                warn!(
                    "[{}] 第 {} 页有一条记录缺少 '{}'，已跳过",
                    self.target_id, page, self.api.key_field
                );
                return None;
            }
        };

        let fields = item
            .as_object()
            .map(|object| {
                object
                    .iter()
                    .filter_map(|(name, value)| {
                        let text = match value {
                            JsonValue::String(s) => s.clone(),
                            JsonValue::Number(n) => n.to_string(),
                            JsonValue::Bool(b) => b.to_string(),
                            _ => return None,
                        };
                        Some((name.clone(), text))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let provenance = Provenance {
            target: self.target_id.clone(),
            node: None,
            page,
        };
        Some(Record::new(key, self.api.record_kind, provenance, fields, item.clone()))
    }

    /// 尽力补充详情：失败只记日志，记录照常保留
    async fn enrich(&self, record: Record) -> Record {
        let Some(url) = self.api.detail_url(record.numero_processo()) else {
            return record;
        };
        match self.fetch_json(&url).await {
            Ok(detail) => record.with_detail(detail),
            Err(err) => {
                warn!(
                    "[{}] 详情获取失败 {}: {}",
                    self.target_id,
                    record.numero_processo(),
                    err
                );
                record
            }
        }
    }
}

#[async_trait]
impl PageSource for ApiSource<'_> {
    async fn fetch_page(&mut self) -> StageResult<Vec<Record>> {
        let page = self.next_page;
        let url = self.api.page_url(page);
        debug!("[{}] 请求第 {} 页: {}", self.target_id, page, url);

        let body = match self.fetch_json(&url).await {
            Ok(body) => body,
            Err(err) => {
                self.done = true;
                return Err(err);
            }
        };

        if page == 1 {
            self.total_pages = self.total_pages_of(&body);
            info!(
                "[{}] 📄 总页数: {}",
                self.target_id,
                self.total_pages
                    .map_or_else(|| "未知".to_string(), |n| n.to_string())
            );
        }

        let items = match self.page_items(&body, page) {
            Ok(items) => items,
            Err(err) => {
                self.done = true;
                return Err(err);
            }
        };

        let mut records = Vec::with_capacity(items.len());
        for item in items {
            if let Some(record) = self.to_record(item, page) {
                records.push(self.enrich(record).await);
            }
        }

        self.next_page += 1;
        self.done = items.is_empty()
            || self.total_pages.is_some_and(|total| page >= total)
            || page >= self.api.max_pages;
        if page >= self.api.max_pages && !items.is_empty() {
            warn!("[{}] 达到翻页上限 {}，停止", self.target_id, self.api.max_pages);
        }

        info!(
            "[{}] ✓ 第 {} 页: {} 条记录",
            self.target_id,
            page,
            records.len()
        );
        Ok(records)
    }

    fn has_more(&self) -> bool {
        !self.done
    }
}
