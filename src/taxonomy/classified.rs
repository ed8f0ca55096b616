use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fmt;

use super::kind::{Category, ErrorKind};

/// `classify` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub retryable: bool,
    pub user_message: &'static str,
}

/// 对任意种类做分类（全函数）
pub fn classify(kind: ErrorKind) -> Classification {
    Classification {
        category: kind.category(),
        retryable: kind.retryable(),
        user_message: kind.user_message(),
    }
}

/// 已分类的错误
///
/// 字段私有：类别与可重试标志只能由 `kind` 推导，不能单独设置
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedError {
    kind: ErrorKind,
    category: Category,
    message: String,
    user_message: &'static str,
    retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<JsonValue>,
    timestamp: DateTime<Utc>,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let classification = classify(kind);
        Self {
            kind,
            category: classification.category,
            message: message.into(),
            user_message: classification.user_message,
            retryable: classification.retryable,
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// 技术细节，只给运维和日志
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn user_message(&self) -> &'static str {
        self.user_message
    }

    pub fn retryable(&self) -> bool {
        self.retryable
    }

    pub fn details(&self) -> Option<&JsonValue> {
        self.details.as_ref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// 构造已分类错误
pub fn make(kind: ErrorKind, message: impl Into<String>, details: Option<JsonValue>) -> ClassifiedError {
    let error = ClassifiedError::new(kind, message);
    match details {
        Some(details) => error.with_details(details),
        None => error,
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.category, self.kind, self.message)
    }
}

impl std::error::Error for ClassifiedError {}
