use chrono::{DateTime, Utc};
use serde::Serialize;

use super::record::Record;
use crate::taxonomy::{Category, ClassifiedError, ErrorKind};

/// 失败发生在会话建立之前还是之后
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Login,
    DataFetch,
}

/// 一次运行的最终结果，成功与失败两个分支互斥
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Success { records: Vec<Record> },
    Failure { error: ClassifiedError, phase: Phase },
}

impl RunOutcome {
    pub fn success(records: Vec<Record>) -> Self {
        RunOutcome::Success { records }
    }

    pub fn failure(error: ClassifiedError, phase: Phase) -> Self {
        RunOutcome::Failure { error, phase }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success { .. })
    }

    pub fn records(&self) -> Option<&[Record]> {
        match self {
            RunOutcome::Success { records } => Some(records),
            RunOutcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ClassifiedError> {
        match self {
            RunOutcome::Success { .. } => None,
            RunOutcome::Failure { error, .. } => Some(error),
        }
    }

    pub fn phase(&self) -> Option<Phase> {
        match self {
            RunOutcome::Success { .. } => None,
            RunOutcome::Failure { phase, .. } => Some(*phase),
        }
    }

    pub fn count(&self) -> usize {
        self.records().map_or(0, <[Record]>::len)
    }

    /// 生成交给调度器的报告
    pub fn to_report(&self) -> JobReport {
        let timestamp = Utc::now();
        match self {
            RunOutcome::Success { records } => JobReport {
                success: true,
                processos_count: records.len(),
                processos: records.clone(),
                timestamp,
                error: None,
            },
            RunOutcome::Failure { error, phase } => JobReport {
                success: false,
                processos_count: 0,
                processos: Vec::new(),
                timestamp,
                error: Some(ReportError::new(error, *phase)),
            },
        }
    }
}

/// 调度器消费的 JSON 报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub success: bool,
    pub processos_count: usize,
    pub processos: Vec<Record>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ReportError>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportError {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub category: Category,
    pub phase: Phase,
    /// 面向用户
    pub message: String,
    /// 面向运维
    pub technical_message: String,
    pub retryable: bool,
    pub timestamp: DateTime<Utc>,
}

impl ReportError {
    fn new(error: &ClassifiedError, phase: Phase) -> Self {
        Self {
            kind: error.kind(),
            category: error.category(),
            phase,
            message: error.user_message().to_string(),
            technical_message: error.message().to_string(),
            retryable: error.retryable(),
            timestamp: error.timestamp(),
        }
    }
}
