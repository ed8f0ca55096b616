//! 审计写入服务 - 业务能力层
//!
//! 只负责"把结果落盘"，不关心流程；写入失败由调用方记录日志，不影响运行结果

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::{JobReport, Record};

/// 审计文件内容
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuditDocument<'a> {
    extracted_at: DateTime<Utc>,
    source: &'a str,
    count: usize,
    records: &'a [Record],
}

/// 审计写入服务
///
/// 所有文件都写在 `output_dir` 下，文件名带目标 ID 与时间戳
pub struct RecordWriter {
    output_dir: PathBuf,
}

impl RecordWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 写出提取到的记录
    pub async fn write_records(&self, source: &str, records: &[Record]) -> AppResult<PathBuf> {
        let document = AuditDocument {
            extracted_at: Utc::now(),
            source,
            count: records.len(),
            records,
        };
        let body = serde_json::to_vec_pretty(&document)?;
        let path = self.file_path(source, "records", "json", document.extracted_at);
        self.write(&path, &body).await?;
        Ok(path)
    }

    /// 写出交给调度器的报告
    pub async fn write_report(&self, source: &str, report: &JobReport) -> AppResult<PathBuf> {
        let body = serde_json::to_vec_pretty(report)?;
        let path = self.file_path(source, "report", "json", report.timestamp);
        self.write(&path, &body).await?;
        Ok(path)
    }

    /// 登录失败时的调试截图
    pub async fn write_screenshot(&self, source: &str, png: &[u8]) -> AppResult<PathBuf> {
        let path = self.file_path(source, "login-failure", "png", Utc::now());
        self.write(&path, png).await?;
        Ok(path)
    }

    fn file_path(&self, source: &str, label: &str, ext: &str, at: DateTime<Utc>) -> PathBuf {
        let source: String = source
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.output_dir.join(format!(
            "{}-{}-{}.{}",
            source,
            label,
            at.format("%Y%m%dT%H%M%S%.3fZ"),
            ext
        ))
    }

    async fn write(&self, path: &Path, body: &[u8]) -> AppResult<()> {
        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| AppError::file_write_failed(self.output_dir.display().to_string(), e))?;
        fs::write(path, body)
            .await
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;
        debug!("已写入 {} ({} 字节)", path.display(), body.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Provenance, RecordKind, RunOutcome};
    use serde_json::{json, Value as JsonValue};
    use std::collections::BTreeMap;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tribunal_sync-{}-{}", name, std::process::id()))
    }

    fn record(numero: &str) -> Record {
        Record::new(
            numero,
            RecordKind::Audiencia,
            Provenance {
                target: "trt2".to_string(),
                node: None,
                page: 1,
            },
            BTreeMap::new(),
            json!({"numeroProcesso": numero}),
        )
    }

    #[tokio::test]
    async fn audit_document_has_count_and_source() {
        let dir = scratch_dir("audit");
        let writer = RecordWriter::new(&dir);
        let path = writer
            .write_records("trt2", &[record("0001"), record("0002")])
            .await
            .unwrap();

        let body: JsonValue = serde_json::from_slice(&fs::read(&path).await.unwrap()).unwrap();
        assert_eq!(body["source"], "trt2");
        assert_eq!(body["count"], 2);
        assert_eq!(body["records"][1]["numeroProcesso"], "0002");
        assert!(body["extractedAt"].is_string());

        let _ = fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn report_file_lands_in_output_dir() {
        let dir = scratch_dir("report");
        let writer = RecordWriter::new(&dir);
        let report = RunOutcome::success(vec![record("0001")]).to_report();
        let path = writer.write_report("trt/2", &report).await.unwrap();

        assert!(path.starts_with(&dir));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("trt_2-report-"), "{}", name);

        let _ = fs::remove_dir_all(&dir).await;
    }
}
