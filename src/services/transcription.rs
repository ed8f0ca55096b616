//! 语音识别服务 - 业务能力层
//!
//! 只负责"把一段音频变成文字"，单次请求、有超时、不在本层重试

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{debug, warn};

use super::audio::AudioClip;
use crate::config::Config;
use crate::error::AppError;
use crate::taxonomy::{ClassifiedError, ErrorKind, StageResult};

/// 语音识别能力
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    async fn transcribe(&self, clip: &AudioClip) -> StageResult<String>;
}

/// 识别服务可能返回的几种结构
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TranscriptionResponse {
    Transcription { transcription: String },
    Text { text: String },
    Segments(Vec<Segment>),
}

#[derive(Debug, Deserialize)]
struct Segment {
    text: String,
}

/// 从响应体中取出识别文本；结构不认识时返回 None
///
/// 分段形式 `[{text}]` 会把所有分段按空格拼成一句完整文本，取哪个词作答案由 `select_answer` 决定
pub fn parse_transcription(body: &JsonValue) -> Option<String> {
    let response: TranscriptionResponse = serde_json::from_value(body.clone()).ok()?;
    let text = match response {
        TranscriptionResponse::Transcription { transcription } => transcription,
        TranscriptionResponse::Text { text } => text,
        TranscriptionResponse::Segments(segments) => segments
            .into_iter()
            .map(|s| s.text)
            .collect::<Vec<_>>()
            .join(" "),
    };
    Some(text.trim().to_string())
}

/// 基于 HTTP multipart 的识别客户端
pub struct HttpTranscriptionClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpTranscriptionClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let timeout = config.transcription_timeout();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Other(format!("创建识别客户端失败: {}", e)))?;
        Ok(Self {
            client,
            endpoint: config.transcription_url.clone(),
            timeout,
        })
    }

    fn failure(&self, message: impl Into<String>) -> ClassifiedError {
        ClassifiedError::new(ErrorKind::ChallengeFailed, message)
    }
}

#[async_trait]
impl TranscriptionService for HttpTranscriptionClient {
    async fn transcribe(&self, clip: &AudioClip) -> StageResult<String> {
        debug!(
            "提交音频到识别服务: {} ({} 字节, {})",
            self.endpoint,
            clip.bytes.len(),
            clip.format.mime()
        );

        let part = Part::bytes(clip.bytes.clone())
            .file_name(format!("captcha.{}", clip.format.extension()))
            .mime_str(clip.format.mime())
            .map_err(|e| self.failure(format!("MIME 无效: {}", e)))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    self.failure(format!("识别服务超时 ({:?})", self.timeout))
                } else {
                    self.failure(format!("识别服务请求失败: {}", e))
                }
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            warn!("识别服务返回状态 {}", status);
            return Err(self.failure(format!("识别服务返回状态 {}", status)));
        }

        let body: JsonValue = response
            .json()
            .await
            .map_err(|e| self.failure(format!("识别服务响应不是 JSON: {}", e)))?;

        parse_transcription(&body)
            .ok_or_else(|| self.failure(format!("识别服务响应结构未知: {}", body)))
    }
}
