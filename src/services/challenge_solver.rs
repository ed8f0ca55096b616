//! 语音验证码求解 - 业务能力层
//!
//! 流程：定位音频 → 下载 → 必要时转码 → 识别 → 取第一个词 → 提交 → 等待登录表单出现

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::audio::{AudioClip, AudioTranscoder};
use super::transcription::TranscriptionService;
use crate::browser::{BrowserCapability, WaitOptions};
use crate::infrastructure::JsExecutor;
use crate::models::ChallengeConfig;
use crate::taxonomy::{ClassifiedError, ErrorKind, StageResult};

/// 定位器探测轮数（音频可能在点击后才插入 DOM）
const PROBE_ROUNDS: usize = 3;
const PROBE_INTERVAL: Duration = Duration::from_millis(1000);

pub(crate) const AUDIO_SOURCE_SCRIPT: &str = r#"(selector) => {
    const el = document.querySelector(selector);
    if (!el) return null;
    const src = el.currentSrc || el.src || el.getAttribute('src') || el.href || el.getAttribute('href');
    return src ? String(src) : null;
}"#;

pub(crate) const DOWNLOAD_AUDIO_SCRIPT: &str = r#"async (src) => {
    try {
        const res = await fetch(src, { credentials: 'include' });
        if (!res.ok) return { ok: false, status: res.status, contentType: null, data: null };
        const buf = new Uint8Array(await res.arrayBuffer());
        let binary = '';
        for (let i = 0; i < buf.length; i += 0x8000) {
            binary += String.fromCharCode.apply(null, buf.subarray(i, i + 0x8000));
        }
        return { ok: true, status: res.status, contentType: res.headers.get('content-type'), data: btoa(binary) };
    } catch (err) {
        return { ok: false, status: 0, contentType: null, data: null, error: String(err) };
    }
}"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadedAudio {
    ok: bool,
    status: u16,
    content_type: Option<String>,
    data: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// 识别结果可能包含多个词而验证码只要一个：取第一个
///
/// 这是已知的启发式，没有根据验证码实际期望的词序做校验
pub fn select_answer(transcription: &str) -> Option<&str> {
    transcription.split_whitespace().next()
}

/// 验证码求解器
pub struct ChallengeSolver<'a> {
    transcriber: &'a dyn TranscriptionService,
    transcoder: &'a AudioTranscoder,
}

impl<'a> ChallengeSolver<'a> {
    pub fn new(transcriber: &'a dyn TranscriptionService, transcoder: &'a AudioTranscoder) -> Self {
        Self {
            transcriber,
            transcoder,
        }
    }

    /// 求解当前页面上的验证码，返回提交的答案
    pub async fn solve(
        &self,
        browser: &dyn BrowserCapability,
        challenge: &ChallengeConfig,
    ) -> StageResult<String> {
        let executor = JsExecutor::new(browser);
        let wait = challenge.success_timeout();

        if let Some(button) = &challenge.audio_button_selector {
            browser
                .wait_for_element(button, WaitOptions::visible(wait))
                .await
                .map_err(|e| e.classify_wait(ErrorKind::ChallengeChanged))?;
            browser
                .click(button)
                .await
                .map_err(|e| e.classify_wait(ErrorKind::ChallengeChanged))?;
        }

        let src = self.locate_audio(&executor, &challenge.audio_locators).await?;
        let clip = self.download(&executor, &src).await?;
        let clip = self
            .transcoder
            .normalize(clip, &challenge.accepted_formats)
            .await?;

        let transcription = self.transcriber.transcribe(&clip).await?;
        let answer = select_answer(&transcription)
            .ok_or_else(|| ClassifiedError::new(ErrorKind::ChallengeFailed, "识别结果为空"))?
            .to_string();
        info!("🎧 验证码识别结果: '{}' → 提交 '{}'", transcription, answer);

        browser
            .wait_for_element(&challenge.answer_selector, WaitOptions::visible(wait))
            .await
            .map_err(|e| e.classify_wait(ErrorKind::ChallengeChanged))?;
        browser
            .type_text(&challenge.answer_selector, &answer)
            .await
            .map_err(|e| e.classify_wait(ErrorKind::ChallengeChanged))?;
        browser
            .click(&challenge.submit_selector)
            .await
            .map_err(|e| e.classify_wait(ErrorKind::ChallengeChanged))?;

        // 超时说明验证码流程变了，而不是服务器慢
        browser
            .wait_for_element(&challenge.success_selector, WaitOptions::visible(wait))
            .await
            .map_err(|e| e.classify_wait(ErrorKind::ChallengeChanged))?;

        info!("✓ 验证码已通过");
        Ok(answer)
    }

    /// 按顺序探测候选定位器
    async fn locate_audio(
        &self,
        executor: &JsExecutor<'_>,
        locators: &[String],
    ) -> StageResult<String> {
        for round in 0..PROBE_ROUNDS {
            if round > 0 {
                sleep(PROBE_INTERVAL).await;
            }
            for locator in locators {
                let src: Option<String> = executor
                    .eval_as(AUDIO_SOURCE_SCRIPT, vec![JsonValue::from(locator.as_str())])
                    .await
                    .map_err(|e| e.classify_as(ErrorKind::ScriptError))?;
                match src.filter(|s| !s.trim().is_empty()) {
                    Some(src) => {
                        debug!("音频定位器命中: {} → {}", locator, src);
                        return Ok(src);
                    }
                    None => debug!("音频定位器未命中: {}", locator),
                }
            }
        }

        Err(ClassifiedError::new(
            ErrorKind::ChallengeChanged,
            format!("所有音频定位器均未命中: {:?}", locators),
        ))
    }

    async fn download(&self, executor: &JsExecutor<'_>, src: &str) -> StageResult<AudioClip> {
        if let Some(clip) = decode_data_url(src)? {
            return Ok(clip);
        }

        let downloaded: DownloadedAudio = executor
            .eval_as(DOWNLOAD_AUDIO_SCRIPT, vec![JsonValue::from(src)])
            .await
            .map_err(|e| e.classify_as(ErrorKind::ChallengeFailed))?;

        if !downloaded.ok {
            warn!("下载验证码音频失败: status={} {:?}", downloaded.status, downloaded.error);
            return Err(ClassifiedError::new(
                ErrorKind::ChallengeFailed,
                format!("下载音频失败 (status {})", downloaded.status),
            ));
        }

        let data = downloaded.data.unwrap_or_default();
        let bytes = STANDARD
            .decode(data.as_bytes())
            .map_err(|e| ClassifiedError::new(ErrorKind::ChallengeFailed, format!("音频 base64 无效: {}", e)))?;
        if bytes.is_empty() {
            return Err(ClassifiedError::new(ErrorKind::ChallengeFailed, "音频为空"));
        }
        Ok(AudioClip::new(bytes, downloaded.content_type.as_deref()))
    }
}

/// `data:audio/wav;base64,...` 形式的音频直接在本地解码
fn decode_data_url(src: &str) -> StageResult<Option<AudioClip>> {
    let Some(rest) = src.strip_prefix("data:") else {
        return Ok(None);
    };
    let Some((meta, payload)) = rest.split_once(',') else {
        return Err(ClassifiedError::new(ErrorKind::ChallengeFailed, "data URL 无效"));
    };
    if !meta.ends_with(";base64") {
        return Err(ClassifiedError::new(ErrorKind::ChallengeFailed, "data URL 不是 base64"));
    }
    let bytes = STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| ClassifiedError::new(ErrorKind::ChallengeFailed, format!("音频 base64 无效: {}", e)))?;
    let content_type = meta.trim_end_matches(";base64");
    Ok(Some(AudioClip::new(bytes, Some(content_type))))
}
