//! 音频格式识别与转码

use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::config::Config;
use crate::taxonomy::{ClassifiedError, ErrorKind, StageResult};

/// 转码上限
const TRANSCODE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
    Ogg,
    Webm,
    Unknown,
}

impl AudioFormat {
    /// 先看文件头，再看 Content-Type
    pub fn detect(bytes: &[u8], content_type: Option<&str>) -> Self {
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            return AudioFormat::Wav;
        }
        if bytes.starts_with(b"ID3")
            || (bytes.len() >= 2 && bytes[0] == 0xFF && (bytes[1] & 0xE0) == 0xE0)
        {
            return AudioFormat::Mp3;
        }
        if bytes.starts_with(b"OggS") {
            return AudioFormat::Ogg;
        }
        if bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            return AudioFormat::Webm;
        }

        let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
        if content_type.contains("wav") {
            AudioFormat::Wav
        } else if content_type.contains("mpeg") || content_type.contains("mp3") {
            AudioFormat::Mp3
        } else if content_type.contains("ogg") {
            AudioFormat::Ogg
        } else if content_type.contains("webm") {
            AudioFormat::Webm
        } else {
            AudioFormat::Unknown
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Webm => "webm",
            AudioFormat::Unknown => "bin",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Webm => "audio/webm",
            AudioFormat::Unknown => "application/octet-stream",
        }
    }
}

/// 一段音频
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

impl AudioClip {
    pub fn new(bytes: Vec<u8>, content_type: Option<&str>) -> Self {
        let format = AudioFormat::detect(&bytes, content_type);
        Self { bytes, format }
    }
}

/// 调用 ffmpeg 转码为 16kHz 单声道 wav
pub struct AudioTranscoder {
    ffmpeg_path: String,
}

impl AudioTranscoder {
    pub fn new(config: &Config) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
        }
    }

    /// 格式已被接受时原样返回，否则转码
    pub async fn normalize(&self, clip: AudioClip, accepted: &[String]) -> StageResult<AudioClip> {
        if accepted
            .iter()
            .any(|f| f.eq_ignore_ascii_case(clip.format.extension()))
        {
            debug!("音频格式 {} 无需转码", clip.format.extension());
            return Ok(clip);
        }

        info!("🔄 音频格式 {:?} 需要转码为 wav", clip.format);
        let bytes = self.to_wav(&clip.bytes).await?;
        Ok(AudioClip {
            bytes,
            format: AudioFormat::Wav,
        })
    }

    async fn to_wav(&self, input: &[u8]) -> StageResult<Vec<u8>> {
        let failure = |message: String| ClassifiedError::new(ErrorKind::ChallengeFailed, message);

        let mut child = Command::new(&self.ffmpeg_path)
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-i",
                "pipe:0",
                "-ac",
                "1",
                "-ar",
                "16000",
                "-f",
                "wav",
                "pipe:1",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| failure(format!("无法启动 ffmpeg ({}): {}", self.ffmpeg_path, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| failure("ffmpeg stdin 不可用".to_string()))?;
        let data = input.to_vec();
        let writer = tokio::spawn(async move {
            stdin.write_all(&data).await?;
            stdin.shutdown().await
        });

        let output = timeout(TRANSCODE_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| failure(format!("ffmpeg 转码超时 ({:?})", TRANSCODE_TIMEOUT)))?
            .map_err(|e| failure(format!("ffmpeg 执行失败: {}", e)))?;
        let _ = writer.await;

        if !output.status.success() || output.stdout.is_empty() {
            return Err(failure(format!(
                "ffmpeg 转码失败 ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_formats_from_magic_bytes() {
        assert_eq!(
            AudioFormat::detect(b"RIFF\x24\x00\x00\x00WAVEfmt ", None),
            AudioFormat::Wav
        );
        assert_eq!(AudioFormat::detect(b"ID3\x04\x00", None), AudioFormat::Mp3);
        assert_eq!(AudioFormat::detect(&[0xFF, 0xFB, 0x90], None), AudioFormat::Mp3);
        assert_eq!(AudioFormat::detect(b"OggS\x00", None), AudioFormat::Ogg);
    }

    #[test]
    fn falls_back_to_content_type() {
        assert_eq!(
            AudioFormat::detect(b"????", Some("audio/webm;codecs=opus")),
            AudioFormat::Webm
        );
        assert_eq!(AudioFormat::detect(b"????", None), AudioFormat::Unknown);
    }

    #[tokio::test]
    async fn accepted_formats_skip_transcoding() {
        let transcoder = AudioTranscoder {
            ffmpeg_path: "/nonexistent/ffmpeg".to_string(),
        };
        let clip = AudioClip::new(b"ID3\x04\x00\x00".to_vec(), None);
        let normalized = transcoder
            .normalize(clip, &["wav".to_string(), "MP3".to_string()])
            .await
            .unwrap();
        assert_eq!(normalized.format, AudioFormat::Mp3);
    }

    #[tokio::test]
    async fn missing_ffmpeg_is_a_challenge_failure() {
        let transcoder = AudioTranscoder {
            ffmpeg_path: "/nonexistent/ffmpeg".to_string(),
        };
        let clip = AudioClip::new(b"OggS\x00\x00".to_vec(), None);
        let err = transcoder
            .normalize(clip, &["wav".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChallengeFailed);
    }
}
