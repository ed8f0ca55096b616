use std::time::Duration;

/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    /// 同时执行的运行数量
    pub max_concurrent_runs: usize,
    /// 浏览器调试端口（设置后连接已有浏览器，否则启动无头浏览器）
    pub browser_debug_port: Option<u16>,
    /// Chrome 可执行文件路径
    pub chrome_executable: Option<String>,
    /// 是否无头模式
    pub headless: bool,
    /// 目标描述 TOML 文件
    pub targets_file: String,
    /// 只运行这些目标（为空表示全部）
    pub target_ids: Vec<String>,
    /// 输出目录（审计文件、报告、截图）
    pub output_dir: String,
    /// 是否写出审计 JSON
    pub write_audit_file: bool,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- 语音识别 ---
    pub transcription_url: String,
    pub transcription_timeout_secs: u64,
    pub ffmpeg_path: String,
    // --- 超时与节流 ---
    pub navigation_timeout_secs: u64,
    pub element_timeout_secs: u64,
    pub page_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 4,
            browser_debug_port: None,
            chrome_executable: None,
            headless: true,
            targets_file: "targets.toml".to_string(),
            target_ids: Vec::new(),
            output_dir: "output".to_string(),
            write_audit_file: true,
            verbose_logging: false,
            transcription_url: "http://localhost:8000/transcribe".to_string(),
            transcription_timeout_secs: 60,
            ffmpeg_path: "ffmpeg".to_string(),
            navigation_timeout_secs: 30,
            element_timeout_secs: 15,
            page_delay_ms: 500,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_concurrent_runs: std::env::var("MAX_CONCURRENT_RUNS").ok().and_then(|v| v.parse().ok()).filter(|n| *n > 0).unwrap_or(default.max_concurrent_runs),
            browser_debug_port: std::env::var("BROWSER_DEBUG_PORT").ok().and_then(|v| v.parse().ok()).or(default.browser_debug_port),
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().or(default.chrome_executable),
            headless: std::env::var("HEADLESS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.headless),
            targets_file: std::env::var("TARGETS_FILE").unwrap_or(default.targets_file),
            target_ids: std::env::var("TARGET_IDS").map(|v| parse_list(&v)).unwrap_or(default.target_ids),
            output_dir: std::env::var("OUTPUT_DIR").unwrap_or(default.output_dir),
            write_audit_file: std::env::var("WRITE_AUDIT_FILE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.write_audit_file),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            transcription_url: std::env::var("TRANSCRIPTION_URL").unwrap_or(default.transcription_url),
            transcription_timeout_secs: std::env::var("TRANSCRIPTION_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.transcription_timeout_secs),
            ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or(default.ffmpeg_path),
            navigation_timeout_secs: std::env::var("NAVIGATION_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.navigation_timeout_secs),
            element_timeout_secs: std::env::var("ELEMENT_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.element_timeout_secs),
            // 0 会关闭节流，这里不接受
            page_delay_ms: std::env::var("PAGE_DELAY_MS").ok().and_then(|v| v.parse().ok()).filter(|ms| *ms > 0).unwrap_or(default.page_delay_ms),
        }
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }

    pub fn transcription_timeout(&self) -> Duration {
        Duration::from_secs(self.transcription_timeout_secs)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
