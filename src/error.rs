use std::fmt;
use std::time::Duration;

use crate::taxonomy::{ClassifiedError, ErrorKind};

/// 浏览器能力层错误
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    /// 有界等待超时
    #[error("等待 {what} 超时 ({after:?})")]
    Timeout { what: String, after: Duration },
    /// 元素不存在
    #[error("元素不存在: {0}")]
    ElementNotFound(String),
    /// 导航失败
    #[error("导航到 {url} 失败: {reason}")]
    Navigation { url: String, reason: String },
    /// 页面脚本执行失败
    #[error("执行脚本失败: {0}")]
    Script(String),
    /// 脚本结果无法解码为期望的类型
    #[error("脚本结果解码失败: {0}")]
    Decode(#[from] serde_json::Error),
    /// 浏览器上下文已关闭
    #[error("浏览器上下文已关闭")]
    Closed,
    /// 启动或连接浏览器失败
    #[error("启动浏览器失败: {0}")]
    Launch(String),
    #[error("{0}")]
    Other(String),
}

impl BrowserError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, BrowserError::Timeout { .. })
    }

    /// 按调用方语境分类
    pub fn classify_as(&self, kind: ErrorKind) -> ClassifiedError {
        ClassifiedError::new(kind, self.to_string())
    }

    /// 等待页面元素失败：超时/缺失视为页面结构变化，其余按网络故障处理
    pub fn classify_wait(&self, structural: ErrorKind) -> ClassifiedError {
        match self {
            BrowserError::Timeout { .. } | BrowserError::ElementNotFound(_) => {
                self.classify_as(structural)
            }
            BrowserError::Closed | BrowserError::Script(_) | BrowserError::Decode(_) => {
                self.classify_as(ErrorKind::ScriptError)
            }
            _ => self.classify_as(ErrorKind::NetworkError),
        }
    }

    /// 导航失败：超时视为服务器不可用
    pub fn classify_navigation(&self) -> ClassifiedError {
        match self {
            BrowserError::Timeout { .. } => self.classify_as(ErrorKind::ServerUnavailable),
            BrowserError::Closed | BrowserError::Script(_) | BrowserError::Decode(_) => {
                self.classify_as(ErrorKind::ScriptError)
            }
            _ => self.classify_as(ErrorKind::NetworkError),
        }
    }
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        BrowserError::Script(err.to_string())
    }
}

/// 应用程序错误类型（命令行、配置、文件）
#[derive(Debug)]
pub enum AppError {
    /// 浏览器相关错误
    Browser(BrowserError),
    /// 文件操作错误
    File(FileError),
    /// 配置错误
    Config(ConfigError),
    /// 其他错误（用于包装第三方库错误）
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Browser(e) => write!(f, "浏览器错误: {}", e),
            AppError::File(e) => write!(f, "文件错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
            AppError::Other(msg) => write!(f, "错误: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Browser(e) => Some(e),
            AppError::File(e) => Some(e),
            AppError::Config(e) => Some(e),
            AppError::Other(_) => None,
        }
    }
}

/// 文件操作错误
#[derive(Debug)]
pub enum FileError {
    /// 文件不存在
    NotFound { path: String },
    /// 读取文件失败
    ReadFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入文件失败
    WriteFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// TOML 解析失败
    TomlParseFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::NotFound { path } => write!(f, "文件不存在: {}", path),
            FileError::ReadFailed { path, source } => {
                write!(f, "读取文件失败 ({}): {}", path, source)
            }
            FileError::WriteFailed { path, source } => {
                write!(f, "写入文件失败 ({}): {}", path, source)
            }
            FileError::TomlParseFailed { path, source } => {
                write!(f, "TOML解析失败 ({}): {}", path, source)
            }
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::ReadFailed { source, .. }
            | FileError::WriteFailed { source, .. }
            | FileError::TomlParseFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            FileError::NotFound { .. } => None,
        }
    }
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 环境变量不存在
    EnvVarNotFound { var_name: String },
    /// 目标描述无效
    InvalidTarget { target_id: String, reason: String },
    /// 目标 ID 重复
    DuplicateTarget { target_id: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EnvVarNotFound { var_name } => {
                write!(f, "环境变量 {} 不存在", var_name)
            }
            ConfigError::InvalidTarget { target_id, reason } => {
                write!(f, "目标 {} 配置无效: {}", target_id, reason)
            }
            ConfigError::DuplicateTarget { target_id } => {
                write!(f, "目标 ID 重复: {}", target_id)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ========== 从常见错误类型转换 ==========

impl From<BrowserError> for AppError {
    fn from(err: BrowserError) -> Self {
        AppError::Browser(err)
    }
}

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::from(err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Other(format!("JSON 处理失败: {}", err))
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::File(FileError::TomlParseFailed {
            path: String::new(), // TOML错误通常不包含路径信息
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

/// 运行边界：未分类的失败统一包装为 SCRIPT_ERROR
impl From<AppError> for ClassifiedError {
    fn from(err: AppError) -> Self {
        ClassifiedError::new(ErrorKind::ScriptError, err.to_string())
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建目标配置错误
    pub fn invalid_target(target_id: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Config(ConfigError::InvalidTarget {
            target_id: target_id.into(),
            reason: reason.into(),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
