//! # Tribunal Sync
//!
//! 法院系统自动登录与结构化数据采集引擎
//!
//! ## 架构设计
//!
//! 本系统采用严格的分层架构，数据单向流动：
//! 请求 → 登录 → 会话 → 遍历 → 记录 → 汇总为运行结果
//!
//! ### ① 基础设施层（Infrastructure / Browser）
//! - `browser/` - `BrowserCapability` 能力接口与 chromiumoxide 实现
//! - `infrastructure/` - `JsExecutor`，执行页面脚本并解码为强类型
//!
//! ### ② 错误分类（Taxonomy）
//! - `taxonomy/` - 封闭的错误种类集合，类别与可重试性只由种类决定
//!
//! ### ③ 业务能力层（Services）
//! - `ChallengeSolver` - 语音验证码求解
//! - `TranscriptionService` / `AudioTranscoder` - 语音识别与转码
//! - `RecordWriter` - 报告、审计文件与截图落盘
//!
//! ### ④ 流程层（Workflow / Traversal）
//! - `workflow/` - 登录状态机与落地页判定
//! - `traversal/` - REST 分页与树形分页两种策略，惰性记录流
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/run_coordinator` - 单次运行，独占浏览器上下文
//! - `orchestrator/batch_processor` - 批量运行与并发控制
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod taxonomy;
pub mod traversal;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::{BrowserCapability, BrowserFactory, ChromiumFactory};
pub use config::Config;
pub use error::{AppError, AppResult, BrowserError};
pub use infrastructure::JsExecutor;
pub use models::{Credential, JobReport, Phase, Record, RunOutcome, TargetDescriptor};
pub use orchestrator::{App, RunCoordinator};
pub use taxonomy::{Category, ClassifiedError, ErrorKind};
