//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量运行处理器
//! - 管理应用生命周期（初始化、运行）
//! - 控制并发数量（Semaphore）
//! - 写出报告与审计文件，输出全局统计
//!
//! ### `run_coordinator` - 单次运行协调器
//! - 独占一个浏览器上下文，保证关闭恰好一次
//! - 登录 → 遍历 → 汇总为 `RunOutcome`
//! - 任何未分类的失败（含 panic）在这里被包装为 `SCRIPT_ERROR`
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<TargetDescriptor>)
//!     ↓
//! run_coordinator (处理一个凭据 + 目标)
//!     ↓
//! workflow::Authenticator → traversal::extract
//!     ↓
//! services (能力层：验证码 / 识别 / 落盘)
//!     ↓
//! infrastructure + browser (JsExecutor / BrowserCapability)
//! ```

pub mod batch_processor;
pub mod run_coordinator;

pub use batch_processor::{App, BatchProcessor, ProcessingStats};
pub use run_coordinator::RunCoordinator;
