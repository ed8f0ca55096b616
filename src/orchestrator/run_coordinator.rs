//! 单次运行协调器 - 编排层
//!
//! 一次运行 = 一个（凭据，目标）对：打开浏览器上下文 → 登录 → 遍历 → 汇总。
//! 浏览器上下文在这里打开，也只在这里关闭：无论成功、分类失败还是 panic，`close()` 恰好调用一次。

use futures::{FutureExt, StreamExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::browser::{BrowserCapability, BrowserFactory};
use crate::config::Config;
use crate::models::{Credential, Phase, RunOutcome, TargetDescriptor};
use crate::services::{AudioTranscoder, ChallengeSolver, RecordWriter, TranscriptionService};
use crate::taxonomy::{ClassifiedError, ErrorKind};
use crate::traversal;
use crate::workflow::Authenticator;

pub struct RunCoordinator {
    factory: Arc<dyn BrowserFactory>,
    transcriber: Arc<dyn TranscriptionService>,
    transcoder: AudioTranscoder,
    /// 登录失败截图的落盘位置；None 表示不截图
    debug_writer: Option<RecordWriter>,
    navigation_timeout: Duration,
    page_delay: Duration,
}

impl RunCoordinator {
    pub fn new(
        config: &Config,
        factory: Arc<dyn BrowserFactory>,
        transcriber: Arc<dyn TranscriptionService>,
    ) -> Self {
        Self {
            factory,
            transcriber,
            transcoder: AudioTranscoder::new(config),
            debug_writer: None,
            navigation_timeout: config.navigation_timeout(),
            page_delay: config.page_delay(),
        }
    }

    pub fn with_debug_screenshots(mut self, writer: RecordWriter) -> Self {
        self.debug_writer = Some(writer);
        self
    }

    /// 执行一次运行，永远返回分类后的结果
    pub async fn run(
        &self,
        credential: &Credential,
        target: &TargetDescriptor,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        info!("[{}] ▶ 开始运行 ({})", target.id, target.name);

        let browser = match self.factory.open().await {
            Ok(browser) => browser,
            Err(e) => {
                error!("[{}] ❌ 无法打开浏览器上下文: {}", target.id, e);
                return RunOutcome::failure(e.classify_as(ErrorKind::ScriptError), Phase::Login);
            }
        };

        let logged_in = AtomicBool::new(false);
        let outcome = AssertUnwindSafe(self.drive(
            browser.as_ref(),
            credential,
            target,
            cancel,
            &logged_in,
        ))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| {
            let phase = if logged_in.load(Ordering::SeqCst) {
                Phase::DataFetch
            } else {
                Phase::Login
            };
            let message = panic_message(payload.as_ref());
            error!("[{}] ❌ 运行中发生 panic: {}", target.id, message);
            RunOutcome::failure(
                ClassifiedError::new(ErrorKind::ScriptError, format!("panic: {}", message)),
                phase,
            )
        });

        if let Err(e) = browser.close().await {
            warn!("[{}] 关闭浏览器上下文失败: {}", target.id, e);
        }

        match &outcome {
            RunOutcome::Success { records } => {
                info!("[{}] ✅ 运行成功: {} 条记录", target.id, records.len())
            }
            RunOutcome::Failure { error, phase } => error!(
                "[{}] ❌ 运行失败 ({:?}, {}): {}",
                target.id,
                phase,
                error.kind().code(),
                error.message()
            ),
        }
        outcome
    }

    async fn drive(
        &self,
        browser: &dyn BrowserCapability,
        credential: &Credential,
        target: &TargetDescriptor,
        cancel: &CancellationToken,
        logged_in: &AtomicBool,
    ) -> RunOutcome {
        if cancel.is_cancelled() {
            return RunOutcome::failure(
                ClassifiedError::new(ErrorKind::Cancelled, "登录前已取消"),
                Phase::Login,
            );
        }

        let solver = ChallengeSolver::new(self.transcriber.as_ref(), &self.transcoder);
        let mut authenticator =
            Authenticator::new(browser, target, &solver, self.navigation_timeout);
        let session = match authenticator.login(credential).await {
            Ok(session) => session,
            Err(err) => {
                self.capture_login_failure(browser, target).await;
                return RunOutcome::failure(err, Phase::Login);
            }
        };
        logged_in.store(true, Ordering::SeqCst);
        info!(
            "[{}] 🔑 会话建立于 {}，域名 {}",
            target.id,
            session.authenticated_at().format("%H:%M:%S%.3f"),
            session.domain()
        );

        let mut stream = traversal::extract(&session, target, cancel, self.page_delay);
        let mut records = Vec::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(record) => records.push(record),
                Err(err) => return RunOutcome::failure(err, Phase::DataFetch),
            }
        }
        RunOutcome::success(records)
    }

    /// 尽力而为：失败只记日志
    async fn capture_login_failure(&self, browser: &dyn BrowserCapability, target: &TargetDescriptor) {
        let Some(writer) = &self.debug_writer else {
            return;
        };
        let png = match browser.screenshot().await {
            Ok(png) => png,
            Err(e) => {
                warn!("[{}] 截图失败: {}", target.id, e);
                return;
            }
        };
        match writer.write_screenshot(&target.id, &png).await {
            Ok(path) => info!("[{}] 📸 登录失败截图: {}", target.id, path.display()),
            Err(e) => warn!("[{}] 保存截图失败: {}", target.id, e),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "未知 panic".to_string()
    }
}
