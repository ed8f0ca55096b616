//! 批量运行处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量运行的调度和结果落盘。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：加载目标目录、创建浏览器工厂和识别客户端
//! 2. **并发控制**：使用 Semaphore 限制同时进行的运行数量
//! 3. **分批处理**：将目标分批次处理，每批完成后再开始下一批
//! 4. **结果落盘**：每次运行写出调度报告，成功时写出审计文件
//! 5. **全局统计**：汇总所有运行的结果
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单次运行的细节，委托 `RunCoordinator`
//! - **资源隔离**：每次运行各自打开、关闭自己的浏览器上下文

use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::browser::ChromiumFactory;
use crate::config::Config;
use crate::error::AppResult;
use crate::models::{load_targets, select_targets, Credential, RunOutcome, TargetDescriptor};
use crate::orchestrator::RunCoordinator;
use crate::services::{HttpTranscriptionClient, RecordWriter};
use crate::utils::logging::{log_batch_complete, log_batch_start, log_startup, print_final_stats};

/// 应用主结构
pub struct App {
    config: Config,
    targets: Vec<TargetDescriptor>,
    processor: BatchProcessor,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> AppResult<Self> {
        let catalog = load_targets(Path::new(&config.targets_file)).await?;
        let mut targets = select_targets(catalog, &config.target_ids)?;
        for target in &mut targets {
            target.fill_element_timeouts(config.element_timeout_secs);
        }
        log_startup(config.max_concurrent_runs, targets.len());

        let factory = Arc::new(ChromiumFactory::new(&config));
        let transcriber = Arc::new(HttpTranscriptionClient::new(&config)?);
        let coordinator = RunCoordinator::new(&config, factory, transcriber)
            .with_debug_screenshots(RecordWriter::new(&config.output_dir));

        let processor = BatchProcessor::new(
            coordinator,
            RecordWriter::new(&config.output_dir),
            config.max_concurrent_runs,
            config.write_audit_file,
        );

        Ok(Self {
            config,
            targets,
            processor,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self, credential: Credential, cancel: &CancellationToken) -> ProcessingStats {
        if self.targets.is_empty() {
            warn!("⚠️ 没有需要运行的目标，程序结束");
            return ProcessingStats::default();
        }

        let stats = self
            .processor
            .process_all(self.targets.clone(), Arc::new(credential), cancel)
            .await;

        print_final_stats(stats.success, stats.failed, stats.records, &self.config.output_dir);
        stats
    }
}

/// 处理统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingStats {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub records: usize,
}

/// 批次处理结果
#[derive(Debug, Default)]
struct BatchResult {
    success: usize,
    failed: usize,
    records: usize,
}

pub struct BatchProcessor {
    coordinator: Arc<RunCoordinator>,
    writer: Arc<RecordWriter>,
    max_concurrent: usize,
    write_audit_file: bool,
}

impl BatchProcessor {
    pub fn new(
        coordinator: RunCoordinator,
        writer: RecordWriter,
        max_concurrent: usize,
        write_audit_file: bool,
    ) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
            writer: Arc::new(writer),
            max_concurrent: max_concurrent.max(1),
            write_audit_file,
        }
    }

    /// 处理所有目标
    pub async fn process_all(
        &self,
        targets: Vec<TargetDescriptor>,
        credential: Arc<Credential>,
        cancel: &CancellationToken,
    ) -> ProcessingStats {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let total = targets.len();
        let mut stats = ProcessingStats {
            total,
            ..Default::default()
        };
        let total_batches = total.div_ceil(self.max_concurrent);

        // 分批处理
        for (batch_idx, batch) in targets.chunks(self.max_concurrent).enumerate() {
            let batch_start = batch_idx * self.max_concurrent;
            log_batch_start(
                batch_idx + 1,
                total_batches,
                batch_start + 1,
                batch_start + batch.len(),
                total,
            );

            let result = self
                .process_batch(batch, &credential, semaphore.clone(), cancel)
                .await;

            stats.success += result.success;
            stats.failed += result.failed;
            stats.records += result.records;
            log_batch_complete(batch_idx + 1, result.success, result.success + result.failed);
        }

        stats
    }

    /// 处理单个批次
    async fn process_batch(
        &self,
        batch: &[TargetDescriptor],
        credential: &Arc<Credential>,
        semaphore: Arc<Semaphore>,
        cancel: &CancellationToken,
    ) -> BatchResult {
        let mut handles = Vec::with_capacity(batch.len());

        for target in batch {
            let semaphore = semaphore.clone();
            let coordinator = self.coordinator.clone();
            let writer = self.writer.clone();
            let credential = credential.clone();
            let target = target.clone();
            let cancel = cancel.clone();
            let write_audit_file = self.write_audit_file;
            let target_id = target.id.clone();

            let handle = tokio::spawn(async move {
                // Semaphore 不会被关闭
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = coordinator.run(&credential, &target, &cancel).await;
                persist(&writer, &target.id, &outcome, write_audit_file).await;
                outcome
            });
            handles.push((target_id, handle));
        }

        // 等待本批所有任务完成
        let mut result = BatchResult::default();
        for (target_id, handle) in handles {
            match handle.await {
                Ok(outcome) if outcome.is_success() => {
                    result.success += 1;
                    result.records += outcome.count();
                }
                Ok(_) => result.failed += 1,
                Err(e) => {
                    error!("[{}] 任务执行失败: {}", target_id, e);
                    result.failed += 1;
                }
            }
        }
        result
    }
}

/// 写出报告与审计文件；失败只记日志，不影响运行结果
async fn persist(writer: &RecordWriter, target_id: &str, outcome: &RunOutcome, write_audit_file: bool) {
    match writer.write_report(target_id, &outcome.to_report()).await {
        Ok(path) => info!("[{}] 📝 报告已写入 {}", target_id, path.display()),
        Err(e) => warn!("[{}] 写入报告失败: {}", target_id, e),
    }

    if !write_audit_file {
        return;
    }
    if let Some(records) = outcome.records() {
        match writer.write_records(target_id, records).await {
            Ok(path) => info!("[{}] 📁 审计文件已写入 {}", target_id, path.display()),
            Err(e) => warn!("[{}] 写入审计文件失败: {}", target_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeBrowser, FakeFactory};
    use crate::models::fixtures::target;
    use crate::services::{AudioClip, TranscriptionService};
    use crate::taxonomy::{ClassifiedError, ErrorKind, StageResult};
    use async_trait::async_trait;

    struct Unused;

    #[async_trait]
    impl TranscriptionService for Unused {
        async fn transcribe(&self, _clip: &AudioClip) -> StageResult<String> {
            Err(ClassifiedError::new(ErrorKind::ChallengeFailed, "sem desafio"))
        }
    }

    #[tokio::test]
    async fn every_run_gets_its_own_context_and_report() {
        let browser = FakeBrowser::builder().build();
        let dir = std::env::temp_dir().join(format!("tribunal_sync-batch-{}", std::process::id()));
        let coordinator = RunCoordinator::new(
            &Config::default(),
            Arc::new(FakeFactory {
                browser: browser.clone(),
            }),
            Arc::new(Unused),
        );
        let processor = BatchProcessor::new(coordinator, RecordWriter::new(&dir), 2, true);

        let stats = processor
            .process_all(
                vec![target("trt2"), target("tjsp"), target("trt15")],
                Arc::new(Credential::new("12345678900", "s3nha")),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(
            stats,
            ProcessingStats {
                total: 3,
                success: 0,
                failed: 3,
                records: 0
            }
        );
        assert_eq!(browser.close_count(), 3);

        let mut reports = 0;
        let mut entries = tokio::fs::read_dir(&dir).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            if entry.file_name().to_string_lossy().contains("-report-") {
                reports += 1;
            }
        }
        assert_eq!(reports, 3);
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
