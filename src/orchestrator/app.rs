//! 应用驱动 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责组装各层并跑完一次完整流程。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：创建存储、投递通道、工作池和各项服务
//! 2. **上传识别**：扫描输入目录的页面图片，作为一个文档上传并开始识别
//! 3. **等待抽取**：轮询文档状态，抽取完成后把原卷写成 TOML 和 Markdown
//! 4. **按需出题**：存在生成请求文件时开始生成作业，完成后导出新试卷
//! 5. **全局统计**：汇总页数、题目数和任务执行情况
//!
//! ## 设计特点
//!
//! - **资源所有者**：唯一持有工作池的模块，结束时负责停止它
//! - **向下委托**：所有状态推进都交给 `PipelineCoordinator`

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::coordinator::{PipelineCoordinator, PipelineServices};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::{
    ChannelDispatcher, InMemoryStore, PoolSettings, PoolStatsSnapshot, WorkerPool,
};
use crate::models::{
    load_generation_request, load_page_images, save_exam_toml, Document, DocumentId, JobId,
    JobProgress,
};
use crate::services::{ExportService, ExtractService, GenerationService, OcrService, WarnWriter};
use crate::utils::logging::{log_stage_start, log_startup, print_final_stats, RunSummary};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// 应用主结构
pub struct App {
    config: Config,
    coordinator: Arc<PipelineCoordinator>,
    pool: WorkerPool,
    exporter: ExportService,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> AppResult<Self> {
        log_startup(&config);

        let store = Arc::new(InMemoryStore::new());
        let (dispatcher, receiver) = ChannelDispatcher::channel();

        let services = PipelineServices {
            recognizer: Arc::new(OcrService::new(&config)),
            extractor: Arc::new(ExtractService::new(&config)),
            generator: Arc::new(GenerationService::new(&config)),
        };

        let coordinator = Arc::new(
            PipelineCoordinator::new(
                store.clone(),
                store,
                Arc::new(dispatcher.clone()),
                services,
            )
            .with_warn_writer(WarnWriter::with_path(config.warn_file_path.clone())),
        );

        let pool = WorkerPool::spawn(
            coordinator.clone(),
            dispatcher,
            receiver,
            PoolSettings::from(&config),
        );

        Ok(Self {
            config,
            coordinator,
            pool,
            exporter: ExportService::new(),
        })
    }

    /// 运行应用主逻辑
    pub async fn run(self) -> AppResult<()> {
        let result = self.run_pipeline().await;
        let pool_stats = self.pool.shutdown().await;

        match result {
            Ok(Some(summary)) => {
                print_final_stats(&summary, &pool_stats, &self.config.output_log_file);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                error!("❌ 流水线中止: {}", e);
                Err(e)
            }
        }
    }

    async fn run_pipeline(&self) -> AppResult<Option<RunSummary>> {
        // ========== 1. 上传 ==========
        info!("\n📁 正在扫描待识别的页面: {}", self.config.input_folder);
        let pages = load_page_images(&self.config.input_folder).await?;
        if pages.is_empty() {
            warn!("⚠️ 没有找到待识别的页面图片，程序结束");
            return Ok(None);
        }

        let name = document_name(&self.config.input_folder);
        let mut summary = RunSummary {
            pages: pages.len(),
            ..Default::default()
        };
        let document_id = self.coordinator.upload_document(&name, pages).await?;

        // ========== 2. 识别 + 抽取 ==========
        log_stage_start("识别", &format!("{} 页", summary.pages));
        let ocr_job = self.coordinator.start_ocr_job(document_id).await?;
        let document = self.wait_for_document(document_id).await?;

        let ocr_progress = self.coordinator.get_job_progress(ocr_job).await?;
        summary.failed_pages = ocr_progress.failed_units.len();
        log_failed_units("识别", &ocr_progress);

        let Some(exam) = self.coordinator.original_exam(document_id).await? else {
            error!(
                "❌ 文档 {} 处理失败 (识别: {}, 抽取: {}): {}",
                document_id,
                document.ocr_status,
                document.extract_status,
                document.error.as_deref().unwrap_or("未知错误")
            );
            return Ok(Some(summary));
        };
        summary.questions = exam.questions().len();

        let output = Path::new(&self.config.output_folder);
        save_exam_toml(&output.join(format!("{}.toml", name)), &exam).await?;
        self.exporter
            .save_markdown(&output.join(format!("{}.md", name)), &self.exporter.render_exam(&exam))
            .await?;

        // ========== 3. 出题 ==========
        let request_path = PathBuf::from(&self.config.generation_request_file);
        let Some(request) = load_generation_request(&request_path).await? else {
            info!("💡 未找到生成请求文件 {}，跳过出题", request_path.display());
            return Ok(Some(summary));
        };

        log_stage_start(
            "出题",
            &format!("选中 {} 道，目标 {} 道", request.selected_ids.len(), request.target_count),
        );
        let gen_job = self
            .coordinator
            .start_generation_job(document_id, &request.selected_ids, request.target_count)
            .await?;
        let progress = self.wait_for_job(gen_job).await?;
        log_failed_units("出题", &progress);

        let generated = self.coordinator.generated_exam(gen_job).await?;
        summary.generated = generated.elements.len();
        summary.failed_generations = generated.failed_units.len();
        self.exporter
            .save_markdown(
                &output.join(format!("{}_generated.md", name)),
                &self.exporter.render_generated(&generated),
            )
            .await?;

        Ok(Some(summary))
    }

    /// 轮询直到文档两段状态都结束
    async fn wait_for_document(&self, document_id: DocumentId) -> AppResult<Document> {
        let baseline = self.pool.stats();
        loop {
            let document = self.coordinator.get_document(document_id).await?;
            if document.is_settled() {
                return Ok(document);
            }
            self.check_stalled(&baseline)?;
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// 轮询直到作业进入终态
    async fn wait_for_job(&self, job_id: JobId) -> AppResult<JobProgress> {
        let baseline = self.pool.stats();
        let mut last_completed = 0;
        loop {
            let progress = self.coordinator.get_job_progress(job_id).await?;
            if progress.status.is_terminal() {
                return Ok(progress);
            }
            if progress.completed != last_completed {
                info!("⏳ 作业进度: {}/{}", progress.completed, progress.total);
                last_completed = progress.completed;
            }
            self.check_stalled(&baseline)?;
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// 有任务被放弃或不可重试地失败时，等待永远不会结束
    fn check_stalled(&self, baseline: &PoolStatsSnapshot) -> AppResult<()> {
        let now = self.pool.stats();
        if now.abandoned > baseline.abandoned || now.failed > baseline.failed {
            return Err(AppError::Dispatch(format!(
                "有 {} 个任务被放弃、{} 个任务失败，流程无法继续",
                now.abandoned - baseline.abandoned,
                now.failed - baseline.failed
            )));
        }
        Ok(())
    }
}

/// 用输入目录名作为文档名
fn document_name(input_folder: &str) -> String {
    Path::new(input_folder)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("exam")
        .to_string()
}

fn log_failed_units(stage: &str, progress: &JobProgress) {
    if progress.is_partial() {
        warn!(
            "⚠️ {}作业完成，但有 {}/{} 个单元失败: {:?}",
            stage,
            progress.failed_units.len(),
            progress.total,
            progress.failed_units
        );
    } else {
        info!("✓ {}作业完成: {}/{}", stage, progress.completed, progress.total);
    }
}
