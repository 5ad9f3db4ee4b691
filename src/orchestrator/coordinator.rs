//! 流水线协调器 - 编排层
//!
//! ## 职责
//!
//! 管理每个文档的两段状态（识别 / 抽取），以及按选中题目生成新试卷的作业。
//!
//! ## 状态推进
//!
//! ```text
//! 上传          ocr=pending   extract=pending
//! 开始识别      ocr=processing（每页一个单元扇出）
//! 识别作业到齐  ocr=done      extract=processing（投递单个抽取任务）
//! 抽取成功      extract=done  原卷入库
//! 抽取失败      extract=error（全部页识别失败时 ocr 也为 error）
//! ```
//!
//! 生成作业独立于上面的状态：每道选中题一个单元，全部到齐后作业为 done，
//! 个别失败的题目只体现在单元状态上。

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::fan_out::FanOutDispatcher;
use crate::error::{AppResult, BusinessError};
use crate::infrastructure::{Dispatcher, DocumentStore, JobStore, Task, TaskDescriptor, TaskHandler};
use crate::models::{
    Document, DocumentId, DocumentPatch, Exam, ExamMetadata, GeneratedElement, GeneratedExam,
    GenerationUnit, Job, JobId, JobKind, JobProgress, OriginalQuestion, PageInput, Status, UnitInput,
    UnitResult,
};
use crate::services::{
    ExamExtractor, PageRecognizer, QuestionGenerator, WarnWriter, FAILED_PAGE_MARKER,
};
use crate::workflow::{CompletionCallback, UnitCompute, UnitCtx, UnitWorker};

/// 协调器依赖的三种计算能力
#[derive(Clone)]
pub struct PipelineServices {
    pub recognizer: Arc<dyn PageRecognizer>,
    pub extractor: Arc<dyn ExamExtractor>,
    pub generator: Arc<dyn QuestionGenerator>,
}

/// 流水线协调器
pub struct PipelineCoordinator {
    jobs: Arc<dyn JobStore>,
    documents: Arc<dyn DocumentStore>,
    dispatcher: Arc<dyn Dispatcher>,
    fan_out: FanOutDispatcher,
    worker: UnitWorker,
    services: PipelineServices,
    warn_writer: Option<WarnWriter>,
}

impl PipelineCoordinator {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        documents: Arc<dyn DocumentStore>,
        dispatcher: Arc<dyn Dispatcher>,
        services: PipelineServices,
    ) -> Self {
        Self {
            fan_out: FanOutDispatcher::new(jobs.clone(), dispatcher.clone()),
            worker: UnitWorker::new(jobs.clone()),
            jobs,
            documents,
            dispatcher,
            services,
            warn_writer: None,
        }
    }

    /// 失败单元同时写入警告文件
    pub fn with_warn_writer(mut self, warn_writer: WarnWriter) -> Self {
        self.warn_writer = Some(warn_writer);
        self
    }

    // ========== 文档 ==========

    /// 上传文档，两段状态都为 pending
    pub async fn upload_document(
        &self,
        filename: &str,
        pages: Vec<PageInput>,
    ) -> AppResult<DocumentId> {
        let document_id = DocumentId::new();
        self.documents
            .create_document(Document::new(document_id, filename, pages.len()))
            .await?;
        let page_count = pages.len();
        self.documents.save_pages(document_id, pages).await?;

        info!("📄 文档 {} 上传完成: {}，共 {} 页", document_id, filename, page_count);
        Ok(document_id)
    }

    pub async fn get_document(&self, document_id: DocumentId) -> AppResult<Document> {
        self.documents.get_document(document_id).await
    }

    /// 抽取得到的完整原卷
    pub async fn original_exam(&self, document_id: DocumentId) -> AppResult<Option<Exam>> {
        self.documents.original_exam(document_id).await
    }

    /// 抽取得到的原题，按序号排列
    pub async fn list_original_questions(
        &self,
        document_id: DocumentId,
    ) -> AppResult<Vec<OriginalQuestion>> {
        self.documents.list_original_questions(document_id).await
    }

    /// 删除文档及其全部作业
    pub async fn delete_document(&self, document_id: DocumentId) -> AppResult<()> {
        self.documents.delete_document(document_id).await?;
        info!("🗑️ 文档 {} 已删除", document_id);
        Ok(())
    }

    // ========== 作业入口 ==========

    /// 开始识别：每页一个单元
    ///
    /// 没有任何页面时直接把文档两段状态和作业都标记为 error，不经过汇总。
    pub async fn start_ocr_job(&self, document_id: DocumentId) -> AppResult<JobId> {
        let pages = self.documents.list_pages(document_id).await?;
        let kind = JobKind::Ocr { document_id };

        if pages.is_empty() {
            let reason = BusinessError::NoPages {
                document_id: document_id.to_string(),
            }
            .to_string();
            error!("❌ {}", reason);

            let job_id = self.jobs.create_job(kind, 0).await?;
            self.jobs
                .set_job_status(job_id, Status::Error, Some(reason.clone()))
                .await?;
            self.documents
                .update_document(
                    document_id,
                    DocumentPatch {
                        ocr_status: Some(Status::Error),
                        extract_status: Some(Status::Error),
                        error: Some(reason),
                        ocr_job_id: Some(job_id),
                    },
                )
                .await?;
            return Ok(job_id);
        }

        // 先改文档状态再扇出，完成回调写入的 done 不会被这里覆盖
        self.documents
            .update_document(document_id, DocumentPatch::ocr(Status::Processing))
            .await?;

        let units = pages.into_iter().map(UnitInput::Page).collect();
        let job_id = match self.fan_out.start_job(kind, units).await {
            Ok(job_id) => job_id,
            Err(e) => {
                self.documents
                    .update_document(
                        document_id,
                        DocumentPatch::ocr(Status::Error).with_error(e.to_string()),
                    )
                    .await?;
                return Err(e);
            }
        };

        self.documents
            .update_document(
                document_id,
                DocumentPatch {
                    ocr_job_id: Some(job_id),
                    ..Default::default()
                },
            )
            .await?;

        info!("🔍 文档 {} 开始识别，作业 {}", document_id, job_id);
        Ok(job_id)
    }

    /// 开始生成新试卷
    ///
    /// 按原卷顺序保留选中的题目，最多取 `target_count` 道。
    pub async fn start_generation_job(
        &self,
        document_id: DocumentId,
        selected_ids: &[String],
        target_count: usize,
    ) -> AppResult<JobId> {
        if target_count == 0 {
            return Err(BusinessError::ZeroTargetCount.into());
        }

        let document = self.documents.get_document(document_id).await?;
        if document.extract_status != Status::Done {
            return Err(BusinessError::NotExtracted {
                document_id: document_id.to_string(),
            }
            .into());
        }

        let units: Vec<UnitInput> = self
            .documents
            .list_original_questions(document_id)
            .await?
            .into_iter()
            .filter(|q| selected_ids.contains(&q.id))
            .filter_map(|q| {
                let kind = q.element.kind()?;
                Some(UnitInput::Question(GenerationUnit {
                    source_id: q.id,
                    kind,
                    question: q.element,
                }))
            })
            .take(target_count)
            .collect();

        if units.is_empty() {
            return Err(BusinessError::NothingSelected.into());
        }

        let total = units.len();
        let job_id = self
            .fan_out
            .start_job(JobKind::Generation { document_id }, units)
            .await?;

        info!("✨ 文档 {} 开始生成新试卷，作业 {}，共 {} 道题", document_id, job_id, total);
        Ok(job_id)
    }

    /// 显式收尾没有单元的作业（汇总路径永远不会触发它们）
    ///
    /// 返回本次调用是否完成了收尾。
    pub async fn finalize_empty_job(&self, job_id: JobId) -> AppResult<bool> {
        let job = self.jobs.get_job(job_id).await?;
        if job.total_units > 0 {
            warn!("⚠️ 作业 {} 有 {} 个单元，不能直接收尾", job_id, job.total_units);
            return Ok(false);
        }
        self.jobs
            .compare_and_set_status(job_id, &Status::OPEN, Status::Done)
            .await
    }

    /// 删除生成作业及其单元；识别作业随文档一起删除
    pub async fn delete_generation_job(&self, job_id: JobId) -> AppResult<()> {
        let job = self.jobs.get_job(job_id).await?;
        if !matches!(job.kind, JobKind::Generation { .. }) {
            return Err(BusinessError::WrongJobKind {
                job_id,
                expected: "生成",
            }
            .into());
        }
        self.jobs.delete_job(job_id).await?;
        info!("🗑️ 生成作业 {} 已删除", job_id);
        Ok(())
    }

    // ========== 查询 ==========

    /// 某个文档的全部生成作业，按创建时间排序
    pub async fn list_generation_jobs(&self, document_id: DocumentId) -> AppResult<Vec<Job>> {
        Ok(self
            .jobs
            .list_jobs(document_id)
            .await?
            .into_iter()
            .filter(|job| matches!(job.kind, JobKind::Generation { .. }))
            .collect())
    }

    /// 作业进度：随时可查询，单元按序号排列
    pub async fn get_job_progress(&self, job_id: JobId) -> AppResult<JobProgress> {
        let job = self.jobs.get_job(job_id).await?;
        let units = self.jobs.list_units(job_id).await?;
        let failed_units = units
            .iter()
            .filter(|u| u.status == Status::Error)
            .map(|u| u.unit_index)
            .collect();

        Ok(JobProgress {
            job_id,
            status: job.status,
            completed: job.completed_units,
            total: job.total_units,
            units,
            failed_units,
        })
    }

    /// 组装生成的新试卷：已成功的题目按单元序号排列，失败的单元单独列出
    pub async fn generated_exam(&self, job_id: JobId) -> AppResult<GeneratedExam> {
        let job = self.jobs.get_job(job_id).await?;
        let document_id = match job.kind {
            JobKind::Generation { document_id } => document_id,
            JobKind::Ocr { .. } => {
                return Err(BusinessError::WrongJobKind {
                    job_id,
                    expected: "生成",
                }
                .into())
            }
        };
        let duration_minutes = self
            .documents
            .get_document(document_id)
            .await?
            .original_exam
            .and_then(|m| m.duration_minutes);

        let mut elements = Vec::new();
        let mut failed_units = Vec::new();
        for unit in self.jobs.list_units(job_id).await? {
            match (unit.status, unit.payload) {
                (Status::Done, Some(payload)) => {
                    elements.push(serde_json::from_value::<GeneratedElement>(payload)?)
                }
                (Status::Error, _) => failed_units.push(unit.unit_index),
                _ => {}
            }
        }

        Ok(GeneratedExam {
            metadata: ExamMetadata {
                title: format!("Generated Exam {}", job_id),
                duration_minutes,
            },
            elements,
            failed_units,
        })
    }

    // ========== 内部步骤 ==========

    /// 抽取任务：读取识别作业的全部单元，按页序合并后抽取
    ///
    /// 只有抽取状态为 processing 时才执行，重复投递在这里被过滤掉。
    async fn run_extraction(&self, document_id: DocumentId, ocr_job_id: JobId) -> AppResult<()> {
        let document = self.documents.get_document(document_id).await?;
        if document.extract_status != Status::Processing {
            info!(
                "文档 {} 抽取状态为 {}，跳过重复的抽取任务",
                document_id, document.extract_status
            );
            return Ok(());
        }

        let units = self.jobs.list_units(ocr_job_id).await?;
        let mut pages = Vec::with_capacity(units.len());
        let mut failed_pages = 0;
        for unit in &units {
            match (unit.status, &unit.payload) {
                (Status::Done, Some(JsonValue::String(markdown))) => pages.push(markdown.clone()),
                _ => {
                    failed_pages += 1;
                    pages.push(FAILED_PAGE_MARKER.to_string());
                }
            }
        }

        if failed_pages == units.len() {
            let reason = format!("全部 {} 页识别失败", failed_pages);
            error!("❌ 文档 {} {}", document_id, reason);
            self.documents
                .update_document(
                    document_id,
                    DocumentPatch {
                        ocr_status: Some(Status::Error),
                        extract_status: Some(Status::Error),
                        error: Some(reason),
                        ocr_job_id: None,
                    },
                )
                .await?;
            return Ok(());
        }

        if failed_pages > 0 {
            warn!(
                "⚠️ 文档 {} 有 {}/{} 页识别失败，以占位行代替",
                document_id,
                failed_pages,
                units.len()
            );
        }

        match self.services.extractor.extract(&pages).await {
            Ok(exam) if exam.questions().is_empty() => {
                let reason = BusinessError::NoQuestions {
                    document_id: document_id.to_string(),
                }
                .to_string();
                error!("❌ {}", reason);
                self.documents
                    .update_document(
                        document_id,
                        DocumentPatch::extract(Status::Error).with_error(reason),
                    )
                    .await?;
            }
            Ok(exam) => {
                self.documents.save_original_exam(document_id, &exam).await?;
                self.documents
                    .update_document(document_id, DocumentPatch::extract(Status::Done))
                    .await?;
                info!("✅ 文档 {} 抽取完成，{} 道题", document_id, exam.questions().len());
            }
            Err(e) if e.is_retryable() => return Err(e),
            Err(e) => {
                error!("❌ 文档 {} 抽取失败: {}", document_id, e);
                self.documents
                    .update_document(
                        document_id,
                        DocumentPatch::extract(Status::Error).with_error(e.to_string()),
                    )
                    .await?;
            }
        }

        Ok(())
    }

    /// 失败单元写入警告文件，写入失败只记日志
    async fn report_failed_units(&self, job_id: JobId) -> AppResult<usize> {
        let failed: Vec<_> = self
            .jobs
            .list_units(job_id)
            .await?
            .into_iter()
            .filter(|u| u.status == Status::Error)
            .collect();

        if let Some(writer) = &self.warn_writer {
            for unit in &failed {
                let reason = unit.error.as_deref().unwrap_or("未知错误");
                if let Err(e) = writer.write(job_id, unit.unit_index, reason).await {
                    warn!("写入警告文件失败: {}", e);
                }
            }
        }

        Ok(failed.len())
    }
}

#[async_trait]
impl UnitCompute for PipelineCoordinator {
    async fn compute(&self, input: &UnitInput) -> UnitResult {
        match input {
            UnitInput::Page(page) => match self.services.recognizer.recognize(page).await {
                Ok(markdown) => UnitResult::Success(JsonValue::String(markdown)),
                Err(e) => UnitResult::Failure(e.to_string()),
            },
            UnitInput::Question(unit) => match self.services.generator.generate(unit).await {
                Ok(question) => serde_json::to_value(GeneratedElement {
                    question,
                    original_id: unit.source_id.clone(),
                })
                .into(),
                Err(e) => UnitResult::Failure(e.to_string()),
            },
        }
    }
}

#[async_trait]
impl CompletionCallback for PipelineCoordinator {
    async fn on_job_complete(&self, job_id: JobId) -> AppResult<()> {
        let job = self.jobs.get_job(job_id).await?;
        let failed = self.report_failed_units(job_id).await?;

        match job.kind {
            JobKind::Ocr { document_id } => {
                info!(
                    "✓ 文档 {} 识别完成: {}/{} 页成功",
                    document_id,
                    job.total_units - failed,
                    job.total_units
                );
                self.documents
                    .update_document(document_id, DocumentPatch::ocr(Status::Done))
                    .await?;

                // 条件更新保证抽取任务只投递一次
                let started = self
                    .documents
                    .compare_and_set_extract_status(document_id, &[Status::Pending], Status::Processing)
                    .await?;
                if !started {
                    info!("文档 {} 的抽取已经开始，不再重复投递", document_id);
                    return Ok(());
                }

                let task = TaskDescriptor::new(Task::Extract {
                    document_id,
                    ocr_job_id: job_id,
                });
                if let Err(e) = self.dispatcher.dispatch(task).await {
                    self.documents
                        .update_document(
                            document_id,
                            DocumentPatch::extract(Status::Error).with_error(e.to_string()),
                        )
                        .await?;
                    return Err(e);
                }
            }
            JobKind::Generation { document_id } => {
                if failed > 0 {
                    warn!(
                        "⚠️ 文档 {} 的生成作业 {} 完成，其中 {}/{} 道题失败",
                        document_id, job_id, failed, job.total_units
                    );
                } else {
                    info!(
                        "✅ 文档 {} 的生成作业 {} 全部完成，共 {} 道题",
                        document_id, job_id, job.total_units
                    );
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl TaskHandler for PipelineCoordinator {
    async fn handle(&self, task: &TaskDescriptor) -> AppResult<()> {
        match &task.task {
            Task::Unit {
                job_id,
                unit_index,
                input,
            } => {
                let ctx = UnitCtx::new(*job_id, *unit_index, task.attempt);
                self.worker.process(&ctx, input, self, self).await?;
                Ok(())
            }
            Task::Extract {
                document_id,
                ocr_job_id,
            } => self.run_extraction(*document_id, *ocr_job_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};
    use crate::infrastructure::{InMemoryStore, RecordingDispatcher};
    use crate::models::{ExamElement, GeneratedQuestion, ShortAnswerAnswer};

    /// 字节为 [0] 的页识别失败，[9] 识别为封面
    struct FakeRecognizer;

    #[async_trait]
    impl PageRecognizer for FakeRecognizer {
        async fn recognize(&self, page: &PageInput) -> AppResult<String> {
            match page.bytes.as_slice() {
                [0] => Err(AppError::llm_api_failed("fake", "图片无法识别")),
                [9] => Ok("封面".to_string()),
                _ => Ok(format!("第{}页", page.page_number)),
            }
        }
    }

    /// 封面是说明文字，其余非占位页各生成一道简答题
    struct FakeExtractor;

    #[async_trait]
    impl ExamExtractor for FakeExtractor {
        async fn extract(&self, pages: &[String]) -> AppResult<Exam> {
            let elements = pages
                .iter()
                .filter(|p| p.as_str() != FAILED_PAGE_MARKER)
                .map(|p| match p.as_str() {
                    "封面" => ExamElement::Text { content: p.clone() },
                    _ => ExamElement::ShortAnswer { content: p.clone() },
                })
                .collect();
            Ok(Exam {
                metadata: ExamMetadata {
                    title: "期末".to_string(),
                    duration_minutes: Some(60),
                },
                elements,
            })
        }
    }

    struct FakeGenerator;

    #[async_trait]
    impl QuestionGenerator for FakeGenerator {
        async fn generate(&self, unit: &GenerationUnit) -> AppResult<GeneratedQuestion> {
            Ok(GeneratedQuestion::ShortAnswer {
                content: format!("新题 {}", unit.question.content()),
                answer: ShortAnswerAnswer {
                    answer_text: "42".to_string(),
                    explanation: "略".to_string(),
                },
            })
        }
    }

    fn page(n: usize, bytes: Vec<u8>) -> PageInput {
        PageInput {
            page_number: n,
            file_name: format!("p-{}.png", n),
            media_type: "image/png".to_string(),
            bytes,
        }
    }

    fn coordinator() -> (PipelineCoordinator, Arc<InMemoryStore>, Arc<RecordingDispatcher>) {
        let store = Arc::new(InMemoryStore::new());
        let recorder = Arc::new(RecordingDispatcher::new());
        let services = PipelineServices {
            recognizer: Arc::new(FakeRecognizer),
            extractor: Arc::new(FakeExtractor),
            generator: Arc::new(FakeGenerator),
        };
        let coordinator =
            PipelineCoordinator::new(store.clone(), store.clone(), recorder.clone(), services);
        (coordinator, store, recorder)
    }

    /// 手动执行目前记录的全部任务，直到没有新任务
    async fn drain(coordinator: &PipelineCoordinator, recorder: &RecordingDispatcher) {
        loop {
            let tasks = recorder.take();
            if tasks.is_empty() {
                return;
            }
            for task in tasks {
                coordinator.handle(&task).await.unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_ocr_then_extraction_then_generation() {
        let (coordinator, _store, recorder) = coordinator();
        let document_id = coordinator
            .upload_document("exam", vec![page(1, vec![1]), page(2, vec![2])])
            .await
            .unwrap();

        let ocr_job = coordinator.start_ocr_job(document_id).await.unwrap();
        assert_eq!(
            coordinator.get_document(document_id).await.unwrap().ocr_status,
            Status::Processing
        );
        drain(&coordinator, &recorder).await;

        let document = coordinator.get_document(document_id).await.unwrap();
        assert_eq!(document.ocr_status, Status::Done);
        assert_eq!(document.extract_status, Status::Done);
        assert_eq!(document.ocr_job_id, Some(ocr_job));

        let questions = coordinator.list_original_questions(document_id).await.unwrap();
        assert_eq!(questions.len(), 2);
        let exam = coordinator.original_exam(document_id).await.unwrap().unwrap();
        assert_eq!(exam.metadata.title, "期末");

        let gen_job = coordinator
            .start_generation_job(document_id, &["1".to_string(), "0".to_string()], 5)
            .await
            .unwrap();
        drain(&coordinator, &recorder).await;

        let exam = coordinator.generated_exam(gen_job).await.unwrap();
        assert_eq!(exam.metadata.title, format!("Generated Exam {}", gen_job));
        assert_eq!(exam.metadata.duration_minutes, Some(60));
        // 按原卷顺序，而不是选择顺序
        let ids: Vec<&str> = exam.elements.iter().map(|e| e.original_id.as_str()).collect();
        assert_eq!(ids, vec!["0", "1"]);
        assert!(exam.failed_units.is_empty());
    }

    #[tokio::test]
    async fn test_failed_page_is_replaced_by_marker() {
        let (coordinator, store, recorder) = coordinator();
        let document_id = coordinator
            .upload_document("exam", vec![page(1, vec![0]), page(2, vec![2])])
            .await
            .unwrap();
        let job_id = coordinator.start_ocr_job(document_id).await.unwrap();
        drain(&coordinator, &recorder).await;

        let progress = coordinator.get_job_progress(job_id).await.unwrap();
        assert_eq!(progress.status, Status::Done);
        assert_eq!(progress.failed_units, vec![0]);
        assert!(progress.is_partial());

        assert_eq!(store.list_original_questions(document_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_all_pages_failed_is_ocr_error() {
        let (coordinator, _store, recorder) = coordinator();
        let document_id = coordinator
            .upload_document("exam", vec![page(1, vec![0])])
            .await
            .unwrap();
        coordinator.start_ocr_job(document_id).await.unwrap();
        drain(&coordinator, &recorder).await;

        let document = coordinator.get_document(document_id).await.unwrap();
        assert_eq!(document.ocr_status, Status::Error);
        assert_eq!(document.extract_status, Status::Error);
        assert!(document.error.is_some());
    }

    #[tokio::test]
    async fn test_exam_without_questions_is_extract_error() {
        let (coordinator, store, recorder) = coordinator();
        let document_id = coordinator
            .upload_document("cover", vec![page(1, vec![9])])
            .await
            .unwrap();
        coordinator.start_ocr_job(document_id).await.unwrap();
        drain(&coordinator, &recorder).await;

        let document = coordinator.get_document(document_id).await.unwrap();
        assert_eq!(document.ocr_status, Status::Done);
        assert_eq!(document.extract_status, Status::Error);
        assert!(document.error.unwrap().contains("没有抽取到任何题目"));
        assert!(store.original_exam(document_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_zero_pages_marks_everything_error() {
        let (coordinator, _store, recorder) = coordinator();
        let document_id = coordinator.upload_document("empty", Vec::new()).await.unwrap();

        let job_id = coordinator.start_ocr_job(document_id).await.unwrap();

        assert!(recorder.is_empty());
        assert_eq!(coordinator.get_job_progress(job_id).await.unwrap().status, Status::Error);
        let document = coordinator.get_document(document_id).await.unwrap();
        assert_eq!(document.ocr_status, Status::Error);
        assert_eq!(document.extract_status, Status::Error);
    }

    #[tokio::test]
    async fn test_duplicate_extract_task_is_skipped() {
        let (coordinator, store, recorder) = coordinator();
        let document_id = coordinator
            .upload_document("exam", vec![page(1, vec![1])])
            .await
            .unwrap();
        coordinator.start_ocr_job(document_id).await.unwrap();
        coordinator.handle(&recorder.take()[0]).await.unwrap();

        let extract = recorder.take().remove(0);
        coordinator.handle(&extract).await.unwrap();
        // 重复投递：抽取状态已是 done，不再覆盖原卷
        coordinator.handle(&extract.redelivery()).await.unwrap();

        assert_eq!(store.list_original_questions(document_id).await.unwrap().len(), 1);
        assert!(recorder.is_empty());
    }

    #[tokio::test]
    async fn test_generation_rejects_bad_selection() {
        let (coordinator, _store, recorder) = coordinator();
        let document_id = coordinator
            .upload_document("exam", vec![page(1, vec![1])])
            .await
            .unwrap();

        let not_ready = coordinator
            .start_generation_job(document_id, &["0".to_string()], 1)
            .await;
        assert!(matches!(
            not_ready,
            Err(AppError::Business(BusinessError::NotExtracted { .. }))
        ));

        coordinator.start_ocr_job(document_id).await.unwrap();
        drain(&coordinator, &recorder).await;

        let unknown = coordinator
            .start_generation_job(document_id, &["9".to_string()], 1)
            .await;
        assert!(matches!(
            unknown,
            Err(AppError::Business(BusinessError::NothingSelected))
        ));

        let zero = coordinator
            .start_generation_job(document_id, &["0".to_string()], 0)
            .await;
        assert!(matches!(
            zero,
            Err(AppError::Business(BusinessError::ZeroTargetCount))
        ));
    }

    #[tokio::test]
    async fn test_generation_truncates_to_target_count() {
        let (coordinator, _store, recorder) = coordinator();
        let document_id = coordinator
            .upload_document("exam", (1..=3).map(|i| page(i, vec![i as u8])).collect())
            .await
            .unwrap();
        coordinator.start_ocr_job(document_id).await.unwrap();
        drain(&coordinator, &recorder).await;

        let selected: Vec<String> = vec!["0".into(), "1".into(), "2".into()];
        let job_id = coordinator
            .start_generation_job(document_id, &selected, 2)
            .await
            .unwrap();

        let progress = coordinator.get_job_progress(job_id).await.unwrap();
        assert_eq!(progress.total, 2);
        assert_eq!(recorder.len(), 2);
    }

    #[tokio::test]
    async fn test_finalize_empty_job() {
        let (coordinator, store, _recorder) = coordinator();
        let empty = store
            .create_job(
                JobKind::Generation {
                    document_id: DocumentId::new(),
                },
                0,
            )
            .await
            .unwrap();
        let non_empty = store
            .create_job(
                JobKind::Generation {
                    document_id: DocumentId::new(),
                },
                1,
            )
            .await
            .unwrap();

        assert!(coordinator.finalize_empty_job(empty).await.unwrap());
        assert!(!coordinator.finalize_empty_job(empty).await.unwrap());
        assert!(!coordinator.finalize_empty_job(non_empty).await.unwrap());
        assert_eq!(store.get_job(empty).await.unwrap().status, Status::Done);
    }

    #[tokio::test]
    async fn test_generated_exam_rejects_ocr_job() {
        let (coordinator, _store, _recorder) = coordinator();
        let document_id = coordinator
            .upload_document("exam", vec![page(1, vec![1])])
            .await
            .unwrap();
        let job_id = coordinator.start_ocr_job(document_id).await.unwrap();

        assert!(matches!(
            coordinator.generated_exam(job_id).await,
            Err(AppError::Business(BusinessError::WrongJobKind { .. }))
        ));
    }

    #[tokio::test]
    async fn test_list_and_delete_generation_jobs() {
        let (coordinator, _store, recorder) = coordinator();
        let document_id = coordinator
            .upload_document("exam", vec![page(1, vec![1]), page(2, vec![2])])
            .await
            .unwrap();
        coordinator.start_ocr_job(document_id).await.unwrap();
        drain(&coordinator, &recorder).await;

        let first = coordinator
            .start_generation_job(document_id, &["0".to_string()], 1)
            .await
            .unwrap();
        let second = coordinator
            .start_generation_job(document_id, &["1".to_string()], 1)
            .await
            .unwrap();
        drain(&coordinator, &recorder).await;

        let listed: Vec<JobId> = coordinator
            .list_generation_jobs(document_id)
            .await
            .unwrap()
            .iter()
            .map(|job| job.id)
            .collect();
        assert_eq!(listed.len(), 2);
        assert!(listed.contains(&first) && listed.contains(&second));

        coordinator.delete_generation_job(first).await.unwrap();
        let listed = coordinator.list_generation_jobs(document_id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, second);
        assert!(coordinator.get_job_progress(first).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_generation_job_rejects_ocr_job() {
        let (coordinator, store, _recorder) = coordinator();
        let document_id = coordinator
            .upload_document("exam", vec![page(1, vec![1])])
            .await
            .unwrap();
        let ocr_job = coordinator.start_ocr_job(document_id).await.unwrap();

        assert!(matches!(
            coordinator.delete_generation_job(ocr_job).await,
            Err(AppError::Business(BusinessError::WrongJobKind { .. }))
        ));
        assert!(store.get_job(ocr_job).await.is_ok());
        assert!(coordinator.list_generation_jobs(document_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_in_completion_callback_is_redelivered() {
        let (coordinator, store, recorder) = coordinator();
        let document_id = coordinator
            .upload_document("exam", vec![page(1, vec![1])])
            .await
            .unwrap();
        coordinator.start_ocr_job(document_id).await.unwrap();
        let task = recorder.take().remove(0);

        // 放行记录调用、写入结果、切换作业状态、回调里的两次读取，文档状态写入失败
        store.inject_unavailable_after(5, 1);
        let err = coordinator.handle(&task).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(
            coordinator.get_document(document_id).await.unwrap().ocr_status,
            Status::Processing
        );
        assert!(recorder.is_empty());

        coordinator
            .handle(&task.redelivery())
            .await
            .unwrap();
        drain(&coordinator, &recorder).await;

        let document = coordinator.get_document(document_id).await.unwrap();
        assert_eq!(document.ocr_status, Status::Done);
        assert_eq!(document.extract_status, Status::Done);
        assert_eq!(coordinator.list_original_questions(document_id).await.unwrap().len(), 1);
    }
}
