//! 持久化存储接口
//!
//! 作业计数与状态推进只依赖两个原子原语：
//! - `increment_completed`：自增并返回自增后的值（同一步完成，中间没有单独的读）
//! - `compare_and_set_status`：按当前状态条件更新，先写者胜
//!
//! 单元结果与计数由 `complete_unit` 在同一步提交：单元写入终态而计数没有增加的
//! 中间状态对外不可见。

mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{
    CounterState, Document, DocumentId, DocumentPatch, Exam, Job, JobId, JobKind,
    OriginalQuestion, PageInput, Status, UnitPatch, UnitRecord,
};

/// 作业存储
#[async_trait]
pub trait JobStore: Send + Sync {
    /// 创建作业记录，返回新分配的 ID
    async fn create_job(&self, kind: JobKind, total_units: usize) -> AppResult<JobId>;

    /// 批量写入单元槽位（一次写入，观察者不会看到半截列表）
    async fn write_units(&self, job_id: JobId, units: Vec<UnitRecord>) -> AppResult<()>;

    /// 原子自增已完成数，返回自增后的 (completed, total)
    async fn increment_completed(&self, job_id: JobId) -> AppResult<CounterState>;

    /// 仅当当前状态属于 `expected` 时改为 `new`，返回是否生效
    async fn compare_and_set_status(
        &self,
        job_id: JobId,
        expected: &[Status],
        new: Status,
    ) -> AppResult<bool>;

    /// 强制设置作业状态（只用于创建者显式收尾或初始化失败）
    async fn set_job_status(
        &self,
        job_id: JobId,
        status: Status,
        error: Option<String>,
    ) -> AppResult<()>;

    async fn get_job(&self, job_id: JobId) -> AppResult<Job>;

    /// 某个文档的全部作业，按创建时间排序
    async fn list_jobs(&self, document_id: DocumentId) -> AppResult<Vec<Job>>;

    async fn get_unit(&self, job_id: JobId, unit_index: usize) -> AppResult<UnitRecord>;

    /// 按 unit_index 排序返回全部单元
    async fn list_units(&self, job_id: JobId) -> AppResult<Vec<UnitRecord>>;

    /// 合并写入单元字段
    async fn merge_unit(&self, job_id: JobId, unit_index: usize, patch: UnitPatch) -> AppResult<()>;

    /// 仅当单元状态属于 `expected` 时合并补丁并原子自增已完成数
    ///
    /// 生效时返回自增后的 (completed, total)；单元已被其他调用完成时返回 None，计数不变。
    async fn complete_unit(
        &self,
        job_id: JobId,
        unit_index: usize,
        expected: &[Status],
        patch: UnitPatch,
    ) -> AppResult<Option<CounterState>>;

    /// 标记完成回调已成功执行
    async fn mark_callback_done(&self, job_id: JobId) -> AppResult<()>;

    /// 删除作业及其单元
    async fn delete_job(&self, job_id: JobId) -> AppResult<()>;

    /// 记录一次工作者调用：attempts + 1，pending 改为 processing，返回更新后的单元
    async fn record_attempt(&self, job_id: JobId, unit_index: usize) -> AppResult<UnitRecord>;
}

/// 文档存储
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create_document(&self, document: Document) -> AppResult<()>;

    /// 合并写入，返回更新后的文档
    async fn update_document(&self, id: DocumentId, patch: DocumentPatch) -> AppResult<Document>;

    /// 仅当抽取状态属于 `expected` 时改为 `new`，返回是否生效
    async fn compare_and_set_extract_status(
        &self,
        id: DocumentId,
        expected: &[Status],
        new: Status,
    ) -> AppResult<bool>;

    async fn get_document(&self, id: DocumentId) -> AppResult<Document>;

    /// 保存上传的页面图片，同时更新 page_count
    async fn save_pages(&self, id: DocumentId, pages: Vec<PageInput>) -> AppResult<()>;

    /// 按上传顺序返回页面
    async fn list_pages(&self, id: DocumentId) -> AppResult<Vec<PageInput>>;

    /// 保存原卷：元信息写在文档上，题目按 0 起序号单独存放
    async fn save_original_exam(&self, id: DocumentId, exam: &Exam) -> AppResult<()>;

    /// 完整原卷（含说明文字），尚未抽取时为 None
    async fn original_exam(&self, id: DocumentId) -> AppResult<Option<Exam>>;

    /// 按序号返回原题
    async fn list_original_questions(&self, id: DocumentId) -> AppResult<Vec<OriginalQuestion>>;

    /// 删除文档及其全部作业
    async fn delete_document(&self, id: DocumentId) -> AppResult<()>;
}
