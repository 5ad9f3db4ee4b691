//! 内存存储
//!
//! 所有原语都在同一把锁内完成，因此自增与条件更新是严格原子的。

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::{DocumentStore, JobStore};
use crate::error::{AppError, AppResult, StoreError};
use crate::models::{
    CounterState, Document, DocumentId, DocumentPatch, Exam, Job, JobId, JobKind,
    OriginalQuestion, PageInput, Status, UnitPatch, UnitRecord,
};

struct JobEntry {
    job: Job,
    units: Vec<UnitRecord>,
}

struct DocumentEntry {
    document: Document,
    pages: Vec<PageInput>,
    exam: Option<Exam>,
    questions: Vec<OriginalQuestion>,
}

#[derive(Default)]
struct MemoryState {
    jobs: HashMap<JobId, JobEntry>,
    documents: HashMap<DocumentId, DocumentEntry>,
}

/// 内存存储
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
    /// 先放行这么多次操作
    injected_skips: AtomicUsize,
    /// 接下来这么多次操作直接返回“存储不可用”
    injected_failures: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 让接下来的 `count` 次操作失败，模拟存储抖动
    pub fn inject_unavailable(&self, count: usize) {
        self.inject_unavailable_after(0, count);
    }

    /// 先放行 `skip` 次操作，再让 `count` 次操作失败，用于把故障落在流程中的某一步
    pub fn inject_unavailable_after(&self, skip: usize, count: usize) {
        self.injected_skips.store(skip, Ordering::SeqCst);
        self.injected_failures.store(count, Ordering::SeqCst);
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, MemoryState>> {
        let skipped = self
            .injected_skips
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        let injected = skipped.is_err()
            && self
                .injected_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
        if injected {
            return Err(AppError::store_unavailable("注入的存储故障"));
        }
        self.state
            .lock()
            .map_err(|_| AppError::store_unavailable("存储锁已损坏"))
    }
}

fn job_entry(state: &mut MemoryState, job_id: JobId) -> AppResult<&mut JobEntry> {
    state
        .jobs
        .get_mut(&job_id)
        .ok_or_else(|| StoreError::JobNotFound(job_id).into())
}

fn unit_slot(entry: &mut JobEntry, job_id: JobId, unit_index: usize) -> AppResult<&mut UnitRecord> {
    entry
        .units
        .get_mut(unit_index)
        .ok_or_else(|| StoreError::UnitNotFound { job_id, unit_index }.into())
}

fn document_entry(state: &mut MemoryState, id: DocumentId) -> AppResult<&mut DocumentEntry> {
    state
        .documents
        .get_mut(&id)
        .ok_or_else(|| StoreError::DocumentNotFound(id.to_string()).into())
}

#[async_trait]
impl JobStore for InMemoryStore {
    async fn create_job(&self, kind: JobKind, total_units: usize) -> AppResult<JobId> {
        let mut state = self.lock()?;
        let job_id = JobId::new();
        state.jobs.insert(
            job_id,
            JobEntry {
                job: Job::new(job_id, kind, total_units),
                units: Vec::new(),
            },
        );
        debug!("创建作业 {}，单元数 {}", job_id, total_units);
        Ok(job_id)
    }

    async fn write_units(&self, job_id: JobId, mut units: Vec<UnitRecord>) -> AppResult<()> {
        let mut state = self.lock()?;
        let entry = job_entry(&mut state, job_id)?;
        units.sort_by_key(|u| u.unit_index);
        entry.units = units;
        Ok(())
    }

    async fn increment_completed(&self, job_id: JobId) -> AppResult<CounterState> {
        let mut state = self.lock()?;
        let entry = job_entry(&mut state, job_id)?;
        entry.job.completed_units += 1;
        entry.job.updated_at = Utc::now();
        Ok(entry.job.counter())
    }

    async fn compare_and_set_status(
        &self,
        job_id: JobId,
        expected: &[Status],
        new: Status,
    ) -> AppResult<bool> {
        let mut state = self.lock()?;
        let entry = job_entry(&mut state, job_id)?;
        if !expected.contains(&entry.job.status) {
            return Ok(false);
        }
        entry.job.status = new;
        entry.job.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_job_status(
        &self,
        job_id: JobId,
        status: Status,
        error: Option<String>,
    ) -> AppResult<()> {
        let mut state = self.lock()?;
        let entry = job_entry(&mut state, job_id)?;
        entry.job.status = status;
        if error.is_some() {
            entry.job.error = error;
        }
        entry.job.updated_at = Utc::now();
        Ok(())
    }

    async fn get_job(&self, job_id: JobId) -> AppResult<Job> {
        let mut state = self.lock()?;
        Ok(job_entry(&mut state, job_id)?.job.clone())
    }

    async fn list_jobs(&self, document_id: DocumentId) -> AppResult<Vec<Job>> {
        let state = self.lock()?;
        let mut jobs: Vec<Job> = state
            .jobs
            .values()
            .filter(|entry| entry.job.kind.document_id() == document_id)
            .map(|entry| entry.job.clone())
            .collect();
        jobs.sort_by_key(|job| job.created_at);
        Ok(jobs)
    }

    async fn get_unit(&self, job_id: JobId, unit_index: usize) -> AppResult<UnitRecord> {
        let mut state = self.lock()?;
        let entry = job_entry(&mut state, job_id)?;
        Ok(unit_slot(entry, job_id, unit_index)?.clone())
    }

    async fn list_units(&self, job_id: JobId) -> AppResult<Vec<UnitRecord>> {
        let mut state = self.lock()?;
        Ok(job_entry(&mut state, job_id)?.units.clone())
    }

    async fn merge_unit(&self, job_id: JobId, unit_index: usize, patch: UnitPatch) -> AppResult<()> {
        let mut state = self.lock()?;
        let entry = job_entry(&mut state, job_id)?;
        unit_slot(entry, job_id, unit_index)?.apply(patch);
        Ok(())
    }

    async fn complete_unit(
        &self,
        job_id: JobId,
        unit_index: usize,
        expected: &[Status],
        patch: UnitPatch,
    ) -> AppResult<Option<CounterState>> {
        let mut state = self.lock()?;
        let entry = job_entry(&mut state, job_id)?;
        let unit = unit_slot(entry, job_id, unit_index)?;
        if !expected.contains(&unit.status) {
            return Ok(None);
        }
        unit.apply(patch);
        entry.job.completed_units += 1;
        entry.job.updated_at = Utc::now();
        Ok(Some(entry.job.counter()))
    }

    async fn mark_callback_done(&self, job_id: JobId) -> AppResult<()> {
        let mut state = self.lock()?;
        let entry = job_entry(&mut state, job_id)?;
        entry.job.callback_done = true;
        entry.job.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_job(&self, job_id: JobId) -> AppResult<()> {
        let mut state = self.lock()?;
        if state.jobs.remove(&job_id).is_none() {
            return Err(StoreError::JobNotFound(job_id).into());
        }
        debug!("删除作业 {}", job_id);
        Ok(())
    }

    async fn record_attempt(&self, job_id: JobId, unit_index: usize) -> AppResult<UnitRecord> {
        let mut state = self.lock()?;
        let entry = job_entry(&mut state, job_id)?;
        let unit = unit_slot(entry, job_id, unit_index)?;
        unit.attempts += 1;
        if unit.status == Status::Pending {
            unit.status = Status::Processing;
        }
        unit.updated_at = Utc::now();
        Ok(unit.clone())
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn create_document(&self, document: Document) -> AppResult<()> {
        let mut state = self.lock()?;
        state.documents.insert(
            document.id,
            DocumentEntry {
                document,
                pages: Vec::new(),
                exam: None,
                questions: Vec::new(),
            },
        );
        Ok(())
    }

    async fn update_document(&self, id: DocumentId, patch: DocumentPatch) -> AppResult<Document> {
        let mut state = self.lock()?;
        let entry = document_entry(&mut state, id)?;
        entry.document.apply(patch);
        Ok(entry.document.clone())
    }

    async fn compare_and_set_extract_status(
        &self,
        id: DocumentId,
        expected: &[Status],
        new: Status,
    ) -> AppResult<bool> {
        let mut state = self.lock()?;
        let entry = document_entry(&mut state, id)?;
        if !expected.contains(&entry.document.extract_status) {
            return Ok(false);
        }
        entry.document.apply(DocumentPatch::extract(new));
        Ok(true)
    }

    async fn get_document(&self, id: DocumentId) -> AppResult<Document> {
        let mut state = self.lock()?;
        Ok(document_entry(&mut state, id)?.document.clone())
    }

    async fn save_pages(&self, id: DocumentId, pages: Vec<PageInput>) -> AppResult<()> {
        let mut state = self.lock()?;
        let entry = document_entry(&mut state, id)?;
        debug!("文档 {} 保存 {} 页", id, pages.len());
        entry.document.page_count = pages.len();
        entry.pages = pages;
        Ok(())
    }

    async fn list_pages(&self, id: DocumentId) -> AppResult<Vec<PageInput>> {
        let mut state = self.lock()?;
        Ok(document_entry(&mut state, id)?.pages.clone())
    }

    async fn save_original_exam(&self, id: DocumentId, exam: &Exam) -> AppResult<()> {
        let mut state = self.lock()?;
        let entry = document_entry(&mut state, id)?;
        entry.questions = exam.questions();
        entry.exam = Some(exam.clone());
        entry.document.original_exam = Some(exam.metadata.clone());
        entry.document.updated_at = Utc::now();
        Ok(())
    }

    async fn original_exam(&self, id: DocumentId) -> AppResult<Option<Exam>> {
        let mut state = self.lock()?;
        Ok(document_entry(&mut state, id)?.exam.clone())
    }

    async fn list_original_questions(&self, id: DocumentId) -> AppResult<Vec<OriginalQuestion>> {
        let mut state = self.lock()?;
        Ok(document_entry(&mut state, id)?.questions.clone())
    }

    async fn delete_document(&self, id: DocumentId) -> AppResult<()> {
        let mut state = self.lock()?;
        if state.documents.remove(&id).is_none() {
            return Err(StoreError::DocumentNotFound(id.to_string()).into());
        }
        state.jobs.retain(|_, entry| entry.job.kind.document_id() != id);
        Ok(())
    }
}
