//! 扇出投递 - 编排层
//!
//! 一次调用完成：创建作业记录 → 一次性写入全部 pending 单元 → 每个单元投递一个任务。
//! 每个逻辑作业只应调用一次，请求级别的去重由调用者负责。

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::AppResult;
use crate::infrastructure::{Dispatcher, JobStore, Task, TaskDescriptor};
use crate::models::{JobId, JobKind, Status, UnitInput, UnitRecord};

/// 扇出投递器
#[derive(Clone)]
pub struct FanOutDispatcher {
    store: Arc<dyn JobStore>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl FanOutDispatcher {
    pub fn new(store: Arc<dyn JobStore>, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// 创建作业并扇出
    ///
    /// 单元数为 0 时不投递任何任务，作业停在 pending，需要调用者显式收尾。
    /// 写入单元或投递失败时把作业直接标记为 error，不经过汇总。
    pub async fn start_job(&self, kind: JobKind, units: Vec<UnitInput>) -> AppResult<JobId> {
        let total = units.len();
        let label = kind.label();
        let job_id = self.store.create_job(kind, total).await?;

        if let Err(e) = self
            .store
            .write_units(job_id, (0..total).map(UnitRecord::pending).collect())
            .await
        {
            self.abort(job_id, format!("写入单元失败: {}", e)).await;
            return Err(e);
        }

        if total == 0 {
            warn!("⚠️ {}作业 {} 没有任何单元，不投递任务", label, job_id);
            return Ok(job_id);
        }

        info!("📦 {}作业 {} 创建完成，投递 {} 个单元", label, job_id, total);

        for (unit_index, input) in units.into_iter().enumerate() {
            let task = TaskDescriptor::new(Task::Unit {
                job_id,
                unit_index,
                input,
            });
            if let Err(e) = self.dispatcher.dispatch(task).await {
                self.abort(job_id, format!("投递单元 {} 失败: {}", unit_index, e))
                    .await;
                return Err(e);
            }
        }

        Ok(job_id)
    }

    async fn abort(&self, job_id: JobId, reason: String) {
        error!("❌ 作业 {} 初始化失败: {}", job_id, reason);
        if let Err(e) = self
            .store
            .set_job_status(job_id, Status::Error, Some(reason))
            .await
        {
            error!("❌ 作业 {} 无法标记为失败: {}", job_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::infrastructure::{ChannelDispatcher, InMemoryStore, RecordingDispatcher};
    use crate::models::{DocumentId, PageInput};

    fn pages(n: usize) -> Vec<UnitInput> {
        (1..=n)
            .map(|i| {
                UnitInput::Page(PageInput {
                    page_number: i,
                    file_name: format!("p-{}.png", i),
                    media_type: "image/png".to_string(),
                    bytes: vec![i as u8],
                })
            })
            .collect()
    }

    fn ocr_kind() -> JobKind {
        JobKind::Ocr {
            document_id: DocumentId::new(),
        }
    }

    #[tokio::test]
    async fn test_start_job_writes_all_units_and_dispatches_in_order() {
        let store = Arc::new(InMemoryStore::new());
        let recorder = Arc::new(RecordingDispatcher::new());
        let fan_out = FanOutDispatcher::new(store.clone(), recorder.clone());

        let job_id = fan_out.start_job(ocr_kind(), pages(3)).await.unwrap();

        let job = store.get_job(job_id).await.unwrap();
        assert_eq!(job.total_units, 3);
        assert_eq!(job.completed_units, 0);
        assert_eq!(job.status, Status::Processing);

        let units = store.list_units(job_id).await.unwrap();
        assert_eq!(units.len(), 3);
        assert!(units.iter().all(|u| u.status == Status::Pending));

        let tasks = recorder.take();
        let indices: Vec<usize> = tasks
            .iter()
            .map(|t| match &t.task {
                Task::Unit { unit_index, .. } => *unit_index,
                other => panic!("unexpected task {:?}", other),
            })
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(tasks.iter().all(|t| t.attempt == 1));
    }

    #[tokio::test]
    async fn test_zero_units_dispatches_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let recorder = Arc::new(RecordingDispatcher::new());
        let fan_out = FanOutDispatcher::new(store.clone(), recorder.clone());

        let job_id = fan_out.start_job(ocr_kind(), Vec::new()).await.unwrap();

        assert!(recorder.is_empty());
        assert_eq!(store.get_job(job_id).await.unwrap().status, Status::Pending);
    }

    #[tokio::test]
    async fn test_dispatch_failure_marks_job_error() {
        let store = Arc::new(InMemoryStore::new());
        let (dispatcher, receiver) = ChannelDispatcher::channel();
        drop(receiver);
        let fan_out = FanOutDispatcher::new(store.clone(), Arc::new(dispatcher));

        let kind = ocr_kind();
        let document_id = kind.document_id();
        let result = fan_out.start_job(kind, pages(2)).await;
        assert!(matches!(result, Err(AppError::Dispatch(_))));

        let jobs = store.list_jobs(document_id).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, Status::Error);
        assert!(jobs[0].error.as_deref().unwrap_or_default().contains("单元 0"));
    }
}
