use std::sync::Arc;

use crate::error::AppResult;
use crate::infrastructure::JobStore;
use crate::models::{CounterState, JobId, Status, UnitPatch};

/// 作业完成计数器
///
/// 只暴露“自增并取值”类的操作：完成判断必须基于同一次原子操作返回的值，
/// 不允许先读再写。
#[derive(Clone)]
pub struct ProgressCounter {
    store: Arc<dyn JobStore>,
}

impl ProgressCounter {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// 已完成数 + 1，返回自增后的 (completed, total)
    ///
    /// 作业不存在时返回 `JobNotFound`；内部不重试。
    pub async fn increment_and_get(&self, job_id: JobId) -> AppResult<CounterState> {
        self.store.increment_completed(job_id).await
    }

    /// 写入单元终态并计数，两者在存储的同一步里生效
    ///
    /// 单元已是终态时返回 None，计数不变。
    pub async fn complete_unit_and_get(
        &self,
        job_id: JobId,
        unit_index: usize,
        patch: UnitPatch,
    ) -> AppResult<Option<CounterState>> {
        self.store
            .complete_unit(job_id, unit_index, &Status::OPEN, patch)
            .await
    }
}
