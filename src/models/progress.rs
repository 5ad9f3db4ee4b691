use serde::Serialize;

use super::job::{JobId, Status};
use super::unit::UnitRecord;

/// 作业进度快照，供上层随时查询
#[derive(Debug, Clone, Serialize)]
pub struct JobProgress {
    pub job_id: JobId,
    pub status: Status,
    pub completed: usize,
    pub total: usize,
    /// 按 unit_index 排序
    pub units: Vec<UnitRecord>,
    /// 处于 error 的单元序号
    pub failed_units: Vec<usize>,
}

impl JobProgress {
    /// 已完成但有失败单元
    pub fn is_partial(&self) -> bool {
        self.status == Status::Done && !self.failed_units.is_empty()
    }
}
