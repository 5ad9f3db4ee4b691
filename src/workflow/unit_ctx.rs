//! 单元处理上下文
//!
//! 封装“我正在处理哪个作业的第几个单元”这一信息

use std::fmt::Display;

use crate::models::JobId;

/// 单元处理上下文
#[derive(Debug, Clone)]
pub struct UnitCtx {
    /// 作业ID
    pub job_id: JobId,

    /// 单元序号（从0开始，持久键）
    pub unit_index: usize,

    /// 第几次投递（仅用于日志显示）
    pub attempt: u32,
}

impl UnitCtx {
    pub fn new(job_id: JobId, unit_index: usize, attempt: u32) -> Self {
        Self {
            job_id,
            unit_index,
            attempt,
        }
    }
}

impl Display for UnitCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let id = self.job_id.to_string();
        write!(f, "[作业 {} 单元 {}]", &id[..8.min(id.len())], self.unit_index)
    }
}
