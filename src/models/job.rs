//! 作业与状态模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 作业 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 文档 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 处理状态
///
/// 作业、单元、文档的识别/抽取阶段共用同一组状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Processing,
    Done,
    Error,
}

impl Status {
    /// 非终态：pending / processing
    pub const OPEN: [Status; 2] = [Status::Pending, Status::Processing];

    /// 是否已到达终态
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Done | Status::Error)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Pending => "pending",
            Status::Processing => "processing",
            Status::Done => "done",
            Status::Error => "error",
        };
        f.write_str(s)
    }
}

/// 作业类型，决定全部单元到齐后执行什么
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobKind {
    /// 逐页识别
    Ocr { document_id: DocumentId },
    /// 按选中题目生成新试卷
    Generation { document_id: DocumentId },
}

impl JobKind {
    pub fn document_id(&self) -> DocumentId {
        match self {
            JobKind::Ocr { document_id } | JobKind::Generation { document_id } => *document_id,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobKind::Ocr { .. } => "识别",
            JobKind::Generation { .. } => "生成",
        }
    }
}

/// 作业记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    /// 创建时确定，之后不再改变
    pub total_units: usize,
    /// 只通过原子自增修改，单调不减
    pub completed_units: usize,
    pub status: Status,
    /// 完成回调已经成功执行过
    #[serde(default)]
    pub callback_done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// 新建作业；没有单元的作业保持 pending，由创建者显式收尾
    pub fn new(id: JobId, kind: JobKind, total_units: usize) -> Self {
        let now = Utc::now();
        Self {
            id,
            kind,
            total_units,
            completed_units: 0,
            status: if total_units > 0 {
                Status::Processing
            } else {
                Status::Pending
            },
            callback_done: false,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 当前计数；只用于已到齐作业的补救路径，正常推进以原子操作的返回值为准
    pub fn counter(&self) -> CounterState {
        CounterState {
            completed: self.completed_units,
            total: self.total_units,
        }
    }
}

/// 原子自增之后计数器的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterState {
    pub completed: usize,
    pub total: usize,
}

impl CounterState {
    /// 是否已全部到齐；零单元作业永远不算到齐
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed >= self.total
    }
}
