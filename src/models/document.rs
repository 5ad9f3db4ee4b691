//! 上传文档

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::exam::ExamMetadata;
use super::job::{DocumentId, JobId, Status};

/// 文档记录
///
/// 识别与抽取两个阶段各有一个状态字段，一起推进。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub filename: String,
    pub page_count: usize,
    pub ocr_status: Status,
    pub extract_status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_job_id: Option<JobId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_exam: Option<ExamMetadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(id: DocumentId, filename: impl Into<String>, page_count: usize) -> Self {
        let now = Utc::now();
        Self {
            id,
            filename: filename.into(),
            page_count,
            ocr_status: Status::Pending,
            extract_status: Status::Pending,
            error: None,
            ocr_job_id: None,
            original_exam: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 合并写入
    pub fn apply(&mut self, patch: DocumentPatch) {
        if let Some(status) = patch.ocr_status {
            self.ocr_status = status;
        }
        if let Some(status) = patch.extract_status {
            self.extract_status = status;
        }
        if let Some(error) = patch.error {
            self.error = Some(error);
        }
        if let Some(job_id) = patch.ocr_job_id {
            self.ocr_job_id = Some(job_id);
        }
        self.updated_at = Utc::now();
    }

    /// 两个阶段是否都已结束（成功或失败）
    pub fn is_settled(&self) -> bool {
        self.ocr_status == Status::Error
            || self.extract_status == Status::Error
            || self.extract_status == Status::Done
    }
}

/// 文档合并补丁
#[derive(Debug, Clone, Default)]
pub struct DocumentPatch {
    pub ocr_status: Option<Status>,
    pub extract_status: Option<Status>,
    pub error: Option<String>,
    pub ocr_job_id: Option<JobId>,
}

impl DocumentPatch {
    pub fn ocr(status: Status) -> Self {
        Self {
            ocr_status: Some(status),
            ..Default::default()
        }
    }

    pub fn extract(status: Status) -> Self {
        Self {
            extract_status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}
