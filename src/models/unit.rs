//! 单元模型：一页，或一道选中的题目

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::exam::{ExamElement, QuestionKind};
use super::job::Status;

/// 单个单元的处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum UnitResult {
    /// 成功，携带结果内容
    Success(JsonValue),
    /// 失败，携带错误信息
    Failure(String),
}

impl UnitResult {
    /// 该结果对应的单元终态
    pub fn status(&self) -> Status {
        match self {
            UnitResult::Success(_) => Status::Done,
            UnitResult::Failure(_) => Status::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UnitResult::Success(_))
    }

    /// 转换成写入单元槽位的字段
    pub fn into_patch(self) -> UnitPatch {
        match self {
            UnitResult::Success(payload) => UnitPatch {
                status: Some(Status::Done),
                payload: Some(payload),
                error: None,
            },
            UnitResult::Failure(error) => UnitPatch {
                status: Some(Status::Error),
                payload: None,
                error: Some(error),
            },
        }
    }
}

impl<E: std::fmt::Display> From<Result<JsonValue, E>> for UnitResult {
    fn from(result: Result<JsonValue, E>) -> Self {
        match result {
            Ok(payload) => UnitResult::Success(payload),
            Err(e) => UnitResult::Failure(e.to_string()),
        }
    }
}

/// 单元槽位
///
/// `unit_index` 是持久键，创建时按输入顺序分配，之后不再复用。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitRecord {
    pub unit_index: usize,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 观察到的工作者调用次数
    pub attempts: u32,
    pub updated_at: DateTime<Utc>,
}

impl UnitRecord {
    pub fn pending(unit_index: usize) -> Self {
        Self {
            unit_index,
            status: Status::Pending,
            payload: None,
            error: None,
            attempts: 0,
            updated_at: Utc::now(),
        }
    }

    /// 合并写入：只覆盖补丁里给出的字段
    pub fn apply(&mut self, patch: UnitPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(payload) = patch.payload {
            self.payload = Some(payload);
        }
        if let Some(error) = patch.error {
            self.error = Some(error);
        }
        self.updated_at = Utc::now();
    }
}

/// 单元合并补丁
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitPatch {
    pub status: Option<Status>,
    pub payload: Option<JsonValue>,
    pub error: Option<String>,
}

impl UnitPatch {
    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// 一页待识别的图片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInput {
    /// 页码，从 1 开始，只用于日志
    pub page_number: usize,
    pub file_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// 一道待生成的题目
///
/// 题型在创建单元时就确定下来，工作者不再检查原题结构。
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationUnit {
    /// 原题 ID（原题在试卷中的序号）
    pub source_id: String,
    pub kind: QuestionKind,
    pub question: ExamElement,
}

/// 单元输入
#[derive(Debug, Clone, PartialEq)]
pub enum UnitInput {
    Page(PageInput),
    Question(GenerationUnit),
}

impl UnitInput {
    pub fn describe(&self) -> String {
        match self {
            UnitInput::Page(page) => format!("第 {} 页 ({})", page.page_number, page.file_name),
            UnitInput::Question(unit) => format!("原题 #{} [{}]", unit.source_id, unit.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failure_patch_keeps_existing_payload() {
        let mut record = UnitRecord::pending(0);
        record.apply(UnitResult::Success(json!({"a": 1})).into_patch());
        assert_eq!(record.status, Status::Done);

        record.apply(UnitResult::Failure("boom".to_string()).into_patch());
        assert_eq!(record.status, Status::Error);
        assert_eq!(record.payload, Some(json!({"a": 1})));
        assert_eq!(record.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_from_result() {
        let ok: Result<JsonValue, String> = Ok(json!(1));
        assert!(UnitResult::from(ok).is_success());
        let err: Result<JsonValue, String> = Err("x".into());
        assert_eq!(UnitResult::from(err).status(), Status::Error);
    }
}
