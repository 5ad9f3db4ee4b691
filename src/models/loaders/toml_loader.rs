use crate::error::{AppError, AppResult, FileError};
use crate::models::exam::Exam;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// 生成请求：从哪些原题出发、生成多少道
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub selected_ids: Vec<String>,
    pub target_count: usize,
}

/// 从 TOML 文件加载生成请求
///
/// 文件不存在时返回 `None`，表示本次运行跳过生成阶段。
pub async fn load_generation_request(path: &Path) -> AppResult<Option<GenerationRequest>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;

    let request: GenerationRequest = toml::from_str(&content).map_err(|e| FileError::TomlParseFailed {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    tracing::info!(
        "成功加载生成请求: 选中 {} 道题，目标 {} 道",
        request.selected_ids.len(),
        request.target_count
    );

    Ok(Some(request))
}

/// 将抽取出的试卷写成 TOML 文件
pub async fn save_exam_toml(path: &Path, exam: &Exam) -> AppResult<()> {
    let content = toml::to_string_pretty(exam).map_err(|e| FileError::TomlParseFailed {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::file_write_failed(parent.display().to_string(), e))?;
    }

    fs::write(path, content)
        .await
        .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;

    Ok(())
}
