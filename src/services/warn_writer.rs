//! 警告写入服务 - 业务能力层
//!
//! 只负责"写 warn.txt"能力，不关心流程

use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::JobId;

/// 警告写入服务
///
/// 职责：
/// - 将失败的单元追加写入 warn.txt
/// - 一次只写一个单元
pub struct WarnWriter {
    warn_file_path: String,
}

impl WarnWriter {
    /// 创建新的警告写入服务
    pub fn new() -> Self {
        Self {
            warn_file_path: "warn.txt".to_string(),
        }
    }

    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            warn_file_path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.warn_file_path
    }

    /// 写入警告信息
    ///
    /// # 参数
    /// - `job_id`: 作业ID
    /// - `unit_index`: 单元序号
    /// - `reason`: 失败原因
    pub async fn write(&self, job_id: JobId, unit_index: usize, reason: &str) -> AppResult<()> {
        debug!("写入警告: 作业 {} | 单元 {}", job_id, unit_index);

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.warn_file_path)
            .await
            .map_err(|e| AppError::file_write_failed(&self.warn_file_path, e))?;

        let warn_msg = format!(
            "作业 {} | 单元 {} | 原因: {}\n",
            job_id,
            unit_index,
            reason.replace('\n', " ")
        );

        file.write_all(warn_msg.as_bytes())
            .await
            .map_err(|e| AppError::file_write_failed(&self.warn_file_path, e))?;

        Ok(())
    }
}

impl Default for WarnWriter {
    fn default() -> Self {
        Self::new()
    }
}
