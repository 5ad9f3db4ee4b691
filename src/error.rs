//! 错误类型
//!
//! 按来源分类：存储 / LLM / 文件 / 业务 / 配置。
//! 单元计算失败不在这里：它被记录在单元上，不会作为 `Err` 向上传播。

use thiserror::Error;

use crate::models::JobId;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 存储相关错误
    #[error("存储错误: {0}")]
    Store(#[from] StoreError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 业务逻辑错误
    #[error("业务错误: {0}")]
    Business(#[from] BusinessError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 任务投递错误
    #[error("任务投递失败: {0}")]
    Dispatch(String),
}

impl AppError {
    /// 是否应该交给投递层重新投递
    ///
    /// 只有存储暂时不可用才值得重试；作业不存在之类的错误重试也没有意义。
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Store(StoreError::Unavailable { .. }))
    }
}

/// 存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 作业不存在
    #[error("作业不存在: {0}")]
    JobNotFound(JobId),
    /// 单元不存在
    #[error("作业 {job_id} 的单元 {unit_index} 不存在")]
    UnitNotFound { job_id: JobId, unit_index: usize },
    /// 文档不存在
    #[error("文档不存在: {0}")]
    DocumentNotFound(String),
    /// 存储暂时不可用
    #[error("存储不可用: {reason}")]
    Unavailable { reason: String },
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {message}")]
    ApiCallFailed { model: String, message: String },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 返回内容无法解析为 JSON
    #[error("无法解析LLM返回的JSON: {source}")]
    JsonParseFailed {
        #[source]
        source: serde_json::Error,
    },
    /// 请求构建失败
    #[error("LLM请求构建失败: {0}")]
    RequestBuildFailed(String),
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 目录不存在
    #[error("目录不存在: {path}")]
    DirectoryNotFound { path: String },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {message}")]
    TomlParseFailed { path: String, message: String },
}

/// 业务逻辑错误
#[derive(Debug, Error)]
pub enum BusinessError {
    /// 文档没有任何页面
    #[error("文档 {document_id} 没有可识别的页面")]
    NoPages { document_id: String },
    /// 抽取结果中没有任何题目
    #[error("文档 {document_id} 没有抽取到任何题目")]
    NoQuestions { document_id: String },
    /// 没有选中任何有效题目
    #[error("没有选中任何有效题目")]
    NothingSelected,
    /// 目标题目数量为 0
    #[error("目标题目数量必须大于 0")]
    ZeroTargetCount,
    /// 文档尚未完成题目抽取
    #[error("文档 {document_id} 尚未完成题目抽取")]
    NotExtracted { document_id: String },
    /// 作业类型不匹配
    #[error("作业 {job_id} 不是{expected}作业")]
    WrongJobKind { job_id: JobId, expected: &'static str },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 取值非法
    #[error("配置项 {name} 取值非法: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Llm(LlmError::JsonParseFailed { source: err })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建存储不可用错误
    pub fn store_unavailable(reason: impl Into<String>) -> Self {
        AppError::Store(StoreError::Unavailable {
            reason: reason.into(),
        })
    }

    /// 创建 LLM API 调用错误
    pub fn llm_api_failed(model: impl Into<String>, message: impl std::fmt::Display) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            message: message.to_string(),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source,
        })
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
