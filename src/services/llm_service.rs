//! LLM 服务 - 业务能力层
//!
//! 只负责“调用 LLM”能力，不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型（OpenRouter 等兼容 OpenAI API 的服务）
//! - 图片以 base64 data URL 的形式随用户消息发送

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrl,
    },
    Client,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, LlmError};

/// LLM 服务
///
/// 职责：
/// - 提供通用的 LLM 调用接口（文本 + 可选图片）
/// - 把回复解析成 JSON
/// - 不认识作业 / 单元
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config, model_name: &str, temperature: f32, max_tokens: u32) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: model_name.to_string(),
            temperature,
            max_tokens,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    /// - `imgs`: 图片 URL 列表（可选，可以是 data URL），会追加到用户消息中
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（已去除首尾空白）
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
        imgs: Option<&[String]>,
    ) -> AppResult<String> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(build_failed)?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = match imgs {
            Some(img_urls) if !img_urls.is_empty() => {
                let mut content_parts: Vec<ChatCompletionRequestUserMessageContentPart> =
                    Vec::with_capacity(img_urls.len() + 1);

                content_parts.push(ChatCompletionRequestUserMessageContentPart::Text(
                    ChatCompletionRequestMessageContentPartText {
                        text: user_message.to_string(),
                    },
                ));

                for url in img_urls {
                    content_parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                        ChatCompletionRequestMessageContentPartImage {
                            image_url: ImageUrl {
                                url: url.clone(),
                                detail: Some(ImageDetail::High),
                            },
                        },
                    ));
                }

                debug!("使用 Vision API，包含 {} 张图片", img_urls.len());

                ChatCompletionRequestUserMessageArgs::default()
                    .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
                    .build()
                    .map_err(build_failed)?
            }
            _ => ChatCompletionRequestUserMessageArgs::default()
                .content(user_message)
                .build()
                .map_err(build_failed)?,
        };

        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(build_failed)?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            AppError::llm_api_failed(&self.model_name, e)
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyContent {
                model: self.model_name.clone(),
            })?;

        Ok(content.trim().to_string())
    }

    /// 调用 LLM 并把回复解析成指定类型
    pub async fn send_for_json<T: DeserializeOwned>(
        &self,
        user_message: &str,
        system_message: Option<&str>,
    ) -> AppResult<T> {
        let response = self.send_to_llm(user_message, system_message, None).await?;
        parse_json_response(&response)
    }
}

fn build_failed(e: impl std::fmt::Display) -> AppError {
    AppError::Llm(LlmError::RequestBuildFailed(e.to_string()))
}

/// 把图片字节编码为 data URL
pub fn image_data_url(media_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", media_type, STANDARD.encode(bytes))
}

/// 从回复中取出 JSON 主体
///
/// 模型经常用 ```json 代码块包裹输出，或在前后加说明文字。
pub fn extract_json_block(response: &str) -> &str {
    let trimmed = response.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end().trim_end_matches("```").trim())
        .unwrap_or(trimmed);

    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => &unfenced[start..=end],
        _ => unfenced,
    }
}

/// 解析 LLM 的 JSON 回复
pub fn parse_json_response<T: DeserializeOwned>(response: &str) -> AppResult<T> {
    let body = extract_json_block(response);
    serde_json::from_str(body).map_err(|e| {
        warn!("无法解析 LLM 回复: {}", crate::utils::logging::truncate_text(response, 120));
        AppError::Llm(LlmError::JsonParseFailed { source: e })
    })
}
