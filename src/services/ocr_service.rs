//! 页面识别服务 - 业务能力层
//!
//! 只负责“把一页图片识别成 Markdown”，一次只处理一页

use async_trait::async_trait;
use tracing::debug;

use super::llm_service::{image_data_url, LlmService};
use crate::config::Config;
use crate::error::AppResult;
use crate::models::PageInput;

/// 页面识别能力
#[async_trait]
pub trait PageRecognizer: Send + Sync {
    /// 识别一页，返回该页的 Markdown
    async fn recognize(&self, page: &PageInput) -> AppResult<String>;
}

/// 基于视觉模型的页面识别服务
pub struct OcrService {
    llm: LlmService,
}

impl OcrService {
    pub fn new(config: &Config) -> Self {
        Self {
            llm: LlmService::new(config, &config.ocr_model_name, 0.0, 8192),
        }
    }

    fn build_prompt() -> &'static str {
        r#"把这一页数学试卷转换成 Markdown。

【要求】
- 图形、图片、图表、表格直接忽略，不要尝试用 Markdown 重画
- 行内公式用 `$...$` 包裹，独立公式用 `$$...$$` 包裹，必须是合法的 Markdown 公式
- 只输出这一页的 Markdown 原文，不要任何开场白，也不要用代码块包裹"#
    }
}

#[async_trait]
impl PageRecognizer for OcrService {
    async fn recognize(&self, page: &PageInput) -> AppResult<String> {
        debug!(
            "识别第 {} 页: {} ({} 字节)",
            page.page_number,
            page.file_name,
            page.bytes.len()
        );

        let imgs = [image_data_url(&page.media_type, &page.bytes)];
        let markdown = self
            .llm
            .send_to_llm(Self::build_prompt(), None, Some(&imgs))
            .await?;

        debug!("第 {} 页识别完成，{} 字符", page.page_number, markdown.chars().count());
        Ok(markdown)
    }
}
