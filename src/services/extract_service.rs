//! 题目抽取服务 - 业务能力层
//!
//! 把整份试卷按页排好的 Markdown 合并后交给 LLM，得到结构化的试卷

use async_trait::async_trait;
use tracing::{debug, info};

use super::llm_service::{parse_json_response, LlmService};
use crate::config::Config;
use crate::error::AppResult;
use crate::models::Exam;

/// 页与页之间的分隔符
pub const PAGE_SEPARATOR: &str = "\n\\newpage\n";

/// 识别失败的页在合并文本中的占位行
pub const FAILED_PAGE_MARKER: &str = "% 错误：该页识别失败";

/// 试卷抽取能力
#[async_trait]
pub trait ExamExtractor: Send + Sync {
    /// `pages` 已按页码排好
    async fn extract(&self, pages: &[String]) -> AppResult<Exam>;
}

/// 合并各页文本
pub fn join_pages(pages: &[String]) -> String {
    pages.join(PAGE_SEPARATOR)
}

/// 基于 LLM 的抽取服务
pub struct ExtractService {
    llm: LlmService,
}

impl ExtractService {
    pub fn new(config: &Config) -> Self {
        Self {
            llm: LlmService::new(config, &config.ocr_model_name, 0.0, 16384),
        }
    }

    fn build_prompt(exam_content: &str) -> String {
        format!(
            r#"下面是一份数学试卷逐页识别得到的 Markdown，页与页之间用 \newpage 分隔。
请把它整理成结构化的 JSON。

【输出格式】
{{
  "metadata": {{ "title": "试卷标题", "duration_minutes": 90 }},
  "elements": [
    {{ "type": "text", "content": "大题说明等非题目文字" }},
    {{ "type": "multiple_choice", "content": "题干", "data": {{ "options": ["A", "B", "C", "D"] }} }},
    {{ "type": "true_false", "content": "题干", "data": {{ "clauses": ["a)", "b)", "c)", "d)"] }} }},
    {{ "type": "short_answer", "content": "题干" }}
  ]
}}

【要求】
- 按试卷原有顺序输出全部元素
- 选择题必须恰好 4 个选项，判断题必须恰好 4 个子句，不要带 A. / a) 之类的编号
- 公式保留原有的 `$...$` 写法
- 以 % 开头的行是识别失败的页，直接跳过
- 没有考试时长时省略 duration_minutes
- 只返回 JSON，不要返回其他内容

【试卷内容】
{}"#,
            exam_content
        )
    }
}

#[async_trait]
impl ExamExtractor for ExtractService {
    async fn extract(&self, pages: &[String]) -> AppResult<Exam> {
        let combined = join_pages(pages);
        debug!("抽取试卷结构：{} 页，共 {} 字符", pages.len(), combined.chars().count());

        let response = self
            .llm
            .send_to_llm(&Self::build_prompt(&combined), None, None)
            .await?;
        let exam: Exam = parse_json_response(&response)?;

        info!(
            "✓ 抽取完成: 《{}》，{} 个元素，{} 道题",
            exam.metadata.title,
            exam.elements.len(),
            exam.questions().len()
        );
        Ok(exam)
    }
}
