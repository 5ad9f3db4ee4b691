//! 新题生成服务 - 业务能力层
//!
//! 以一道原题为样例生成一道同题型的新题（附答案）。
//! 题型在单元创建时已经确定，这里按题型选择提示词和回复结构。

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::llm_service::{parse_json_response, LlmService};
use crate::config::Config;
use crate::error::AppResult;
use crate::models::{
    GeneratedQuestion, GenerationUnit, MultipleChoiceAnswer, MultipleChoiceData, QuestionKind,
    ShortAnswerAnswer, TrueFalseAnswer, TrueFalseData,
};

/// 新题生成能力
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn generate(&self, unit: &GenerationUnit) -> AppResult<GeneratedQuestion>;
}

// ========== LLM 回复结构（不带 type 标签） ==========

#[derive(Debug, Deserialize)]
struct MultipleChoiceReply {
    content: String,
    data: MultipleChoiceData,
    answer: MultipleChoiceAnswer,
}

#[derive(Debug, Deserialize)]
struct TrueFalseReply {
    content: String,
    data: TrueFalseData,
    answer: TrueFalseAnswer,
}

#[derive(Debug, Deserialize)]
struct ShortAnswerReply {
    content: String,
    answer: ShortAnswerAnswer,
}

/// 按题型解析 LLM 回复
///
/// 回复结构由题型决定，解析成功即保证生成题与原题题型一致。
pub fn parse_generated(kind: QuestionKind, response: &str) -> AppResult<GeneratedQuestion> {
    let question = match kind {
        QuestionKind::MultipleChoice => {
            let reply: MultipleChoiceReply = parse_json_response(response)?;
            GeneratedQuestion::MultipleChoice {
                content: reply.content,
                data: reply.data,
                answer: reply.answer,
            }
        }
        QuestionKind::TrueFalse => {
            let reply: TrueFalseReply = parse_json_response(response)?;
            GeneratedQuestion::TrueFalse {
                content: reply.content,
                data: reply.data,
                answer: reply.answer,
            }
        }
        QuestionKind::ShortAnswer => {
            let reply: ShortAnswerReply = parse_json_response(response)?;
            GeneratedQuestion::ShortAnswer {
                content: reply.content,
                answer: reply.answer,
            }
        }
    };
    Ok(question)
}

fn format_instructions(kind: QuestionKind) -> &'static str {
    match kind {
        QuestionKind::MultipleChoice => {
            r#"{
  "content": "新题题干",
  "data": { "options": ["选项A", "选项B", "选项C", "选项D"] },
  "answer": {
    "correct_option": 0,
    "explanation": "完整解答过程",
    "error_analysis": ["选项A分析", "选项B分析", "选项C分析", "选项D分析"]
  }
}"#
        }
        QuestionKind::TrueFalse => {
            r#"{
  "content": "新题题干",
  "data": { "clauses": ["子句a", "子句b", "子句c", "子句d"] },
  "answer": {
    "clause_correctness": [true, false, true, false],
    "general_explanation": "总体思路（可省略）",
    "explanations": ["子句a解析", "子句b解析", "子句c解析", "子句d解析"]
  }
}"#
        }
        QuestionKind::ShortAnswer => {
            r#"{
  "content": "新题题干",
  "answer": { "answer_text": "最终答案", "explanation": "完整解答过程" }
}"#
        }
    }
}

fn kind_rules(kind: QuestionKind) -> &'static str {
    match kind {
        QuestionKind::MultipleChoice => {
            "- 恰好 4 个选项，只有一个正确，correct_option 为正确选项的序号（0 起）\n- error_analysis 逐个说明每个选项为什么对或错"
        }
        QuestionKind::TrueFalse => {
            "- 恰好 4 个子句，clause_correctness 与子句一一对应\n- explanations 逐个说明每个子句的判断依据"
        }
        QuestionKind::ShortAnswer => "- answer_text 只写最终结果，推导过程写在 explanation 中",
    }
}

/// 基于 LLM 的生成服务
pub struct GenerationService {
    llm: LlmService,
}

impl GenerationService {
    pub fn new(config: &Config) -> Self {
        Self {
            llm: LlmService::new(config, &config.gen_model_name, config.gen_temperature, 4096),
        }
    }

    fn build_prompt(unit: &GenerationUnit, example_json: &str) -> String {
        format!(
            r#"你是一名数学老师，需要参照下面的样例题出一道新的{kind}。

【样例题】
{example}

【要求】
- 新题考查的知识点和难度与样例题一致，但数据和情境要换掉
- 公式使用 `$...$` 写法
{rules}

【输出格式】
只返回如下结构的 JSON，不要返回其他内容：
{format}"#,
            kind = unit.kind,
            example = example_json,
            rules = kind_rules(unit.kind),
            format = format_instructions(unit.kind),
        )
    }
}

#[async_trait]
impl QuestionGenerator for GenerationService {
    async fn generate(&self, unit: &GenerationUnit) -> AppResult<GeneratedQuestion> {
        debug!("生成新题：原题 #{} [{}]", unit.source_id, unit.kind);

        let example_json = serde_json::to_string_pretty(&unit.question)?;
        let response = self
            .llm
            .send_to_llm(&Self::build_prompt(unit, &example_json), None, None)
            .await?;

        parse_generated(unit.kind, &response)
    }
}
