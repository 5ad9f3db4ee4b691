//! 试卷结构
//!
//! 抽取得到的原卷与生成的新题都使用这里的结构，JSON 与 TOML 通用。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 选择题选项（固定 4 个）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipleChoiceData {
    pub options: [String; 4],
}

/// 判断题子句（固定 4 个）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrueFalseData {
    pub clauses: [String; 4],
}

/// 试卷中的一个元素：说明文字或题目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExamElement {
    Text {
        content: String,
    },
    MultipleChoice {
        content: String,
        data: MultipleChoiceData,
    },
    TrueFalse {
        content: String,
        data: TrueFalseData,
    },
    ShortAnswer {
        content: String,
    },
}

impl ExamElement {
    pub fn content(&self) -> &str {
        match self {
            ExamElement::Text { content }
            | ExamElement::MultipleChoice { content, .. }
            | ExamElement::TrueFalse { content, .. }
            | ExamElement::ShortAnswer { content } => content,
        }
    }

    /// 题型；说明文字没有题型
    pub fn kind(&self) -> Option<QuestionKind> {
        match self {
            ExamElement::Text { .. } => None,
            ExamElement::MultipleChoice { .. } => Some(QuestionKind::MultipleChoice),
            ExamElement::TrueFalse { .. } => Some(QuestionKind::TrueFalse),
            ExamElement::ShortAnswer { .. } => Some(QuestionKind::ShortAnswer),
        }
    }
}

/// 题型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuestionKind::MultipleChoice => "选择题",
            QuestionKind::TrueFalse => "判断题",
            QuestionKind::ShortAnswer => "简答题",
        };
        f.write_str(s)
    }
}

/// 试卷元信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamMetadata {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
}

/// 完整试卷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exam {
    pub metadata: ExamMetadata,
    pub elements: Vec<ExamElement>,
}

impl Exam {
    /// 只取题目（跳过说明文字），ID 为题目在卷中的 0 起序号
    pub fn questions(&self) -> Vec<OriginalQuestion> {
        self.elements
            .iter()
            .filter(|el| el.kind().is_some())
            .enumerate()
            .map(|(i, el)| OriginalQuestion {
                id: i.to_string(),
                element: el.clone(),
            })
            .collect()
    }
}

/// 原卷中的一道题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginalQuestion {
    pub id: String,
    #[serde(flatten)]
    pub element: ExamElement,
}

// ========== 答案 ==========

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipleChoiceAnswer {
    /// 正确选项（0 起）
    #[serde(alias = "selected_options")]
    pub correct_option: usize,
    pub explanation: String,
    /// 每个选项的错因分析
    pub error_analysis: [String; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrueFalseAnswer {
    pub clause_correctness: [bool; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub general_explanation: Option<String>,
    pub explanations: [String; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortAnswerAnswer {
    pub answer_text: String,
    pub explanation: String,
}

/// 带答案的生成题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeneratedQuestion {
    MultipleChoice {
        content: String,
        data: MultipleChoiceData,
        answer: MultipleChoiceAnswer,
    },
    TrueFalse {
        content: String,
        data: TrueFalseData,
        answer: TrueFalseAnswer,
    },
    ShortAnswer {
        content: String,
        answer: ShortAnswerAnswer,
    },
}

impl GeneratedQuestion {
    pub fn kind(&self) -> QuestionKind {
        match self {
            GeneratedQuestion::MultipleChoice { .. } => QuestionKind::MultipleChoice,
            GeneratedQuestion::TrueFalse { .. } => QuestionKind::TrueFalse,
            GeneratedQuestion::ShortAnswer { .. } => QuestionKind::ShortAnswer,
        }
    }
}

/// 生成题 + 原题引用，即生成作业单元的结果内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedElement {
    #[serde(flatten)]
    pub question: GeneratedQuestion,
    pub original_id: String,
}

/// 生成的新试卷（只包含已成功的题目）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedExam {
    pub metadata: ExamMetadata,
    pub elements: Vec<GeneratedElement>,
    /// 生成失败的单元序号
    pub failed_units: Vec<usize>,
}
