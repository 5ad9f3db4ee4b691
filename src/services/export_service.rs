//! 导出服务 - 业务能力层
//!
//! 把原卷或生成的新卷渲染成 Markdown 文档

use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::{Exam, ExamElement, ExamMetadata, GeneratedExam, GeneratedQuestion};

const OPTION_LABELS: [char; 4] = ['A', 'B', 'C', 'D'];
const CLAUSE_LABELS: [char; 4] = ['a', 'b', 'c', 'd'];

/// Markdown 导出服务
#[derive(Debug, Default, Clone)]
pub struct ExportService;

impl ExportService {
    pub fn new() -> Self {
        Self
    }

    /// 渲染原卷（不带答案）
    pub fn render_exam(&self, exam: &Exam) -> String {
        let mut out = header(&exam.metadata);
        let mut number = 1;

        for element in &exam.elements {
            match element {
                ExamElement::Text { content } => {
                    let _ = writeln!(out, "{}\n", content);
                }
                ExamElement::MultipleChoice { content, data } => {
                    question_line(&mut out, number, content);
                    options(&mut out, &data.options);
                    number += 1;
                }
                ExamElement::TrueFalse { content, data } => {
                    question_line(&mut out, number, content);
                    clauses(&mut out, &data.clauses);
                    number += 1;
                }
                ExamElement::ShortAnswer { content } => {
                    question_line(&mut out, number, content);
                    number += 1;
                }
            }
        }

        out
    }

    /// 渲染生成的新卷（带答案与解析）
    pub fn render_generated(&self, exam: &GeneratedExam) -> String {
        let mut out = header(&exam.metadata);

        for (i, element) in exam.elements.iter().enumerate() {
            let number = i + 1;
            match &element.question {
                GeneratedQuestion::MultipleChoice {
                    content,
                    data,
                    answer,
                } => {
                    question_line(&mut out, number, content);
                    options(&mut out, &data.options);
                    let correct = OPTION_LABELS
                        .get(answer.correct_option)
                        .copied()
                        .unwrap_or('?');
                    let _ = writeln!(out, "**答案：** {}\n", correct);
                    let _ = writeln!(out, "**解析：** {}\n", answer.explanation);
                    let _ = writeln!(out, "**其他选项错因：**\n");
                    for (j, analysis) in answer.error_analysis.iter().enumerate() {
                        if j != answer.correct_option {
                            let _ = writeln!(out, "- **{}.** {}", OPTION_LABELS[j], analysis);
                        }
                    }
                    out.push('\n');
                }
                GeneratedQuestion::TrueFalse {
                    content,
                    data,
                    answer,
                } => {
                    question_line(&mut out, number, content);
                    clauses(&mut out, &data.clauses);
                    let verdicts: Vec<&str> = answer
                        .clause_correctness
                        .iter()
                        .map(|&ok| if ok { "正确" } else { "错误" })
                        .collect();
                    let _ = writeln!(out, "**答案：** {}\n", verdicts.join("，"));
                    if let Some(general) = &answer.general_explanation {
                        let _ = writeln!(out, "**解析：** {}\n", general);
                    }
                    let _ = writeln!(out, "**逐条说明：**\n");
                    for (j, explanation) in answer.explanations.iter().enumerate() {
                        let _ = writeln!(out, "- {}) {}", CLAUSE_LABELS[j], explanation);
                    }
                    out.push('\n');
                }
                GeneratedQuestion::ShortAnswer { content, answer } => {
                    question_line(&mut out, number, content);
                    let _ = writeln!(out, "**答案：** {}\n", answer.answer_text);
                    let _ = writeln!(out, "**解析：** {}\n", answer.explanation);
                }
            }
        }

        if !exam.failed_units.is_empty() {
            let _ = writeln!(
                out,
                "> 注意：有 {} 道题生成失败，未收录（单元 {:?}）",
                exam.failed_units.len(),
                exam.failed_units
            );
        }

        out
    }

    /// 写出 Markdown 文件
    pub async fn save_markdown(&self, path: &Path, markdown: &str) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::file_write_failed(parent.display().to_string(), e))?;
        }
        tokio::fs::write(path, markdown)
            .await
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;
        info!("✓ 已导出: {}", path.display());
        Ok(())
    }
}

fn header(metadata: &ExamMetadata) -> String {
    let mut out = format!("# {}\n\n", metadata.title);
    if let Some(minutes) = metadata.duration_minutes {
        let _ = writeln!(out, "考试时间：{} 分钟\n", minutes);
    }
    out
}

fn question_line(out: &mut String, number: usize, content: &str) {
    let _ = writeln!(out, "**第 {} 题** {}\n", number, content);
}

fn options(out: &mut String, items: &[String; 4]) {
    for (label, item) in OPTION_LABELS.iter().zip(items) {
        let _ = writeln!(out, "- {}. {}", label, item);
    }
    out.push('\n');
}

fn clauses(out: &mut String, items: &[String; 4]) {
    for (label, item) in CLAUSE_LABELS.iter().zip(items) {
        let _ = writeln!(out, "- {}) {}", label, item);
    }
    out.push('\n');
}
