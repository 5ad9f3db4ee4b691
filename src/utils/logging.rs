/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fs::{self, OpenOptions};
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::PoolStatsSnapshot;

/// 初始化日志：终端输出 + 追加写入运行日志文件
///
/// `RUST_LOG` 优先；未设置时按 `verbose` 选择 debug 或 info。
/// 重复初始化（例如测试中）会被忽略。
pub fn init(verbose: bool, log_file_path: &str) -> AppResult<()> {
    let default_filter = if verbose {
        "exam_pipeline=debug,info"
    } else {
        "info"
    };

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .map_err(|e| AppError::file_write_failed(log_file_path, e))?;

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        )
        .try_init();

    Ok(())
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> AppResult<()> {
    let log_header = format!(
        "{}\n试卷流水线日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header).map_err(|e| AppError::file_write_failed(log_file_path, e))?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 试卷识别与出题流水线");
    info!("📊 最大并发单元数: {}", config.max_concurrent_units);
    info!(
        "⏱️ 单元超时: {} 秒，最多投递 {} 次",
        config.unit_timeout_secs, config.max_delivery_attempts
    );
    info!("🤖 识别模型: {} | 出题模型: {}", config.ocr_model_name, config.gen_model_name);
    info!("{}", "=".repeat(60));
}

/// 记录阶段开始
pub fn log_stage_start(stage: &str, detail: &str) {
    info!("\n{}", "─".repeat(60));
    info!("📦 {} - {}", stage, detail);
    info!("{}", "─".repeat(60));
}

/// 一次运行的汇总
#[derive(Debug, Default)]
pub struct RunSummary {
    pub pages: usize,
    pub failed_pages: usize,
    pub questions: usize,
    pub generated: usize,
    pub failed_generations: usize,
}

/// 打印最终统计信息
///
/// # 参数
/// - `summary`: 本次运行的汇总
/// - `pool`: 工作池统计
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(summary: &RunSummary, pool: &PoolStatsSnapshot, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!(
        "📄 识别: 成功 {}/{} 页",
        summary.pages - summary.failed_pages,
        summary.pages
    );
    info!("📝 抽取: {} 道题", summary.questions);
    info!(
        "✨ 生成: 成功 {} 道，失败 {} 道",
        summary.generated, summary.failed_generations
    );
    info!(
        "⚙️ 任务: 执行 {} 次，重投 {} 次，放弃 {} 个",
        pool.executed, pool.redelivered, pool.abandoned
    );
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
