use anyhow::{Context, Result};
use exam_pipeline::utils::logging;
use exam_pipeline::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    logging::init_log_file(&config.output_log_file).context("无法创建运行日志文件")?;
    logging::init(config.verbose_logging, &config.output_log_file).context("日志初始化失败")?;

    config.validate().context("配置检查未通过")?;

    // 初始化并运行应用
    App::initialize(config)
        .await
        .context("应用初始化失败")?
        .run()
        .await
        .context("流水线运行失败")?;

    Ok(())
}
