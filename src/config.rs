use crate::error::{AppResult, ConfigError};

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 同时执行的单元任务数量（工作池大小）
    pub max_concurrent_units: usize,
    /// 单个任务最多投递次数（含首次）
    pub max_delivery_attempts: u32,
    /// 单个任务超时时间（秒），超时后重新投递
    pub unit_timeout_secs: u64,
    /// 重新投递前的等待时间（毫秒）
    pub redelivery_backoff_ms: u64,
    /// 待识别的页面图片目录
    pub input_folder: String,
    /// 抽取结果与导出文件目录
    pub output_folder: String,
    /// 失败单元记录文件
    pub warn_file_path: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    /// 生成请求文件（TOML），不存在时跳过生成阶段
    pub generation_request_file: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub ocr_model_name: String,
    pub gen_model_name: String,
    pub gen_temperature: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_units: 8,
            max_delivery_attempts: 3,
            unit_timeout_secs: 600,
            redelivery_backoff_ms: 500,
            input_folder: "input_pages".to_string(),
            output_folder: "output_exam".to_string(),
            warn_file_path: "warn.txt".to_string(),
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            generation_request_file: "generate.toml".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://openrouter.ai/api/v1".to_string(),
            ocr_model_name: "google/gemini-2.5-flash".to_string(),
            gen_model_name: "google/gemini-2.5-flash".to_string(),
            gen_temperature: 0.5,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_concurrent_units: std::env::var("MAX_CONCURRENT_UNITS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_units),
            max_delivery_attempts: std::env::var("MAX_DELIVERY_ATTEMPTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_delivery_attempts),
            unit_timeout_secs: std::env::var("UNIT_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.unit_timeout_secs),
            redelivery_backoff_ms: std::env::var("REDELIVERY_BACKOFF_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.redelivery_backoff_ms),
            input_folder: std::env::var("INPUT_FOLDER").unwrap_or(default.input_folder),
            output_folder: std::env::var("OUTPUT_FOLDER").unwrap_or(default.output_folder),
            warn_file_path: std::env::var("WARN_FILE_PATH").unwrap_or(default.warn_file_path),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            generation_request_file: std::env::var("GENERATION_REQUEST_FILE").unwrap_or(default.generation_request_file),
            llm_api_key: std::env::var("OPENROUTER_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            ocr_model_name: std::env::var("OCR_MODEL_NAME").unwrap_or(default.ocr_model_name),
            gen_model_name: std::env::var("GEN_MODEL_NAME").unwrap_or(default.gen_model_name),
            gen_temperature: std::env::var("GEN_TEMPERATURE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.gen_temperature),
        }
    }

    /// 检查配置是否可用
    pub fn validate(&self) -> AppResult<()> {
        if self.max_concurrent_units == 0 {
            return Err(invalid("max_concurrent_units", "必须大于 0"));
        }
        if self.max_delivery_attempts == 0 {
            return Err(invalid("max_delivery_attempts", "必须大于 0"));
        }
        if self.unit_timeout_secs == 0 {
            return Err(invalid("unit_timeout_secs", "必须大于 0"));
        }
        if self.ocr_model_name.trim().is_empty() {
            return Err(invalid("ocr_model_name", "不能为空"));
        }
        if self.gen_model_name.trim().is_empty() {
            return Err(invalid("gen_model_name", "不能为空"));
        }
        Ok(())
    }
}

fn invalid(name: &'static str, reason: &str) -> crate::error::AppError {
    ConfigError::InvalidValue {
        name,
        reason: reason.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_zero_pool_size_rejected() {
        let config = Config {
            max_concurrent_units: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_model_rejected() {
        let config = Config {
            gen_model_name: "  ".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
