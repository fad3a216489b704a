/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 同时处理的出题任务数量
    pub max_concurrent_jobs: usize,
    /// 任务 TOML 文件存放目录
    pub jobs_folder: String,
    /// 结果 JSON 输出目录
    pub output_folder: String,
    /// 提示词模板目录，为空时使用内置模板
    pub prompts_dir: Option<String>,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    /// 默认服务商（任务未指定时使用）
    pub default_provider: Option<String>,
    /// 默认语言（任务未指定时使用）
    pub default_locale: String,
    /// HTTP 请求超时（秒）
    pub http_timeout_secs: u64,
    // --- OpenAI 配置 ---
    pub openai_api_key: Option<String>,
    pub openai_api_base: String,
    pub openai_model: String,
    pub openai_temperature: f32,
    // --- Gemini 配置 ---
    pub gemini_api_key: Option<String>,
    pub gemini_api_base: String,
    pub gemini_model: String,
    pub gemini_temperature: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            jobs_folder: "jobs".to_string(),
            output_folder: "output".to_string(),
            prompts_dir: None,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            default_provider: None,
            default_locale: "en".to_string(),
            http_timeout_secs: 120,
            openai_api_key: None,
            openai_api_base: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            openai_temperature: 0.3,
            gemini_api_key: None,
            gemini_api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            gemini_model: "gemini-2.0-flash-exp".to_string(),
            gemini_temperature: 0.1,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_concurrent_jobs: std::env::var("MAX_CONCURRENT_JOBS").ok().and_then(|v| v.parse().ok()).filter(|n| *n > 0).unwrap_or(default.max_concurrent_jobs),
            jobs_folder: std::env::var("JOBS_FOLDER").unwrap_or(default.jobs_folder),
            output_folder: std::env::var("OUTPUT_FOLDER").unwrap_or(default.output_folder),
            prompts_dir: non_empty_env("PROMPTS_DIR").or(default.prompts_dir),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            default_provider: non_empty_env("DEFAULT_AI_PROVIDER").or(default.default_provider),
            default_locale: std::env::var("DEFAULT_LOCALE").unwrap_or(default.default_locale),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.http_timeout_secs),
            openai_api_key: non_empty_env("OPENAI_API_KEY").or(default.openai_api_key),
            openai_api_base: std::env::var("OPENAI_API_BASE").unwrap_or(default.openai_api_base),
            openai_model: std::env::var("OPENAI_MODEL").unwrap_or(default.openai_model),
            openai_temperature: std::env::var("OPENAI_TEMPERATURE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.openai_temperature),
            gemini_api_key: non_empty_env("GEMINI_API_KEY").or(default.gemini_api_key),
            gemini_api_base: std::env::var("GEMINI_API_BASE").unwrap_or(default.gemini_api_base),
            gemini_model: std::env::var("GEMINI_MODEL").unwrap_or(default.gemini_model),
            gemini_temperature: std::env::var("GEMINI_TEMPERATURE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.gemini_temperature),
        }
    }
}

/// 读取环境变量，空字符串视为未设置
fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
