use thiserror::Error;

use crate::models::ProviderId;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 提示词模板错误
    #[error("提示词错误: {0}")]
    Prompt(#[from] PromptError),
    /// 模型服务商调用错误
    #[error("服务商错误: {0}")]
    Provider(#[from] ProviderError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 请求或结果校验错误
    #[error("校验错误: {0}")]
    Validation(#[from] ValidationError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 配置错误
///
/// 一律不可重试：缺少密钥或服务商不受支持时，重试没有意义。
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 不支持的服务商
    #[error("不支持的 AI 服务商: {name}，可用服务商: {available}")]
    UnsupportedProvider { name: String, available: String },
    /// 服务商未正确配置（缺少 API Key 等）
    #[error("{provider} 客户端未正确配置，请检查 API Key 等设置")]
    ProviderNotConfigured { provider: ProviderId },
    /// 客户端构造失败
    #[error("创建 {provider} 客户端失败: {reason}")]
    ClientConstructionFailed { provider: ProviderId, reason: String },
}

/// 提示词模板错误
#[derive(Debug, Error)]
pub enum PromptError {
    /// 基础模板中不存在该模板
    #[error("基础模板中找不到模板 '{key}'")]
    TemplateNotFound { key: String },
    /// 服务商映射后的模板不存在
    #[error("模板 '{key}' 映射到的 '{mapped}' 不存在于基础模板中")]
    MappedTemplateNotFound { key: String, mapped: String },
    /// 模板的 required_fields 缺失或为空
    #[error("模板 '{key}' 的 required_fields 必须是非空列表")]
    RequiredFieldsInvalid { key: String },
    /// 找不到服务商覆盖配置
    #[error("找不到服务商 {provider} 的提示词配置")]
    ProviderConfigNotFound { provider: String },
    /// 服务商覆盖配置不完整
    #[error("服务商 {provider} 的提示词配置无效: {reason}")]
    ProviderConfigInvalid { provider: String, reason: String },
    /// 请求的语言和默认语言都不可用
    #[error("语言 '{requested}' 不可用，默认语言 '{default}' 也不可用")]
    LocaleUnavailable { requested: String, default: String },
}

/// 服务商调用错误
///
/// 只有 `Transport` 会被重试执行器视为可重试。
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// 网络层错误（连接失败、超时、5xx）
    #[error("网络传输错误: {0}")]
    Transport(String),
    /// 服务商明确拒绝（认证、配额等），重试无意义
    #[error("服务商致命错误: {0}")]
    Fatal(String),
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 文件不存在
    #[error("文件不存在: {path}")]
    NotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// JSON 序列化失败
    #[error("JSON序列化失败: {0}")]
    Json(#[from] serde_json::Error),
    /// 目录不存在
    #[error("目录不存在: {path}")]
    DirectoryNotFound { path: String },
}

/// 校验错误
#[derive(Debug, Error)]
pub enum ValidationError {
    /// 请求参数不合法
    #[error("请求参数不合法: {0}")]
    InvalidRequest(String),
    /// 没有解析出任何有效题目
    #[error("no valid questions parsed from AI response")]
    NoValidQuestions,
}

// ========== 从常见错误类型转换 ==========

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::File(FileError::Json(err))
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::File(FileError::TomlParseFailed {
            path: String::new(), // TOML错误通常不包含路径信息
            source: err,
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: err,
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建 TOML 解析错误（带路径）
    pub fn toml_parse_failed(path: impl Into<String>, source: toml::de::Error) -> Self {
        AppError::File(FileError::TomlParseFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建请求校验错误
    pub fn invalid_request(message: impl Into<String>) -> Self {
        AppError::Validation(ValidationError::InvalidRequest(message.into()))
    }

    /// 是否为配置类错误
    pub fn is_config_error(&self) -> bool {
        matches!(self, AppError::Config(_))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_nested_messages() {
        let err: AppError = ConfigError::ProviderNotConfigured {
            provider: ProviderId::OpenAi,
        }
        .into();
        assert!(err.to_string().contains("openai"));
        assert!(err.is_config_error());

        let err: AppError = ValidationError::NoValidQuestions.into();
        assert!(err.to_string().contains("no valid questions parsed"));
    }

    #[test]
    fn test_io_error_converts_to_file_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: AppError = io.into();
        assert!(matches!(err, AppError::File(FileError::ReadFailed { .. })));
    }
}
