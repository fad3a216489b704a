use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{CanonicalQuestion, ProviderId};

/// 元数据（任意 JSON 键值）
pub type Metadata = Map<String, Value>;

/// 调用参数（temperature、max_tokens 等）
pub type CallParams = Map<String, Value>;

/// 服务商单次调用的原始结果
///
/// 由客户端产生，立即交给解析器，之后丢弃。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawGenerationResult {
    pub success: bool,
    pub raw_response: String,
    pub metadata: Metadata,
    pub error: Option<String>,
}

impl RawGenerationResult {
    pub fn ok(raw_response: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            success: true,
            raw_response: raw_response.into(),
            metadata,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            success: false,
            raw_response: String::new(),
            metadata,
            error: Some(error.into()),
        }
    }
}

/// 编排服务对外返回的统一结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub success: bool,
    pub questions: Vec<CanonicalQuestion>,
    pub metadata: Metadata,
    pub error: Option<String>,
}

impl GenerationResult {
    pub fn succeeded(questions: Vec<CanonicalQuestion>, metadata: Metadata) -> Self {
        Self {
            success: true,
            questions,
            metadata,
            error: None,
        }
    }

    /// 失败结果：题目列表一定为空
    pub fn failed(error: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            success: false,
            questions: Vec::new(),
            metadata,
            error: Some(error.into()),
        }
    }
}

/// 服务商能力描述（静态信息）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    pub provider: ProviderId,
    pub model: String,
    pub supports_json: bool,
    pub supports_streaming: bool,
    pub max_tokens: u32,
}

/// 客户端可用状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Available,
    ConfiguredButUnhealthy,
    NotConfigured,
    Error,
}

impl std::fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ClientStatus::Available => "available",
            ClientStatus::ConfiguredButUnhealthy => "configured_but_unhealthy",
            ClientStatus::NotConfigured => "not_configured",
            ClientStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// 单个服务商的健康检查记录，按需生成，不持久化
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientHealthRecord {
    pub provider: ProviderId,
    pub is_configured: bool,
    pub is_healthy: bool,
    pub status: ClientStatus,
    pub capabilities: Option<Capabilities>,
    pub error: Option<String>,
}

impl ClientHealthRecord {
    pub fn new(provider: ProviderId) -> Self {
        Self {
            provider,
            is_configured: false,
            is_healthy: false,
            status: ClientStatus::Error,
            capabilities: None,
            error: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == ClientStatus::Available
    }
}
