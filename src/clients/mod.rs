//! AI 服务商客户端
//!
//! 每个后端都实现 [`ProviderClient`]，对外暴露相同的四个能力：
//! 是否已配置、健康检查、生成、能力描述。客户端只负责"调一次接口"，
//! 重试和解析由上层负责。

use async_trait::async_trait;
use serde_json::json;

use crate::error::ProviderError;
use crate::models::{CallParams, Capabilities, Metadata, ProviderId, RawGenerationResult};

pub mod factory;
pub mod gemini_client;
pub mod mock_client;
pub mod openai_client;

pub use factory::{ClientConstructor, ClientFactory};
pub use gemini_client::GeminiClient;
pub use mock_client::MockClient;
pub use openai_client::OpenAiClient;

/// 服务商客户端约定
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// 所属服务商
    fn provider(&self) -> ProviderId;

    /// 是否已配置（只检查本地凭据，不发请求）
    fn is_configured(&self) -> bool;

    /// 轻量就绪探测，任何内部失败都返回 false
    async fn health_check(&self) -> bool;

    /// 调用模型生成原始文本
    ///
    /// 缺少凭据、服务商明确拒绝等预期内的失败返回 `Ok` 且 `success = false`；
    /// 网络层错误返回 `Err(ProviderError::Transport)`，交给重试执行器处理。
    async fn generate(
        &self,
        prompt: &str,
        params: &CallParams,
    ) -> Result<RawGenerationResult, ProviderError>;

    /// 静态能力描述
    fn capabilities(&self) -> Capabilities;
}

/// 所有客户端共用的基础元数据
pub(crate) fn base_metadata(provider: ProviderId, model: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("ai_provider".to_string(), json!(provider.as_str()));
    metadata.insert("model".to_string(), json!(model));
    metadata.insert(
        "generated_at".to_string(),
        json!(chrono::Local::now().to_rfc3339()),
    );
    metadata
}

/// 读取浮点参数
pub(crate) fn param_f32(params: &CallParams, key: &str) -> Option<f32> {
    params.get(key).and_then(|v| v.as_f64()).map(|v| v as f32)
}

/// 读取正整数参数
pub(crate) fn param_u32(params: &CallParams, key: &str) -> Option<u32> {
    params
        .get(key)
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
        .filter(|v| *v > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_helpers() {
        let mut params = CallParams::new();
        params.insert("temperature".into(), json!(0.25));
        params.insert("max_tokens".into(), json!(512));
        params.insert("bad".into(), json!(-3));
        assert_eq!(param_f32(&params, "temperature"), Some(0.25));
        assert_eq!(param_u32(&params, "max_tokens"), Some(512));
        assert_eq!(param_u32(&params, "bad"), None);
        assert_eq!(param_u32(&params, "missing"), None);
    }
}
