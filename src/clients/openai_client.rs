//! OpenAI 兼容客户端
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure、Doubao 等）

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, error, warn};

use crate::clients::{base_metadata, param_f32, param_u32, ProviderClient};
use crate::config::Config;
use crate::error::ProviderError;
use crate::models::{CallParams, Capabilities, ProviderId, RawGenerationResult};

/// OpenAI 客户端
///
/// 职责：
/// - 只负责调一次 Chat Completions 接口
/// - 不做重试，不解析题目
pub struct OpenAiClient {
    client: Option<Client<OpenAIConfig>>,
    model_name: String,
    default_temperature: f32,
}

impl OpenAiClient {
    /// 创建新的 OpenAI 客户端
    ///
    /// 未配置 API Key 时不会创建底层 HTTP 客户端，`is_configured` 返回 false。
    pub fn new(config: &Config) -> Self {
        let client = config.openai_api_key.as_deref().map(|key| {
            let openai_config = OpenAIConfig::new()
                .with_api_key(key)
                .with_api_base(&config.openai_api_base);
            Client::with_config(openai_config)
        });

        Self {
            client,
            model_name: config.openai_model.clone(),
            default_temperature: config.openai_temperature,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn call_api(
        &self,
        client: &Client<OpenAIConfig>,
        prompt: &str,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String, OpenAIError> {
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model_name)
            .messages(vec![ChatCompletionRequestMessage::User(user_msg)])
            .temperature(temperature);
        if let Some(max_tokens) = max_tokens {
            builder.max_tokens(max_tokens);
        }
        let request = builder.build()?;

        let response = client.chat().create(request).await?;

        // 没有 choices 时按空文本处理，由解析器判定
        Ok(response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ProviderClient for OpenAiClient {
    fn provider(&self) -> ProviderId {
        ProviderId::OpenAi
    }

    fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    async fn health_check(&self) -> bool {
        self.is_configured()
    }

    async fn generate(
        &self,
        prompt: &str,
        params: &CallParams,
    ) -> Result<RawGenerationResult, ProviderError> {
        let mut metadata = base_metadata(ProviderId::OpenAi, &self.model_name);

        let Some(client) = &self.client else {
            return Ok(RawGenerationResult::failed(
                "OpenAI API key not configured",
                metadata,
            ));
        };

        let temperature = param_f32(params, "temperature").unwrap_or(self.default_temperature);
        let max_tokens = param_u32(params, "max_tokens");

        debug!(
            "调用 OpenAI API，模型: {}，提示词长度: {} 字符",
            self.model_name,
            prompt.len()
        );

        match self.call_api(client, prompt, temperature, max_tokens).await {
            Ok(text) => {
                debug!("OpenAI API 调用成功，返回 {} 字符", text.len());
                metadata.insert("temperature".to_string(), json!(temperature));
                Ok(RawGenerationResult::ok(text, metadata))
            }
            // 网络层错误交给重试执行器
            Err(OpenAIError::Reqwest(e)) => {
                warn!("OpenAI 网络错误: {}", e);
                Err(ProviderError::Transport(e.to_string()))
            }
            Err(OpenAIError::ApiError(e)) => {
                error!("OpenAI API 错误: {}", e);
                Ok(RawGenerationResult::failed(
                    format!("OpenAI API error: {}", e),
                    metadata,
                ))
            }
            Err(e) => {
                error!("OpenAI 调用异常: {}", e);
                Ok(RawGenerationResult::failed(e.to_string(), metadata))
            }
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            provider: ProviderId::OpenAi,
            model: self.model_name.clone(),
            supports_json: true,
            supports_streaming: false,
            max_tokens: 4096,
        }
    }
}
