//! Gemini 客户端
//!
//! 直接调用 `models/{model}:generateContent` REST 接口。

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::clients::{base_metadata, param_f32, param_u32, ProviderClient};
use crate::config::Config;
use crate::error::ProviderError;
use crate::models::{CallParams, Capabilities, ProviderId, RawGenerationResult};

/// 密钥放在请求头里，URL 会出现在错误信息和日志中
const API_KEY_HEADER: &str = "x-goog-api-key";

// ========== 请求/响应结构 ==========

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

impl GenerateContentResponse {
    /// 拼接第一个候选的全部文本片段
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect::<String>())
            .unwrap_or_default()
    }
}

/// Gemini 客户端
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    api_base: String,
    model_name: String,
    default_temperature: f32,
}

impl GeminiClient {
    /// 创建新的 Gemini 客户端
    pub fn new(config: &Config) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| ProviderError::Fatal(format!("无法创建 HTTP 客户端: {}", e)))?;

        Ok(Self {
            http,
            api_key: config.gemini_api_key.clone(),
            api_base: config.gemini_api_base.trim_end_matches('/').to_string(),
            model_name: config.gemini_model.clone(),
            default_temperature: config.gemini_temperature,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model_name)
    }
}

/// 5xx 与 408/429 视为暂时性错误，其余 4xx 视为服务商明确拒绝
fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

#[async_trait]
impl ProviderClient for GeminiClient {
    fn provider(&self) -> ProviderId {
        ProviderId::Gemini
    }

    fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    async fn health_check(&self) -> bool {
        self.is_configured()
    }

    async fn generate(
        &self,
        prompt: &str,
        params: &CallParams,
    ) -> Result<RawGenerationResult, ProviderError> {
        let mut metadata = base_metadata(ProviderId::Gemini, &self.model_name);

        let Some(api_key) = self.api_key.as_deref().filter(|k| !k.is_empty()) else {
            return Ok(RawGenerationResult::failed(
                "Gemini API key not configured",
                metadata,
            ));
        };

        let temperature = param_f32(params, "temperature").unwrap_or(self.default_temperature);
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature,
                max_output_tokens: param_u32(params, "max_tokens"),
            },
        };

        debug!(
            "调用 Gemini API，模型: {}，提示词长度: {} 字符",
            self.model_name,
            prompt.len()
        );

        let response = self
            .http
            .post(self.endpoint())
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                warn!("Gemini 网络错误: {}", e);
                ProviderError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if is_transient_status(status) {
                warn!("Gemini 暂时不可用 (HTTP {}): {}", status, text);
                return Err(ProviderError::Transport(format!("HTTP {}: {}", status, text)));
            }
            error!("Gemini API 错误 (HTTP {}): {}", status, text);
            return Ok(RawGenerationResult::failed(
                format!("Gemini API error: HTTP {}: {}", status, text),
                metadata,
            ));
        }

        let parsed: GenerateContentResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                let e = e.without_url();
                error!("Gemini 响应解析失败: {}", e);
                return Ok(RawGenerationResult::failed(
                    format!("Gemini response decode error: {}", e),
                    metadata,
                ));
            }
        };

        let text = parsed.text();
        debug!("Gemini API 调用成功，返回 {} 字符", text.len());
        metadata.insert("temperature".to_string(), json!(temperature));
        Ok(RawGenerationResult::ok(text, metadata))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            provider: ProviderId::Gemini,
            model: self.model_name.clone(),
            supports_json: true,
            supports_streaming: false,
            max_tokens: 8192,
        }
    }
}
