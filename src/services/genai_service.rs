//! 出题编排服务 - 业务能力层
//!
//! 只负责"把一次出题请求变成规范化题目"，流程固定：
//!
//! ```text
//! 校验请求 → 渲染提示词 → 获取客户端 → 带重试调用 → 解析 → 规范化 → 补充元数据
//! ```
//!
//! 任何一步失败都会变成 `success = false` 的结果，`generate` 本身不返回错误。

use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::clients::ClientFactory;
use crate::error::{AppError, AppResult, ValidationError};
use crate::models::{
    CallParams, GenerationRequest, GenerationResult, Metadata, ProviderId, RawGenerationResult,
};
use crate::prompts::{PromptRenderer, RenderedPrompt, EXAM_GENERATION_TEMPLATE};
use crate::services::response_parser::{normalize_with_report, parse_json_response};
use crate::services::retry::{retry_with_backoff, RetryPolicy};

/// 出题编排服务
///
/// 职责：
/// - 串起渲染、调用、重试、解析四个能力
/// - 不持有任何可变状态，客户端缓存由 [`ClientFactory`] 负责
pub struct GenAiService {
    factory: Arc<ClientFactory>,
    renderer: Arc<PromptRenderer>,
    policies: HashMap<ProviderId, RetryPolicy>,
}

impl GenAiService {
    /// 创建服务，重试策略取各服务商的默认值
    pub fn new(factory: Arc<ClientFactory>, renderer: Arc<PromptRenderer>) -> Self {
        let policies = ProviderId::ALL
            .iter()
            .map(|p| (*p, RetryPolicy::for_provider(*p)))
            .collect();
        Self {
            factory,
            renderer,
            policies,
        }
    }

    /// 覆盖某个服务商的重试策略
    pub fn with_retry_policy(mut self, provider: ProviderId, policy: RetryPolicy) -> Self {
        self.policies.insert(provider, policy);
        self
    }

    pub fn factory(&self) -> &Arc<ClientFactory> {
        &self.factory
    }

    pub fn retry_policy(&self, provider: ProviderId) -> RetryPolicy {
        self.policies
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| RetryPolicy::for_provider(provider))
    }

    /// 生成题目
    pub async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        let mut metadata = request_metadata(request);
        let attempts = AtomicU32::new(0);

        let outcome = self.run(request, &attempts, &mut metadata).await;
        metadata.insert(
            "attempts".to_string(),
            json!(attempts.load(Ordering::SeqCst)),
        );

        match outcome {
            Ok(mut result) => {
                for (key, value) in metadata {
                    result.metadata.entry(key).or_insert(value);
                }
                result
            }
            Err(e) => {
                error!("[{}] 出题失败: {}", request.provider, e);
                GenerationResult::failed(failure_message(&e), metadata)
            }
        }
    }

    async fn run(
        &self,
        request: &GenerationRequest,
        attempts: &AtomicU32,
        metadata: &mut Metadata,
    ) -> AppResult<GenerationResult> {
        request.validate()?;
        let provider = request.provider;

        let rendered = self.render_prompt(request)?;
        debug!(
            "[{}] 提示词渲染完成，语言: {}，长度: {} 字符",
            provider,
            rendered.provider_config.resolved_locale,
            rendered.prompt.len()
        );

        let client = self.factory.create_client(provider, true)?;
        let params = call_params(&rendered, request);
        let policy = self.retry_policy(provider);
        let context = format!("{} generate", provider);

        let prompt = rendered.prompt.as_str();
        let params_ref = &params;
        let client_ref = &client;
        let raw: RawGenerationResult = retry_with_backoff(&policy, &context, move || async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            client_ref.generate(prompt, params_ref).await
        })
        .await
        .map_err(|e| AppError::Other(e.to_string()))?;

        // 客户端元数据优先于请求元数据
        for (key, value) in raw.metadata.iter() {
            metadata.insert(key.clone(), value.clone());
        }

        if !raw.success {
            let message = raw
                .error
                .unwrap_or_else(|| "provider reported failure".to_string());
            warn!("[{}] 服务商返回失败: {}", provider, message);
            return Ok(GenerationResult::failed(message, std::mem::take(metadata)));
        }

        let items = parse_json_response(&raw.raw_response);
        let report = normalize_with_report(&items, provider.as_str());
        if report.questions.is_empty() {
            metadata.insert("dropped_questions".to_string(), json!(report.dropped));
            return Err(ValidationError::NoValidQuestions.into());
        }

        if report.questions.len() != request.question_count as usize {
            warn!(
                "[{}] 请求 {} 道题，实际得到 {} 道",
                provider,
                request.question_count,
                report.questions.len()
            );
        }

        metadata.insert(
            "total_questions".to_string(),
            json!(report.questions.len()),
        );
        metadata.insert(
            "answer_fallbacks".to_string(),
            json!(report.answer_fallbacks),
        );
        metadata.insert("dropped_questions".to_string(), json!(report.dropped));
        metadata.insert(
            "generated_at".to_string(),
            json!(chrono::Local::now().to_rfc3339()),
        );

        info!(
            "[{}] ✓ 成功生成 {} 道题",
            provider,
            report.questions.len()
        );
        Ok(GenerationResult::succeeded(
            report.questions,
            std::mem::take(metadata),
        ))
    }

    fn render_prompt(&self, request: &GenerationRequest) -> AppResult<RenderedPrompt> {
        let mut variables = Metadata::new();
        variables.insert("content".to_string(), json!(request.content));
        variables.insert("question_count".to_string(), json!(request.question_count));
        variables.insert(
            "difficulty".to_string(),
            json!(request.difficulty.as_str()),
        );
        if let Some(subject) = &request.subject {
            variables.insert("subject".to_string(), json!(subject));
        }

        self.renderer.render(
            EXAM_GENERATION_TEMPLATE,
            request.provider,
            &request.locale,
            &variables,
        )
    }
}

/// 调用参数：服务商配置的参数，被请求中的覆盖值替换，并带上题目数量
fn call_params(rendered: &RenderedPrompt, request: &GenerationRequest) -> CallParams {
    let mut params = rendered.provider_config.params.clone();
    if let Some(temperature) = request.temperature {
        params.insert("temperature".to_string(), json!(temperature));
    }
    if let Some(max_tokens) = request.max_tokens {
        params.insert("max_tokens".to_string(), json!(max_tokens));
    }
    params.insert("question_count".to_string(), json!(request.question_count));
    params
}

fn request_metadata(request: &GenerationRequest) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(
        "requested_provider".to_string(),
        json!(request.provider.as_str()),
    );
    metadata.insert(
        "requested_questions".to_string(),
        json!(request.question_count),
    );
    metadata.insert("subject".to_string(), json!(request.subject));
    metadata
}

/// 失败结果里的错误信息
fn failure_message(err: &AppError) -> String {
    match err {
        AppError::Validation(ValidationError::NoValidQuestions) => {
            ValidationError::NoValidQuestions.to_string()
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn service() -> GenAiService {
        let factory = Arc::new(ClientFactory::new(Config::default()));
        let renderer = Arc::new(PromptRenderer::builtin().unwrap());
        GenAiService::new(factory, renderer)
    }

    #[tokio::test]
    async fn test_mock_generation_succeeds() {
        let request = GenerationRequest::new("Photosynthesis converts light.", 3, ProviderId::Mock)
            .with_subject("biology");
        let result = service().generate(&request).await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.questions.len(), 3);
        assert_eq!(result.metadata["requested_provider"], "mock");
        assert_eq!(result.metadata["requested_questions"], 3);
        assert_eq!(result.metadata["total_questions"], 3);
        assert_eq!(result.metadata["subject"], "biology");
        assert_eq!(result.metadata["attempts"], 1);
        assert_eq!(result.metadata["answer_fallbacks"], 0);
        assert_eq!(result.metadata["model"], "mock-v1.0");
    }

    #[tokio::test]
    async fn test_invalid_request_becomes_failure() {
        let request = GenerationRequest::new("   ", 3, ProviderId::Mock);
        let result = service().generate(&request).await;
        assert!(!result.success);
        assert!(result.questions.is_empty());
        assert_eq!(result.metadata["attempts"], 0);
    }

    #[tokio::test]
    async fn test_unconfigured_provider_becomes_failure() {
        let request = GenerationRequest::new("some content", 2, ProviderId::OpenAi);
        let result = service().generate(&request).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("openai"));
        assert_eq!(result.metadata["attempts"], 0);
    }

    #[test]
    fn test_call_params_overrides() {
        let renderer = PromptRenderer::builtin().unwrap();
        let request = GenerationRequest::new("c", 4, ProviderId::OpenAi)
            .with_temperature(0.9)
            .with_max_tokens(256);
        let rendered = renderer
            .render(EXAM_GENERATION_TEMPLATE, ProviderId::OpenAi, "en", &Metadata::new())
            .unwrap();
        let params = call_params(&rendered, &request);
        assert_eq!(params["max_tokens"], 256);
        assert_eq!(params["question_count"], 4);
        assert!((params["temperature"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    }
}
