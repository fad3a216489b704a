//! 确定性模拟客户端
//!
//! 始终已配置、始终健康，返回固定形状的 JSON，用于测试和兜底。

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::clients::{base_metadata, param_u32, ProviderClient};
use crate::error::ProviderError;
use crate::models::{CallParams, Capabilities, ProviderId, RawGenerationResult};

const MOCK_MODEL: &str = "mock-v1.0";

/// 题库样例：(题干, 选项, 答案, 解析)
const SAMPLES: [(&str, [&str; 4], &str, &str); 3] = [
    (
        "What is the capital of France?",
        ["Paris", "London", "Berlin", "Madrid"],
        "A",
        "Paris is the capital of France",
    ),
    (
        "Which planet is known as the Red Planet?",
        ["Venus", "Mars", "Jupiter", "Saturn"],
        "B",
        "Iron oxide on its surface gives Mars its red colour",
    ),
    (
        "What is the chemical symbol for water?",
        ["O2", "CO2", "H2O", "NaCl"],
        "C",
        "A water molecule has two hydrogen atoms and one oxygen atom",
    ),
];

/// 模拟客户端
#[derive(Debug, Default, Clone)]
pub struct MockClient;

impl MockClient {
    pub fn new() -> Self {
        Self
    }

    /// 生成 `count` 道题的原始 JSON 数组
    fn build_payload(count: u32) -> Value {
        let items: Vec<Value> = (0..count as usize)
            .map(|i| {
                let (question, options, answer, explanation) = SAMPLES[i % SAMPLES.len()];
                json!({
                    "question_text": format!("{} (#{})", question, i + 1),
                    "options": options,
                    "correct_answer": answer,
                    "explanation": explanation,
                })
            })
            .collect();
        Value::Array(items)
    }
}

#[async_trait]
impl ProviderClient for MockClient {
    fn provider(&self) -> ProviderId {
        ProviderId::Mock
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn generate(
        &self,
        prompt: &str,
        params: &CallParams,
    ) -> Result<RawGenerationResult, ProviderError> {
        let count = param_u32(params, "question_count").unwrap_or(1);
        debug!("模拟客户端生成 {} 道题，提示词长度: {}", count, prompt.len());

        let payload = Self::build_payload(count);
        Ok(RawGenerationResult::ok(
            payload.to_string(),
            base_metadata(ProviderId::Mock, MOCK_MODEL),
        ))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            provider: ProviderId::Mock,
            model: MOCK_MODEL.to_string(),
            supports_json: true,
            supports_streaming: false,
            max_tokens: 2000,
        }
    }
}
