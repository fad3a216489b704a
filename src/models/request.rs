use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::ProviderId;

/// 题目难度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 一次出题请求
///
/// 每次编排调用构造一次，之后只读。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// 出题依据的原文
    pub content: String,
    /// 需要生成的题目数量（> 0）
    pub question_count: u32,
    #[serde(default)]
    pub subject: Option<String>,
    pub provider: ProviderId,
    /// 语言标签，空字符串表示使用模板默认语言
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    /// 创建请求，其余字段取默认值
    pub fn new(content: impl Into<String>, question_count: u32, provider: ProviderId) -> Self {
        Self {
            content: content.into(),
            question_count,
            subject: None,
            provider,
            locale: String::new(),
            difficulty: Difficulty::default(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// 校验请求参数
    pub fn validate(&self) -> AppResult<()> {
        if self.question_count == 0 {
            return Err(AppError::invalid_request("question_count 必须大于 0"));
        }
        if self.content.trim().is_empty() {
            return Err(AppError::invalid_request("content 不能为空"));
        }
        if let Some(t) = self.temperature {
            if !t.is_finite() || t < 0.0 {
                return Err(AppError::invalid_request(format!(
                    "temperature 不合法: {}",
                    t
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_zero_count_and_blank_content() {
        assert!(GenerationRequest::new("abc", 0, ProviderId::Mock)
            .validate()
            .is_err());
        assert!(GenerationRequest::new("   ", 3, ProviderId::Mock)
            .validate()
            .is_err());
        assert!(GenerationRequest::new("abc", 3, ProviderId::Mock)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let req: GenerationRequest =
            serde_json::from_str(r#"{"content":"x","question_count":2,"provider":"gemini"}"#)
                .unwrap();
        assert_eq!(req.provider, ProviderId::Gemini);
        assert_eq!(req.difficulty, Difficulty::Medium);
        assert!(req.locale.is_empty());
    }
}
