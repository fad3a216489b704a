use serde::{Deserialize, Serialize};

/// AI 服务商枚举
///
/// 受支持的后端是一个封闭集合，新增后端需要在这里加一个成员，
/// 并在 `ClientFactory` 的启动注册表里登记构造函数。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// 确定性模拟后端（测试与兜底）
    Mock,
    /// OpenAI 兼容的 Chat Completions 接口
    #[serde(rename = "openai")]
    OpenAi,
    /// Google Gemini
    Gemini,
}

impl ProviderId {
    /// 全部服务商
    pub const ALL: [ProviderId; 3] = [ProviderId::Mock, ProviderId::OpenAi, ProviderId::Gemini];

    /// 选择最佳客户端时的优先级（从高到低）
    pub const PRIORITY: [ProviderId; 3] =
        [ProviderId::OpenAi, ProviderId::Gemini, ProviderId::Mock];

    /// 获取标准名称（也是配置文件名）
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderId::Mock => "mock",
            ProviderId::OpenAi => "openai",
            ProviderId::Gemini => "gemini",
        }
    }

    /// 从名称解析服务商（忽略大小写和首尾空白）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Some(ProviderId::Mock),
            "openai" => Some(ProviderId::OpenAi),
            "gemini" => Some(ProviderId::Gemini),
            _ => None,
        }
    }

    /// 可用服务商名称列表，用于错误提示
    pub fn names() -> String {
        Self::ALL
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProviderId {
    type Err = crate::error::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| crate::error::ConfigError::UnsupportedProvider {
            name: s.to_string(),
            available: Self::names(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(ProviderId::parse("OpenAI"), Some(ProviderId::OpenAi));
        assert_eq!(ProviderId::parse(" gemini "), Some(ProviderId::Gemini));
        assert_eq!(ProviderId::parse("claude"), None);
    }

    #[test]
    fn test_from_str_reports_available() {
        let err = "claude".parse::<ProviderId>().unwrap_err();
        assert!(err.to_string().contains("mock, openai, gemini"));
    }

    #[test]
    fn test_serde_uses_wire_names() {
        assert_eq!(serde_json::to_string(&ProviderId::OpenAi).unwrap(), "\"openai\"");
        let p: ProviderId = serde_json::from_str("\"mock\"").unwrap();
        assert_eq!(p, ProviderId::Mock);
    }
}
