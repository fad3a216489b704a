//! 提示词配置数据结构
//!
//! 对应 `prompts/base.toml` 与 `prompts/providers/<name>.toml` 两类文件。

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

use crate::error::{AppError, AppResult};
use crate::models::{CallParams, Metadata};

const BUILTIN_BASE: &str = include_str!("../../prompts/base.toml");
const BUILTIN_PROVIDERS: [(&str, &str); 3] = [
    ("mock", include_str!("../../prompts/providers/mock.toml")),
    ("openai", include_str!("../../prompts/providers/openai.toml")),
    ("gemini", include_str!("../../prompts/providers/gemini.toml")),
];

/// 基础模板集合
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptBase {
    /// 全局默认变量（含 language_default 等）
    #[serde(default)]
    pub variables: Metadata,
    #[serde(default)]
    pub templates: HashMap<String, TemplateDefinition>,
}

impl PromptBase {
    /// 默认语言，未配置时为 "en"
    pub fn default_locale(&self) -> &str {
        self.variables
            .get("language_default")
            .and_then(|v| v.as_str())
            .unwrap_or("en")
    }
}

/// 单个模板定义
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateDefinition {
    /// 语言 -> 模板字符串
    #[serde(default)]
    pub locales: BTreeMap<String, String>,
    #[serde(default)]
    pub required_fields: Vec<String>,
    #[serde(default)]
    pub default_variables: Metadata,
}

/// 服务商覆盖配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderPromptConfig {
    #[serde(default)]
    pub provider: ProviderInfo,
    #[serde(default)]
    pub params: CallParams,
    #[serde(default)]
    pub template_mapping: HashMap<String, String>,
    #[serde(default)]
    pub variables: Metadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderInfo {
    pub name: Option<String>,
    pub model: Option<String>,
}

/// 已加载的全部提示词配置
#[derive(Debug, Clone, Default)]
pub struct PromptStore {
    pub base: PromptBase,
    /// 服务商名称 -> 覆盖配置
    pub providers: HashMap<String, ProviderPromptConfig>,
}

impl PromptStore {
    pub fn new(base: PromptBase) -> Self {
        Self {
            base,
            providers: HashMap::new(),
        }
    }

    /// 添加（或替换）一个服务商覆盖配置
    pub fn with_provider(mut self, name: impl Into<String>, config: ProviderPromptConfig) -> Self {
        self.providers.insert(name.into(), config);
        self
    }

    /// 从 TOML 文本构建
    pub fn from_toml_strs(base: &str, providers: &[(&str, &str)]) -> AppResult<Self> {
        let base: PromptBase =
            toml::from_str(base).map_err(|e| AppError::toml_parse_failed("base.toml", e))?;
        let mut store = Self::new(base);
        for (name, text) in providers {
            let config: ProviderPromptConfig = toml::from_str(text)
                .map_err(|e| AppError::toml_parse_failed(format!("providers/{}.toml", name), e))?;
            store.providers.insert(name.to_string(), config);
        }
        Ok(store)
    }

    /// 编译期内置的默认模板
    pub fn builtin() -> AppResult<Self> {
        Self::from_toml_strs(BUILTIN_BASE, &BUILTIN_PROVIDERS)
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderPromptConfig> {
        self.providers.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_store_parses() {
        let store = PromptStore::builtin().unwrap();
        assert_eq!(store.base.default_locale(), "en");

        let tpl = &store.base.templates["exam_generation"];
        assert!(tpl.locales.contains_key("en"));
        assert!(tpl.locales.contains_key("vi"));
        assert_eq!(tpl.required_fields.len(), 4);

        for name in ["mock", "openai", "gemini"] {
            let cfg = store.provider(name).unwrap();
            assert_eq!(cfg.provider.name.as_deref(), Some(name));
            assert!(cfg.provider.model.is_some());
        }
    }
}
