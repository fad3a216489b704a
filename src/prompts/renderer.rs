//! 提示词渲染
//!
//! 只支持 `{{ name }}` 形式的纯变量替换，不执行任何表达式。

use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::error::{AppResult, PromptError};
use crate::models::{CallParams, Metadata, ProviderId};
use crate::prompts::store::PromptStore;

const FALLBACK_QUESTION_COUNT: u64 = 10;
const FALLBACK_MAX_CONTENT_LENGTH: u64 = 10_000;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder regex is valid")
    })
}

/// 解析后的服务商配置
#[derive(Debug, Clone, Serialize)]
pub struct ProviderPromptSettings {
    pub name: String,
    pub model: String,
    pub params: CallParams,
    pub resolved_locale: String,
    pub resolved_variables: Metadata,
}

/// 渲染结果
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    pub prompt: String,
    pub provider_config: ProviderPromptSettings,
    pub required_fields: Vec<String>,
}

/// 提示词渲染器
pub struct PromptRenderer {
    store: PromptStore,
}

impl PromptRenderer {
    pub fn new(store: PromptStore) -> Self {
        Self { store }
    }

    /// 使用内置模板
    pub fn builtin() -> AppResult<Self> {
        Ok(Self::new(PromptStore::builtin()?))
    }

    pub fn store(&self) -> &PromptStore {
        &self.store
    }

    /// 渲染指定模板
    ///
    /// 变量优先级（后者覆盖前者）：基础变量 → 模板默认变量 → 服务商变量 → 调用方变量。
    pub fn render(
        &self,
        template_key: &str,
        provider: ProviderId,
        locale: &str,
        variables: &Metadata,
    ) -> AppResult<RenderedPrompt> {
        let base = &self.store.base;
        let template = base
            .templates
            .get(template_key)
            .ok_or_else(|| PromptError::TemplateNotFound {
                key: template_key.to_string(),
            })?;

        let provider_name = provider.as_str();
        let provider_cfg =
            self.store
                .provider(provider_name)
                .ok_or_else(|| PromptError::ProviderConfigNotFound {
                    provider: provider_name.to_string(),
                })?;
        let (name, model) = match (&provider_cfg.provider.name, &provider_cfg.provider.model) {
            (Some(name), Some(model)) if !name.is_empty() && !model.is_empty() => {
                (name.clone(), model.clone())
            }
            _ => {
                return Err(PromptError::ProviderConfigInvalid {
                    provider: provider_name.to_string(),
                    reason: "provider.name 和 provider.model 均为必填项".to_string(),
                }
                .into())
            }
        };

        let mapped_key = provider_cfg
            .template_mapping
            .get(template_key)
            .map(String::as_str)
            .unwrap_or(template_key);
        let effective = if mapped_key == template_key {
            template
        } else {
            base.templates
                .get(mapped_key)
                .ok_or_else(|| PromptError::MappedTemplateNotFound {
                    key: template_key.to_string(),
                    mapped: mapped_key.to_string(),
                })?
        };

        if effective.required_fields.is_empty() {
            return Err(PromptError::RequiredFieldsInvalid {
                key: mapped_key.to_string(),
            }
            .into());
        }

        let default_locale = base.default_locale();
        let resolved_locale = if !locale.is_empty() && effective.locales.contains_key(locale) {
            locale
        } else if effective.locales.contains_key(default_locale) {
            if !locale.is_empty() {
                debug!("语言 '{}' 不可用，回退到默认语言 '{}'", locale, default_locale);
            }
            default_locale
        } else {
            return Err(PromptError::LocaleUnavailable {
                requested: locale.to_string(),
                default: default_locale.to_string(),
            }
            .into());
        };

        let mut merged = Metadata::new();
        merged.extend(base.variables.clone());
        merged.extend(effective.default_variables.clone());
        merged.extend(provider_cfg.variables.clone());
        merged.extend(variables.clone());

        if !merged.contains_key("question_count") {
            let count = base
                .variables
                .get("default_question_count")
                .cloned()
                .unwrap_or_else(|| json!(FALLBACK_QUESTION_COUNT));
            merged.insert("question_count".to_string(), count);
        }
        if !merged.contains_key("max_content_length") {
            merged.insert(
                "max_content_length".to_string(),
                json!(FALLBACK_MAX_CONTENT_LENGTH),
            );
        }
        merged
            .entry("required_fields".to_string())
            .or_insert_with(|| json!(effective.required_fields));

        let template_str = &effective.locales[resolved_locale];
        let prompt = substitute(template_str, &merged);

        debug!(
            "渲染提示词完成: 模板 {} / 服务商 {} / 语言 {} / 长度 {}",
            mapped_key,
            provider_name,
            resolved_locale,
            prompt.len()
        );

        Ok(RenderedPrompt {
            prompt,
            provider_config: ProviderPromptSettings {
                name,
                model,
                params: provider_cfg.params.clone(),
                resolved_locale: resolved_locale.to_string(),
                resolved_variables: merged,
            },
            required_fields: effective.required_fields.clone(),
        })
    }
}

/// 纯变量替换，结果去除首尾空白
pub fn substitute(template: &str, variables: &Metadata) -> String {
    let rendered = placeholder_regex().replace_all(template, |caps: &Captures| {
        let name = &caps[1];
        match variables.get(name) {
            Some(value) => value_to_text(value),
            None => {
                warn!("提示词变量 '{}' 未定义，替换为空字符串", name);
                String::new()
            }
        }
    });
    rendered.trim().to_string()
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(value_to_text)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::store::{PromptBase, ProviderPromptConfig};

    fn vars(pairs: &[(&str, Value)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    const MINI_BASE: &str = r#"
        [variables]
        language_default = "en"

        [templates.quiz]
        required_fields = ["question_text"]
        [templates.quiz.default_variables]
        tone = "base"
        [templates.quiz.locales]
        en = "  Make {{ question_count }} questions ({{tone}}) from: {{ content }} | {{ required_fields }} | {{ max_content_length }}  "
        vi = "Tạo {{ question_count }} câu hỏi"

        [templates.quiz_short]
        required_fields = ["question_text", "options"]
        [templates.quiz_short.locales]
        en = "short {{ content }}"
    "#;

    fn renderer_with(provider_toml: &str) -> PromptRenderer {
        let store =
            PromptStore::from_toml_strs(MINI_BASE, &[("openai", provider_toml)]).unwrap();
        PromptRenderer::new(store)
    }

    const OPENAI_TOML: &str = r#"
        [provider]
        name = "openai"
        model = "gpt-test"
        [params]
        temperature = 0.5
        [variables]
        tone = "provider"
    "#;

    #[test]
    fn test_render_resolves_placeholders_and_trims() {
        let renderer = renderer_with(OPENAI_TOML);
        let out = renderer
            .render(
                "quiz",
                ProviderId::OpenAi,
                "en",
                &vars(&[("content", json!("photosynthesis")), ("question_count", json!(3))]),
            )
            .unwrap();

        assert_eq!(
            out.prompt,
            "Make 3 questions (provider) from: photosynthesis | question_text | 10000"
        );
        assert!(!out.prompt.contains("{{"));
        assert_eq!(out.provider_config.name, "openai");
        assert_eq!(out.provider_config.model, "gpt-test");
        assert_eq!(out.provider_config.params["temperature"], json!(0.5));
        assert_eq!(out.provider_config.resolved_locale, "en");
        assert_eq!(out.required_fields, vec!["question_text".to_string()]);
    }

    #[test]
    fn test_caller_variables_override_provider_and_base() {
        let renderer = renderer_with(OPENAI_TOML);
        let out = renderer
            .render(
                "quiz",
                ProviderId::OpenAi,
                "en",
                &vars(&[("content", json!("x")), ("tone", json!("caller"))]),
            )
            .unwrap();
        assert!(out.prompt.contains("(caller)"));
        // 未传 question_count 时使用兜底默认值
        assert_eq!(out.provider_config.resolved_variables["question_count"], json!(10));
    }

    #[test]
    fn test_unknown_locale_falls_back_to_default() {
        let renderer = renderer_with(OPENAI_TOML);
        let out = renderer
            .render("quiz", ProviderId::OpenAi, "fr", &vars(&[("content", json!("x"))]))
            .unwrap();
        assert_eq!(out.provider_config.resolved_locale, "en");

        let out = renderer
            .render("quiz", ProviderId::OpenAi, "vi", &vars(&[("question_count", json!(2))]))
            .unwrap();
        assert_eq!(out.prompt, "Tạo 2 câu hỏi");
    }

    #[test]
    fn test_missing_default_locale_is_an_error() {
        let base = r#"
            [variables]
            language_default = "de"
            [templates.quiz]
            required_fields = ["a"]
            [templates.quiz.locales]
            en = "hi"
        "#;
        let store = PromptStore::from_toml_strs(base, &[("openai", OPENAI_TOML)]).unwrap();
        let err = PromptRenderer::new(store)
            .render("quiz", ProviderId::OpenAi, "fr", &Metadata::new())
            .unwrap_err();
        assert!(err.to_string().contains("fr"));
    }

    #[test]
    fn test_unknown_template_key_fails() {
        let renderer = renderer_with(OPENAI_TOML);
        let err = renderer
            .render("unknown_template", ProviderId::OpenAi, "en", &Metadata::new())
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::AppError::Prompt(PromptError::TemplateNotFound { .. })
        ));
    }

    #[test]
    fn test_template_mapping_redirects_and_validates() {
        let mapped = r#"
            [provider]
            name = "openai"
            model = "gpt-test"
            [template_mapping]
            quiz = "quiz_short"
        "#;
        let out = renderer_with(mapped)
            .render("quiz", ProviderId::OpenAi, "en", &vars(&[("content", json!("c"))]))
            .unwrap();
        assert_eq!(out.prompt, "short c");
        assert_eq!(out.required_fields.len(), 2);

        let broken = r#"
            [provider]
            name = "openai"
            model = "gpt-test"
            [template_mapping]
            quiz = "nope"
        "#;
        let err = renderer_with(broken)
            .render("quiz", ProviderId::OpenAi, "en", &Metadata::new())
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::AppError::Prompt(PromptError::MappedTemplateNotFound { .. })
        ));
    }

    #[test]
    fn test_provider_without_model_is_rejected() {
        let base: PromptBase = toml::from_str(MINI_BASE).unwrap();
        let store = PromptStore::new(base).with_provider("openai", ProviderPromptConfig::default());
        let err = PromptRenderer::new(store)
            .render("quiz", ProviderId::OpenAi, "en", &Metadata::new())
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::AppError::Prompt(PromptError::ProviderConfigInvalid { .. })
        ));
    }

    #[test]
    fn test_missing_provider_config_fails() {
        let renderer = renderer_with(OPENAI_TOML);
        let err = renderer
            .render("quiz", ProviderId::Gemini, "en", &Metadata::new())
            .unwrap_err();
        assert!(err.to_string().contains("gemini"));
    }

    #[test]
    fn test_substitute_does_not_evaluate_expressions() {
        let out = substitute(
            "{{ a }} {{ a + 1 }} {{ missing }}",
            &vars(&[("a", json!(1))]),
        );
        assert_eq!(out, "1 {{ a + 1 }}");
    }

    #[test]
    fn test_builtin_templates_render_for_every_provider() {
        let renderer = PromptRenderer::builtin().unwrap();
        for provider in ProviderId::ALL {
            let out = renderer
                .render(
                    "exam_generation",
                    provider,
                    "vi",
                    &vars(&[("content", json!("Nội dung kiểm thử")), ("question_count", json!(1))]),
                )
                .unwrap();
            assert!(!out.prompt.is_empty());
            assert!(!out.prompt.contains("{{") && !out.prompt.contains("}}"));
            assert_eq!(out.provider_config.name, provider.as_str());
        }
    }
}
