//! 提示词模板：基础模板 + 服务商覆盖配置 + 纯变量渲染

pub mod renderer;
pub mod store;

pub use renderer::{PromptRenderer, ProviderPromptSettings, RenderedPrompt};
pub use store::{PromptBase, PromptStore, ProviderInfo, ProviderPromptConfig, TemplateDefinition};

/// 出题模板的键名
pub const EXAM_GENERATION_TEMPLATE: &str = "exam_generation";
