//! # Exam GenAI
//!
//! 一个根据原文批量生成四选一考试题目的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 客户端层（Clients）
//! - `clients/` - 每个 AI 服务商一个实现，统一实现 `ProviderClient`
//! - `ClientFactory` - 注册表 + 实例缓存，唯一的共享可变状态
//!
//! ### ② 提示词层（Prompts）
//! - `prompts/` - 基础模板 + 服务商覆盖配置，纯 `{{ name }}` 变量替换
//!
//! ### ③ 业务能力层（Services）
//! - `retry` - 与服务商无关的指数退避重试
//! - `response_parser` - JSON 提取与题目规范化
//! - `GenAiService` - 一次出题请求的完整流程，不返回错误
//! - `ResultWriter` - 写结果 JSON 能力
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量任务处理器，管理并发
//! - `orchestrator/job_processor` - 单个任务处理器
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod prompts;
pub mod services;
pub mod utils;

// 重新导出常用类型
pub use clients::{ClientFactory, ProviderClient};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{
    CanonicalQuestion, GenerationRequest, GenerationResult, ProviderId, RawGenerationResult,
};
pub use orchestrator::App;
pub use prompts::PromptRenderer;
pub use services::{GenAiService, RetryPolicy};
