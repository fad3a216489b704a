//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量任务处理器
//! - 管理应用生命周期（初始化、运行）
//! - 批量加载任务（Vec<GenerationJob>）
//! - 控制并发数量（Semaphore）
//! - 输出全局统计信息
//!
//! ### `job_processor` - 单个任务处理器
//! - 任务 → 出题请求
//! - 调用出题服务并写出结果
//! - 记录单个任务的摘要
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<GenerationJob>)
//!     ↓
//! job_processor (处理单个 GenerationJob)
//!     ↓
//! services::GenAiService (渲染 → 调用 → 重试 → 解析)
//!     ↓
//! clients (ProviderClient：mock / openai / gemini)
//! ```

pub mod batch_processor;
pub mod job_processor;

// 重新导出主要类型
pub use batch_processor::App;
pub use job_processor::{process_job, JobDefaults, JobOutcome};
