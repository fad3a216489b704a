//! 单个任务处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块负责处理单个出题任务，是任务级别的编排器。
//!
//! ## 核心功能
//!
//! 1. **请求构造**：任务 → `GenerationRequest`（补齐默认服务商和语言）
//! 2. **出题**：委托 `GenAiService::generate`
//! 3. **结果输出**：委托 `ResultWriter` 写 JSON
//! 4. **运行日志**：在日志文件中追加一行任务摘要

use crate::models::{GenerationJob, GenerationResult, ProviderId};
use crate::services::{GenAiService, ResultWriter};
use anyhow::Result;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

/// 单个任务的处理结果
#[derive(Debug, Default, Clone, Copy)]
pub struct JobOutcome {
    pub success: bool,
    pub questions: usize,
}

/// 任务处理所需的默认值
#[derive(Debug, Clone)]
pub struct JobDefaults {
    pub provider: ProviderId,
    pub locale: String,
    pub log_file: String,
}

/// 处理单个出题任务
///
/// # 参数
/// - `service`: 出题编排服务
/// - `writer`: 结果写入服务
/// - `job`: 任务数据
/// - `job_index`: 任务索引（用于日志）
/// - `defaults`: 默认服务商、语言与日志文件
///
/// # 返回
/// 返回任务是否成功以及生成的题目数
pub async fn process_job(
    service: &GenAiService,
    writer: &ResultWriter,
    job: GenerationJob,
    job_index: usize,
    defaults: &JobDefaults,
) -> Result<JobOutcome> {
    let job_name = job.name.clone();
    info!(
        "[任务 {}] 开始处理: {}（{} 道题）",
        job_index, job_name, job.question_count
    );

    let result = match job.into_request(defaults.provider, &defaults.locale) {
        Ok(request) => service.generate(&request).await,
        Err(e) => {
            warn!("[任务 {}] 任务配置无效: {}", job_index, e);
            GenerationResult::failed(e.to_string(), Default::default())
        }
    };

    let path = writer.write(&job_name, &result).await?;

    let outcome = JobOutcome {
        success: result.success,
        questions: result.questions.len(),
    };

    if outcome.success {
        info!(
            "[任务 {}] ✓ 完成，生成 {} 道题 → {}",
            job_index,
            outcome.questions,
            path.display()
        );
    } else {
        error!(
            "[任务 {}] ❌ 失败: {}",
            job_index,
            result.error.as_deref().unwrap_or("未知错误")
        );
    }

    append_log_line(&defaults.log_file, &job_name, &result).await?;
    Ok(outcome)
}

/// 在运行日志中追加一行任务摘要
async fn append_log_line(log_file: &str, job_name: &str, result: &GenerationResult) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .await?;

    let line = match &result.error {
        None => format!(
            "任务 {} | 成功 | 题目数: {}\n",
            job_name,
            result.questions.len()
        ),
        Some(err) => format!("任务 {} | 失败 | 原因: {}\n", job_name, err),
    };
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}
