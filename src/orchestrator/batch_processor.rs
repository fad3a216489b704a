//! 批量任务处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量出题任务的处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：初始化日志文件、加载提示词模板、创建客户端工厂和出题服务
//! 2. **批量加载**：扫描并加载所有待处理的任务（`Vec<GenerationJob>`）
//! 3. **并发控制**：使用 Semaphore 限制并发数量
//! 4. **分批处理**：将任务分批次处理，每批完成后再开始下一批
//! 5. **全局统计**：汇总所有任务的处理结果

use crate::clients::ClientFactory;
use crate::config::Config;
use crate::models::{load_all_job_files, load_prompt_store, GenerationJob, ProviderId};
use crate::orchestrator::job_processor::{self, JobDefaults};
use crate::prompts::{PromptRenderer, PromptStore};
use crate::services::{GenAiService, ResultWriter};
use crate::utils::logging;
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// 应用主结构
pub struct App {
    config: Config,
    factory: Arc<ClientFactory>,
    service: Arc<GenAiService>,
    writer: Arc<ResultWriter>,
    defaults: JobDefaults,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        logging::init_log_file(&config.output_log_file)?;

        let (store, prompts_source) = match config.prompts_dir.as_deref() {
            Some(dir) => (load_prompt_store(Path::new(dir)).await?, dir.to_string()),
            None => (PromptStore::builtin()?, "内置模板".to_string()),
        };
        logging::log_startup(config.max_concurrent_jobs, &prompts_source);

        let factory = Arc::new(ClientFactory::new(config.clone()));
        let service = Arc::new(GenAiService::new(
            factory.clone(),
            Arc::new(PromptRenderer::new(store)),
        ));
        let writer = Arc::new(ResultWriter::new(&config.output_folder));

        let health = factory.health_check_all().await;
        for provider in factory.supported_providers() {
            let healthy = health.get(&provider).copied().unwrap_or(false);
            info!("服务商 {}: {}", provider, if healthy { "可用" } else { "不可用" });
        }

        // 配置的默认服务商 → 最佳可用服务商 → mock
        let default_provider = factory.create_default_client().await.provider();
        info!("任务未指定服务商时使用: {}", default_provider);

        let defaults = JobDefaults {
            provider: default_provider,
            locale: config.default_locale.clone(),
            log_file: config.output_log_file.clone(),
        };

        Ok(Self {
            config,
            factory,
            service,
            writer,
            defaults,
        })
    }

    pub fn factory(&self) -> &Arc<ClientFactory> {
        &self.factory
    }

    /// 任务未指定服务商时使用的服务商
    pub fn default_provider(&self) -> ProviderId {
        self.defaults.provider
    }

    /// 打印各服务商的状态
    pub async fn report_providers(&self) {
        let records = self.factory.available_clients().await;
        logging::print_provider_table(&records);
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        // 加载所有待处理的任务
        let all_jobs = self.load_jobs().await?;

        if all_jobs.is_empty() {
            warn!("⚠️ 没有找到待处理的TOML文件，程序结束");
            return Ok(());
        }

        let total_jobs = all_jobs.len();
        logging::log_jobs_loaded(total_jobs, self.batch_size());

        // 处理所有任务
        let stats = self.process_all_jobs(all_jobs).await?;

        // 输出最终统计
        logging::print_final_stats(
            stats.success,
            stats.failed,
            stats.total,
            stats.questions,
            &self.config.output_log_file,
        );

        Ok(())
    }

    /// 加载任务
    async fn load_jobs(&self) -> Result<Vec<GenerationJob>> {
        info!("\n📁 正在扫描待处理的任务...");
        load_all_job_files(&self.config.jobs_folder).await
    }

    fn batch_size(&self) -> usize {
        self.config.max_concurrent_jobs.max(1)
    }

    /// 处理所有任务
    async fn process_all_jobs(&self, all_jobs: Vec<GenerationJob>) -> Result<ProcessingStats> {
        let batch_size = self.batch_size();
        let semaphore = Arc::new(Semaphore::new(batch_size));
        let total_jobs = all_jobs.len();
        let total_batches = total_jobs.div_ceil(batch_size);
        let mut stats = ProcessingStats {
            total: total_jobs,
            ..Default::default()
        };

        // 分批处理
        for (batch_idx, batch_jobs) in all_jobs.chunks(batch_size).enumerate() {
            let batch_start = batch_idx * batch_size;
            let batch_num = batch_idx + 1;

            logging::log_batch_start(
                batch_num,
                total_batches,
                batch_start + 1,
                batch_start + batch_jobs.len(),
                total_jobs,
            );

            // 处理本批
            let batch_result = self
                .process_batch(batch_jobs, batch_start, semaphore.clone())
                .await?;

            stats.success += batch_result.success;
            stats.failed += batch_result.failed;
            stats.questions += batch_result.questions;

            logging::log_batch_complete(
                batch_num,
                batch_result.success,
                batch_result.success + batch_result.failed,
            );
        }

        Ok(stats)
    }

    /// 处理单个批次
    async fn process_batch(
        &self,
        batch_jobs: &[GenerationJob],
        batch_start: usize,
        semaphore: Arc<Semaphore>,
    ) -> Result<BatchResult> {
        let mut batch_handles = Vec::new();

        // 为本批创建并发任务
        for (idx, job) in batch_jobs.iter().enumerate() {
            let job_index = batch_start + idx + 1;
            let permit = semaphore.clone().acquire_owned().await?;

            let service = self.service.clone();
            let writer = self.writer.clone();
            let defaults = self.defaults.clone();
            let job = job.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                job_processor::process_job(&service, &writer, job, job_index, &defaults).await
            });
            batch_handles.push((job_index, handle));
        }

        // 等待本批所有任务完成
        let mut result = BatchResult::default();

        for (job_index, handle) in batch_handles {
            match handle.await {
                Ok(Ok(outcome)) if outcome.success => {
                    result.success += 1;
                    result.questions += outcome.questions;
                }
                Ok(Ok(_)) => {
                    result.failed += 1;
                }
                Ok(Err(e)) => {
                    error!("[任务 {}] ❌ 处理过程中发生错误: {:#}", job_index, e);
                    result.failed += 1;
                }
                Err(e) => {
                    error!("[任务 {}] 任务执行失败: {}", job_index, e);
                    result.failed += 1;
                }
            }
        }

        Ok(result)
    }
}

/// 处理统计
#[derive(Debug, Default)]
struct ProcessingStats {
    success: usize,
    failed: usize,
    total: usize,
    questions: usize,
}

/// 批次处理结果
#[derive(Debug, Default)]
struct BatchResult {
    success: usize,
    failed: usize,
    questions: usize,
}
