use crate::error::{AppError, AppResult};
use crate::models::{Difficulty, GenerationRequest, ProviderId};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 出题任务（一个 TOML 文件对应一个任务）
///
/// ```toml
/// name = "photosynthesis"
/// content_file = "photosynthesis.txt"   # 或者直接写 content = "..."
/// question_count = 5
/// subject = "biology"
/// provider = "mock"
/// locale = "vi"
/// difficulty = "easy"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationJob {
    /// 任务名，也是输出文件名；缺省时取 TOML 文件名
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content: Option<String>,
    /// 原文文件路径，相对于任务文件所在目录
    #[serde(default)]
    pub content_file: Option<String>,
    #[serde(default = "default_question_count")]
    pub question_count: u32,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// 任务文件路径（加载后设置）
    #[serde(skip)]
    pub file_path: Option<String>,
}

fn default_question_count() -> u32 {
    10
}

impl GenerationJob {
    /// 转换为出题请求
    ///
    /// 任务未指定服务商或语言时使用传入的默认值。
    pub fn into_request(
        self,
        default_provider: ProviderId,
        default_locale: &str,
    ) -> AppResult<GenerationRequest> {
        let provider = match self.provider.as_deref() {
            Some(name) => name.parse::<ProviderId>()?,
            None => default_provider,
        };
        let content = self.content.ok_or_else(|| {
            AppError::invalid_request(format!("任务 {} 缺少 content 或 content_file", self.name))
        })?;

        let mut request = GenerationRequest::new(content, self.question_count, provider)
            .with_locale(self.locale.unwrap_or_else(|| default_locale.to_string()))
            .with_difficulty(self.difficulty);
        request.subject = self.subject;
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;
        Ok(request)
    }
}

/// 从 TOML 文件加载出题任务，并读取 `content_file` 指向的原文
pub async fn load_job_file(toml_file_path: &Path) -> Result<GenerationJob> {
    let text = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let mut job: GenerationJob = toml::from_str(&text)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    if job.name.trim().is_empty() {
        job.name = toml_file_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "job".to_string());
    }

    if job.content.is_none() {
        if let Some(content_file) = &job.content_file {
            let base_dir = toml_file_path.parent().unwrap_or_else(|| Path::new("."));
            let content_path = base_dir.join(content_file);
            let content = fs::read_to_string(&content_path)
                .await
                .with_context(|| format!("无法读取原文文件: {}", content_path.display()))?;
            job.content = Some(content);
        }
    }

    // 设置文件路径
    job.file_path = Some(toml_file_path.to_string_lossy().to_string());

    Ok(job)
}

/// 从文件夹中加载所有出题任务（按文件名排序）
///
/// 单个文件加载失败只记录警告，不影响其他任务。
pub async fn load_all_job_files(folder_path: &str) -> Result<Vec<GenerationJob>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut toml_files = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml_files.push(path);
        }
    }
    toml_files.sort();

    let mut jobs = Vec::new();
    for path in toml_files {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_job_file(&path).await {
            Ok(job) => {
                tracing::info!(
                    "成功加载任务 {}，计划出题 {} 道",
                    job.name,
                    job.question_count
                );
                jobs.push(job);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {:#}", path.display(), e);
            }
        }
    }

    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_job_with_content_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("source.txt"), "Water boils at 100 degrees.").unwrap();
        std::fs::write(
            dir.path().join("water.toml"),
            "content_file = \"source.txt\"\nquestion_count = 3\nprovider = \"mock\"\ndifficulty = \"hard\"\n",
        )
        .unwrap();

        let job = load_job_file(&dir.path().join("water.toml")).await.unwrap();
        assert_eq!(job.name, "water");
        assert_eq!(job.content.as_deref(), Some("Water boils at 100 degrees."));
        assert_eq!(job.difficulty, Difficulty::Hard);

        let request = job.into_request(ProviderId::OpenAi, "en").unwrap();
        assert_eq!(request.provider, ProviderId::Mock);
        assert_eq!(request.question_count, 3);
        assert_eq!(request.locale, "en");
    }

    #[tokio::test]
    async fn test_load_all_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.toml"), "name = \"first\"\ncontent = \"x\"\n").unwrap();
        std::fs::write(dir.path().join("b.toml"), "this is = = not toml").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let jobs = load_all_job_files(dir.path().to_str().unwrap()).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "first");
        assert_eq!(jobs[0].question_count, 10);
    }

    #[tokio::test]
    async fn test_missing_folder_is_an_error() {
        assert!(load_all_job_files("/definitely/not/here").await.is_err());
    }

    #[test]
    fn test_into_request_rejects_unknown_provider_and_missing_content() {
        let job: GenerationJob = toml::from_str("content = \"x\"\nprovider = \"claude\"").unwrap();
        let err = job.into_request(ProviderId::Mock, "en").unwrap_err();
        assert!(err.is_config_error());

        let job: GenerationJob = toml::from_str("name = \"empty\"").unwrap();
        assert!(job.into_request(ProviderId::Mock, "en").is_err());
    }
}
