//! 结果写入服务 - 业务能力层
//!
//! 只负责"把一个出题结果写成 JSON 文件"能力，不关心流程

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::GenerationResult;

/// 结果写入服务
///
/// 职责：
/// - 将单个任务的 `GenerationResult` 写入 `<输出目录>/<任务名>.json`
/// - 输出目录不存在时自动创建
pub struct ResultWriter {
    output_dir: PathBuf,
}

impl ResultWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 任务名对应的输出路径，文件名中的路径分隔符会被替换
    pub fn path_for(&self, job_name: &str) -> PathBuf {
        let safe: String = job_name
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' => '_',
                c => c,
            })
            .collect();
        self.output_dir.join(format!("{}.json", safe))
    }

    /// 写入结果，返回写入的文件路径
    pub async fn write(&self, job_name: &str, result: &GenerationResult) -> AppResult<PathBuf> {
        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| AppError::file_write_failed(self.output_dir.display().to_string(), e))?;

        let path = self.path_for(job_name);
        let body = serde_json::to_string_pretty(result)?;
        debug!(
            "写入结果: {} | 题目数: {} | 成功: {}",
            path.display(),
            result.questions.len(),
            result.success
        );

        fs::write(&path, body)
            .await
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;

    #[test]
    fn test_path_for_sanitizes_name() {
        let writer = ResultWriter::new("out");
        assert_eq!(writer.path_for("a/b:c"), PathBuf::from("out").join("a_b_c.json"));
    }

    #[tokio::test]
    async fn test_write_creates_directory_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ResultWriter::new(dir.path().join("nested"));
        let result = GenerationResult::failed("boom", Metadata::new());

        let path = writer.write("job1", &result).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: GenerationResult = serde_json::from_str(&text).unwrap();
        assert!(!parsed.success);
        assert_eq!(parsed.error.as_deref(), Some("boom"));
    }
}
