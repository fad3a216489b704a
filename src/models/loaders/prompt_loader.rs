use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

use crate::error::{AppError, AppResult, FileError};
use crate::prompts::{PromptBase, PromptStore, ProviderPromptConfig};

/// 从目录加载提示词模板
///
/// 目录结构：
/// ```text
/// <dir>/base.toml
/// <dir>/providers/<服务商>.toml
/// ```
pub async fn load_prompt_store(dir: &Path) -> AppResult<PromptStore> {
    if !dir.is_dir() {
        return Err(FileError::DirectoryNotFound {
            path: dir.display().to_string(),
        }
        .into());
    }

    let base_path = dir.join("base.toml");
    let base_text = read(&base_path).await?;
    let base: PromptBase = toml::from_str(&base_text)
        .map_err(|e| AppError::toml_parse_failed(base_path.display().to_string(), e))?;
    let mut store = PromptStore::new(base);

    let providers_dir = dir.join("providers");
    if !providers_dir.is_dir() {
        warn!("提示词目录缺少 providers 子目录: {}", dir.display());
        return Ok(store);
    }

    let mut entries = fs::read_dir(&providers_dir)
        .await
        .map_err(|e| AppError::file_read_failed(providers_dir.display().to_string(), e))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AppError::file_read_failed(providers_dir.display().to_string(), e))?
    {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("toml") {
            continue;
        }
        let Some(name) = path.file_stem().map(|s| s.to_string_lossy().to_lowercase()) else {
            continue;
        };

        let text = read(&path).await?;
        let config: ProviderPromptConfig = toml::from_str(&text)
            .map_err(|e| AppError::toml_parse_failed(path.display().to_string(), e))?;
        store.providers.insert(name, config);
    }

    info!(
        "已从 {} 加载提示词模板，服务商配置 {} 个",
        dir.display(),
        store.providers.len()
    );
    Ok(store)
}

async fn read(path: &Path) -> AppResult<String> {
    if !path.exists() {
        return Err(FileError::NotFound {
            path: path.display().to_string(),
        }
        .into());
    }
    fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))
}
