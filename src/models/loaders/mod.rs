//! 文件加载：出题任务（TOML）与提示词模板目录

pub mod prompt_loader;
pub mod toml_loader;

pub use prompt_loader::load_prompt_store;
pub use toml_loader::{load_all_job_files, load_job_file, GenerationJob};
