use anyhow::Result;
use exam_genai::utils::logging;
use exam_genai::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    logging::init(config.verbose_logging);

    let app = App::initialize(config).await?;

    // `exam_genai providers` 只打印服务商状态
    match std::env::args().nth(1).as_deref() {
        Some("providers") => app.report_providers().await,
        Some(other) => anyhow::bail!("未知命令: {}（可用: providers）", other),
        None => app.run().await?,
    }

    Ok(())
}
