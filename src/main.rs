use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use tribunal_sync::error::{AppResult, ConfigError};
use tribunal_sync::utils::logging;
use tribunal_sync::{App, Config, Credential};

/// 凭据只在入口读取一次，之后显式传入每次运行
fn credential_from_env() -> AppResult<Credential> {
    let read = |var_name: &str| {
        std::env::var(var_name).map_err(|_| ConfigError::EnvVarNotFound {
            var_name: var_name.to_string(),
        })
    };
    Ok(Credential::new(read("CREDENTIAL_ID")?, read("CREDENTIAL_SECRET")?))
}

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    logging::init(config.verbose_logging);

    let credential = credential_from_env()?;

    // Ctrl+C 只阻止新的阶段开始，已打开的浏览器上下文照常关闭
    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⚠️ 收到中断信号，正在取消剩余运行...");
            on_ctrl_c.cancel();
        }
    });

    // 初始化并运行应用
    let app = App::initialize(config).await?;
    let stats = app.run(credential, &cancel).await;

    if stats.failed > 0 {
        warn!("⚠️ {} 个目标运行失败，详见输出目录中的报告", stats.failed);
    }
    Ok(())
}
