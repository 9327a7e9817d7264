use anyhow::Context;
use tracing::{error, info, warn};
use vpn_config_harvester::{
    config::{AppConfig, Credentials},
    logging,
    portal::proton::PortalWaits,
    ProtonPortalFactory, RunController, RunOutcome, RunSettings, TokioSleeper,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 先读配置再初始化日志，加载失败的原因在日志就绪后再输出
    let config_path = AppConfig::resolve_path();
    let loaded = AppConfig::load_from_file(&config_path).await;
    let config = loaded.as_ref().cloned().unwrap_or_default();

    // 必须保持 _log_guard 存活
    let _log_guard = logging::init_logging(&config.log);

    info!("VPN Config Harvester v{} 启动中...", env!("CARGO_PKG_VERSION"));
    match &loaded {
        Ok(_) => info!("配置文件加载成功: {}", config_path),
        Err(e) => warn!("配置文件加载失败，使用默认配置: {:#}", e),
    }

    let credentials = Credentials::from_env().map_err(|e| {
        error!("{}", e);
        e
    })?;

    let download_dir = config.storage.ensure_download_dir()?;
    info!("下载目录: {:?}", download_dir);
    info!("下载记录: {:?}", config.storage.ledger_path);

    let factory = ProtonPortalFactory::new(
        config.webdriver.clone(),
        config.portal.clone(),
        PortalWaits::from_session_config(&config.session),
        download_dir,
    );
    let sleeper = TokioSleeper;
    let controller = RunController::new(
        &factory,
        &credentials,
        RunSettings::from_config(&config),
        config.session.to_delay_policy(),
        &sleeper,
    );

    let summary = controller
        .run(config.storage.ledger_path.clone())
        .await
        .context("下载运行中止")?;

    match summary.outcome {
        RunOutcome::Complete => info!(
            "全部完成: 新下载 {} 个配置，记录共 {} 个",
            summary.downloaded, summary.ledger_size
        ),
        RunOutcome::ExhaustedAttempts => warn!(
            "{} 个会话已用完，新下载 {} 个配置，重新运行可继续剩余部分",
            summary.sessions, summary.downloaded
        ),
        RunOutcome::AbortedAuthFailure => {
            anyhow::bail!("登录失败，运行已中止（新下载 {} 个配置）", summary.downloaded)
        }
    }

    Ok(())
}
