// VPN Config Harvester
// 会话化、去重的配置文件批量下载

// 配置管理模块
pub mod config;

// 下载调度模块（运行控制、会话生命周期、条目遍历）
pub mod downloader;

// 日志模块
pub mod logging;

// 下载记录持久化模块
pub mod persistence;

// 门户站点适配模块
pub mod portal;

// WebDriver 协议客户端
pub mod webdriver;

// 导出常用类型
pub use config::{AppConfig, Credentials};
pub use downloader::{
    DelayPolicy, PacingPolicy, RunController, RunError, RunOutcome, RunSettings, RunSummary,
    TokioSleeper,
};
pub use persistence::DedupLedger;
pub use portal::{Portal, PortalFactory, ProtonPortalFactory};
pub use webdriver::{WebDriverClient, WebDriverError};
