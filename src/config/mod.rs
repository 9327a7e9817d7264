// 配置管理模块

pub mod credentials;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;

pub use credentials::{ConfigError, Credentials, PASSWORD_ENV, USERNAME_ENV};

use crate::downloader::{DelayPolicy, PacingPolicy};

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

/// 覆盖配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "HARVESTER_CONFIG";

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 门户站点配置
    #[serde(default)]
    pub portal: PortalConfig,
    /// 会话配置
    #[serde(default)]
    pub session: SessionConfig,
    /// 存储配置
    #[serde(default)]
    pub storage: StorageConfig,
    /// WebDriver 配置
    #[serde(default)]
    pub webdriver: WebDriverConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 单个日志文件最大大小（字节，默认 10MB）
    #[serde(default = "default_log_max_file_size")]
    pub max_file_size: u64,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_max_file_size() -> u64 {
    10 * 1024 * 1024 // 10MB
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
            max_file_size: default_log_max_file_size(),
        }
    }
}

/// 门户站点配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// 首页地址（登录入口）
    #[serde(default = "default_home_url")]
    pub home_url: String,
    /// 登出地址
    #[serde(default = "default_logout_url")]
    pub logout_url: String,
    /// 目标分类（按名称子串匹配，例如国家名）
    #[serde(default = "default_target_category")]
    pub target_category: String,
}

fn default_home_url() -> String {
    "https://protonvpn.com/".to_string()
}

fn default_logout_url() -> String {
    "https://account.protonvpn.com/logout".to_string()
}

fn default_target_category() -> String {
    "United States".to_string()
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            home_url: default_home_url(),
            logout_url: default_logout_url(),
            target_category: default_target_category(),
        }
    }
}

/// 会话配置
///
/// 控制单次会话的下载配额、会话总数上限以及各类等待时间
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// 单次会话最大下载数，达到后登出并等待冷却
    #[serde(default = "default_max_downloads_per_session")]
    pub max_downloads_per_session: u32,
    /// 单次运行最多会话数
    #[serde(default = "default_max_sessions")]
    pub max_sessions: u32,
    /// 两次会话之间的冷却时间（秒）
    #[serde(default = "default_relogin_delay_secs")]
    pub relogin_delay_secs: u64,
    /// 下载间隔下限（秒）
    #[serde(default = "default_pacing_min_secs")]
    pub pacing_min_secs: u64,
    /// 下载间隔上限（秒）
    #[serde(default = "default_pacing_max_secs")]
    pub pacing_max_secs: u64,
    /// 页面元素等待超时（秒）
    #[serde(default = "default_element_wait_secs")]
    pub element_wait_secs: u64,
    /// 下载确认/遮罩消失等待超时（秒）
    #[serde(default = "default_download_wait_secs")]
    pub download_wait_secs: u64,
}

fn default_max_downloads_per_session() -> u32 {
    20
}
fn default_max_sessions() -> u32 {
    10
}
fn default_relogin_delay_secs() -> u64 {
    120
}
fn default_pacing_min_secs() -> u64 {
    60
}
fn default_pacing_max_secs() -> u64 {
    90
}
fn default_element_wait_secs() -> u64 {
    10
}
fn default_download_wait_secs() -> u64 {
    30
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_downloads_per_session: default_max_downloads_per_session(),
            max_sessions: default_max_sessions(),
            relogin_delay_secs: default_relogin_delay_secs(),
            pacing_min_secs: default_pacing_min_secs(),
            pacing_max_secs: default_pacing_max_secs(),
            element_wait_secs: default_element_wait_secs(),
            download_wait_secs: default_download_wait_secs(),
        }
    }
}

impl SessionConfig {
    /// 校验会话参数
    pub fn validate(&self) -> Result<()> {
        if self.max_downloads_per_session == 0 {
            anyhow::bail!("max_downloads_per_session 必须大于 0");
        }
        if self.max_sessions == 0 {
            anyhow::bail!("max_sessions 必须大于 0");
        }
        if self.pacing_min_secs > self.pacing_max_secs {
            anyhow::bail!(
                "下载间隔配置无效: pacing_min_secs={} > pacing_max_secs={}",
                self.pacing_min_secs,
                self.pacing_max_secs
            );
        }
        Ok(())
    }

    /// 转换为调度使用的延迟策略
    pub fn to_delay_policy(&self) -> DelayPolicy {
        DelayPolicy {
            cooldown: Duration::from_secs(self.relogin_delay_secs),
            pacing: PacingPolicy::new(
                Duration::from_secs(self.pacing_min_secs),
                Duration::from_secs(self.pacing_max_secs),
            ),
        }
    }
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 配置文件下载目录（浏览器自动保存到此处）
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// 已下载服务器 ID 记录文件
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
}

fn working_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn default_download_dir() -> PathBuf {
    working_dir().join("downloaded_configs")
}

fn default_ledger_path() -> PathBuf {
    working_dir().join("downloaded_server_ids.json")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            ledger_path: default_ledger_path(),
        }
    }
}

impl StorageConfig {
    /// 确保下载目录存在（不存在则自动创建）
    ///
    /// Chrome 的下载偏好要求绝对路径，相对路径会基于当前工作目录展开
    pub fn ensure_download_dir(&self) -> Result<PathBuf> {
        let dir = if self.download_dir.is_absolute() {
            self.download_dir.clone()
        } else {
            working_dir().join(&self.download_dir)
        };

        if !dir.exists() {
            std::fs::create_dir_all(&dir).with_context(|| format!("无法创建下载目录: {:?}", dir))?;
            tracing::info!("已创建下载目录: {:?}", dir);
        }

        Ok(dir)
    }
}

/// WebDriver 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebDriverConfig {
    /// WebDriver 服务地址（例如 chromedriver）
    #[serde(default = "default_webdriver_url")]
    pub url: String,
    /// 是否无头模式
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// 窗口宽度
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    /// 窗口高度
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    /// 隐式等待（秒）
    #[serde(default = "default_implicit_wait_secs")]
    pub implicit_wait_secs: u64,
    /// 显式等待轮询间隔（毫秒）
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}
fn default_headless() -> bool {
    true
}
fn default_window_width() -> u32 {
    1936
}
fn default_window_height() -> u32 {
    1048
}
fn default_implicit_wait_secs() -> u64 {
    10
}
fn default_poll_interval_ms() -> u64 {
    500
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: default_webdriver_url(),
            headless: default_headless(),
            window_width: default_window_width(),
            window_height: default_window_height(),
            implicit_wait_secs: default_implicit_wait_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl AppConfig {
    /// 解析配置文件路径（环境变量优先）
    pub fn resolve_path() -> String {
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
    }

    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;

        config
            .session
            .validate()
            .context("配置文件中的会话参数验证失败")?;

        Ok(config)
    }
}
