//! 运行控制
//!
//! 顺序执行有限次数的会话，直到目标分组全部下载完成、会话次数用尽或登录失败。
//! 每个通过登录的会话结束后都会把记录写回磁盘，进程在冷却期间被杀掉也不会丢失进度。

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{error, info, warn};

use super::engine::ItemIterationEngine;
use super::pacing::{DelayKind, DelayPolicy, Sleeper};
use super::session::SessionManager;
use super::task::{RunOutcome, RunSummary, SessionOutcome};
use crate::config::{AppConfig, Credentials};
use crate::persistence::DedupLedger;
use crate::portal::PortalFactory;
use crate::webdriver::WebDriverError;

/// 运行级错误（无法继续任何会话）
#[derive(Debug, Error)]
pub enum RunError {
    /// 无法创建浏览器会话
    #[error("无法创建浏览器会话: {0}")]
    Context(#[source] WebDriverError),

    /// 记录写入失败
    #[error("保存下载记录失败: {0}")]
    Ledger(#[from] io::Error),
}

/// 运行参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// 最多执行的会话数
    pub max_sessions: u32,
    /// 单会话下载上限
    pub quota: u32,
    /// 目标分组（名称子串）
    pub target_category: String,
}

impl RunSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_sessions: config.session.max_sessions,
            quota: config.session.max_downloads_per_session,
            target_category: config.portal.target_category.clone(),
        }
    }
}

/// 运行控制器
pub struct RunController<'a> {
    factory: &'a dyn PortalFactory,
    credentials: &'a Credentials,
    settings: RunSettings,
    delays: DelayPolicy,
    sleeper: &'a dyn Sleeper,
}

impl<'a> RunController<'a> {
    pub fn new(
        factory: &'a dyn PortalFactory,
        credentials: &'a Credentials,
        settings: RunSettings,
        delays: DelayPolicy,
        sleeper: &'a dyn Sleeper,
    ) -> Self {
        Self {
            factory,
            credentials,
            settings,
            delays,
            sleeper,
        }
    }

    /// 从磁盘加载记录并执行
    pub async fn run(&self, ledger_path: impl Into<PathBuf>) -> Result<RunSummary, RunError> {
        let mut ledger = DedupLedger::load(ledger_path);
        self.run_with_ledger(&mut ledger).await
    }

    /// 使用给定记录执行
    pub async fn run_with_ledger(&self, ledger: &mut DedupLedger) -> Result<RunSummary, RunError> {
        let engine = ItemIterationEngine::new(
            self.settings.target_category.clone(),
            self.settings.quota,
            self.delays.pacing,
            self.sleeper,
        );
        let session = SessionManager::new(self.factory, self.credentials, &engine);

        let initial = ledger.len();
        let max_sessions = self.settings.max_sessions;
        let mut sessions = 0;
        let mut outcome = RunOutcome::ExhaustedAttempts;

        info!(
            "开始下载: 目标分组=\"{}\", 最多 {} 个会话, 每会话最多 {} 个",
            self.settings.target_category, max_sessions, self.settings.quota
        );

        for index in 1..=max_sessions {
            info!("###### 开始会话 {}/{} ######", index, max_sessions);
            sessions = index;

            let report = session.run(index, ledger).await?;
            info!(
                "###### 会话 {} 结束: 下载 {} 个, 结果 {:?} ######",
                index, report.downloaded, report.outcome
            );

            match report.outcome {
                SessionOutcome::AuthFailed => {
                    error!("登录失败，终止运行（请检查账号密码）");
                    outcome = RunOutcome::AbortedAuthFailure;
                    break;
                }
                SessionOutcome::Finished => {
                    self.persist(ledger)?;
                    info!("目标分组的所有配置均已下载");
                    outcome = RunOutcome::Complete;
                    break;
                }
                SessionOutcome::Unfinished(reason) => {
                    self.persist(ledger)?;
                    if index < max_sessions {
                        info!(
                            "会话未完成（{:?}），冷却 {} 秒后开始下一个会话",
                            reason,
                            self.delays.cooldown.as_secs()
                        );
                        self.sleeper
                            .sleep(self.delays.cooldown, DelayKind::Cooldown)
                            .await;
                    }
                }
            }
        }

        if outcome == RunOutcome::ExhaustedAttempts {
            warn!("已达到最大会话数 {}，仍有未下载的配置", max_sessions);
        }

        let summary = RunSummary {
            outcome,
            sessions,
            downloaded: ledger.len().saturating_sub(initial),
            ledger_size: ledger.len(),
        };
        info!(
            "运行结束: {:?}, 会话 {} 个, 新下载 {} 个, 记录共 {} 个",
            summary.outcome, summary.sessions, summary.downloaded, summary.ledger_size
        );
        Ok(summary)
    }

    fn persist(&self, ledger: &DedupLedger) -> Result<(), RunError> {
        ledger.save().map_err(|e| {
            error!("保存下载记录失败: {:?}, 错误: {}", ledger.path(), e);
            RunError::Ledger(e)
        })?;
        info!("下载记录已保存: {} 个 ID", ledger.len());
        Ok(())
    }
}
