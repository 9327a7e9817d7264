//! 会话生命周期
//!
//! ```text
//! Init → Authenticating → Authenticated → Navigating → Downloading → LoggingOut → Terminated
//! ```
//!
//! - 登录失败：会话返回 `AuthFailed`，由调用方终止整个运行
//! - 进入下载页面失败：本会话不下载，冷却后重试
//! - 登出：尽力而为，失败只记录日志
//! - 浏览器在任何退出路径上都会被关闭，包括会话内部 panic（关闭后继续向上抛出）

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{error, info, warn};

use super::engine::ItemIterationEngine;
use super::manager::RunError;
use super::task::{SessionOutcome, SessionPhase, SessionReport, SessionState, UnfinishedReason};
use crate::config::Credentials;
use crate::persistence::DedupLedger;
use crate::portal::{Portal, PortalFactory};

/// 会话生命周期管理
pub struct SessionManager<'a> {
    factory: &'a dyn PortalFactory,
    credentials: &'a Credentials,
    engine: &'a ItemIterationEngine<'a>,
}

impl<'a> SessionManager<'a> {
    pub fn new(
        factory: &'a dyn PortalFactory,
        credentials: &'a Credentials,
        engine: &'a ItemIterationEngine<'a>,
    ) -> Self {
        Self {
            factory,
            credentials,
            engine,
        }
    }

    /// 执行一个完整会话
    ///
    /// 只有无法创建浏览器会话时返回错误，其余失败都体现在 `SessionOutcome` 中
    pub async fn run(&self, index: u32, ledger: &mut DedupLedger) -> Result<SessionReport, RunError> {
        let mut state = SessionState::new(index);

        state.advance(SessionPhase::Authenticating);
        let mut portal = self.factory.open().await.map_err(RunError::Context)?;

        let body = AssertUnwindSafe(self.drive(portal.as_mut(), ledger, &mut state))
            .catch_unwind()
            .await;

        let reached_login = state.is_authenticated();
        state.advance(SessionPhase::LoggingOut);
        if reached_login && body.is_ok() {
            Self::logout(portal.as_mut()).await;
        }

        if let Err(e) = portal.close().await {
            warn!("关闭浏览器失败: {}", e);
        }
        state.advance(SessionPhase::Terminated);

        match body {
            Ok(outcome) => Ok(SessionReport {
                index,
                downloaded: state.downloaded,
                outcome,
            }),
            Err(panic) => {
                error!("会话 {} 异常中断，浏览器已关闭", index);
                std::panic::resume_unwind(panic)
            }
        }
    }

    async fn drive(
        &self,
        portal: &mut dyn Portal,
        ledger: &mut DedupLedger,
        state: &mut SessionState,
    ) -> SessionOutcome {
        if let Err(e) = portal.login(self.credentials).await {
            error!("登录失败: {}", e);
            return SessionOutcome::AuthFailed;
        }
        state.advance(SessionPhase::Authenticated);

        state.advance(SessionPhase::Navigating);
        if let Err(e) = portal.open_downloads().await {
            warn!("进入下载页面失败，本会话不下载: {}", e);
            return SessionOutcome::Unfinished(UnfinishedReason::NavigationFailed);
        }

        state.advance(SessionPhase::Downloading);
        self.engine.run(portal, ledger, state).await.into()
    }

    /// 尽力登出，结果被忽略
    async fn logout(portal: &mut dyn Portal) {
        match portal.logout().await {
            Ok(()) => info!("已登出"),
            Err(e) => warn!("登出失败（忽略）: {}", e),
        }
    }
}
