use serde::{Deserialize, Serialize};
use tracing::debug;

/// 会话阶段
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// 尚未创建浏览器
    Init,
    /// 登录中
    Authenticating,
    /// 已登录
    Authenticated,
    /// 进入下载页面中
    Navigating,
    /// 浏览列表并下载
    Downloading,
    /// 登出中
    LoggingOut,
    /// 浏览器已关闭
    Terminated,
}

/// 单次会话状态
///
/// 每个会话新建一份，下载计数从零开始；不会被持久化
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// 会话序号（从 1 开始）
    pub index: u32,
    /// 当前阶段
    pub phase: SessionPhase,
    /// 本会话已成功下载数
    pub downloaded: u32,
}

impl SessionState {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            phase: SessionPhase::Init,
            downloaded: 0,
        }
    }

    /// 进入下一阶段
    pub fn advance(&mut self, phase: SessionPhase) {
        debug!("会话 {} 阶段: {:?} -> {:?}", self.index, self.phase, phase);
        self.phase = phase;
    }

    /// 是否已经通过登录
    pub fn is_authenticated(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::Authenticated
                | SessionPhase::Navigating
                | SessionPhase::Downloading
        )
    }
}

/// 单个条目的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// 已在记录中，跳过
    AlreadyDownloaded,
    /// 下载成功
    Downloaded,
    /// 达到会话配额，推迟到下一个会话
    Deferred,
    /// 下载失败，结束本会话
    Failed(ItemFailure),
}

/// 条目下载失败原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemFailure {
    /// 等待超时或点击被遮挡，疑似限流
    RateLimited(String),
    /// 其他未预期错误
    Unexpected(String),
}

impl std::fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemFailure::RateLimited(detail) => write!(f, "疑似触发限流或会话失效: {}", detail),
            ItemFailure::Unexpected(detail) => write!(f, "未预期错误: {}", detail),
        }
    }
}

/// 会话未完成的原因
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnfinishedReason {
    /// 达到单会话下载上限
    QuotaReached,
    /// 页面上没有目标分组（列表可能尚未渲染）
    CategoryNotFound,
    /// 读取分组列表失败
    ListingFailed,
    /// 某个条目下载失败
    DownloadFailed,
    /// 进入下载页面失败
    NavigationFailed,
}

/// 条目遍历结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    /// 目标分组的所有条目都已处理
    Finished,
    /// 还有剩余工作
    Unfinished(UnfinishedReason),
}

/// 会话结果
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    /// 目标分组已全部完成
    Finished,
    /// 需要冷却后开启新会话
    Unfinished(UnfinishedReason),
    /// 登录失败，终止运行
    AuthFailed,
}

impl From<IterationOutcome> for SessionOutcome {
    fn from(outcome: IterationOutcome) -> Self {
        match outcome {
            IterationOutcome::Finished => SessionOutcome::Finished,
            IterationOutcome::Unfinished(reason) => SessionOutcome::Unfinished(reason),
        }
    }
}

/// 会话报告
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub index: u32,
    pub downloaded: u32,
    pub outcome: SessionOutcome,
}

/// 运行结果
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// 全部完成
    Complete,
    /// 会话次数用尽
    ExhaustedAttempts,
    /// 登录失败而中止
    AbortedAuthFailure,
}

/// 运行汇总
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    /// 实际执行的会话数
    pub sessions: u32,
    /// 本次运行新增的下载数
    pub downloaded: usize,
    /// 记录中的 ID 总数
    pub ledger_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_state() {
        let state = SessionState::new(3);
        assert_eq!(state.index, 3);
        assert_eq!(state.phase, SessionPhase::Init);
        assert_eq!(state.downloaded, 0);
        assert!(!state.is_authenticated());
    }

    #[test]
    fn test_is_authenticated_by_phase() {
        let mut state = SessionState::new(1);
        state.advance(SessionPhase::Authenticating);
        assert!(!state.is_authenticated());
        state.advance(SessionPhase::Authenticated);
        assert!(state.is_authenticated());
        state.advance(SessionPhase::Downloading);
        assert!(state.is_authenticated());
    }

    #[test]
    fn test_iteration_to_session_outcome() {
        assert_eq!(
            SessionOutcome::from(IterationOutcome::Finished),
            SessionOutcome::Finished
        );
        assert_eq!(
            SessionOutcome::from(IterationOutcome::Unfinished(UnfinishedReason::QuotaReached)),
            SessionOutcome::Unfinished(UnfinishedReason::QuotaReached)
        );
    }

    #[test]
    fn test_item_failure_display_keeps_detail() {
        let failure = ItemFailure::RateLimited("confirm button".to_string());
        assert!(failure.to_string().contains("confirm button"));
        let failure = ItemFailure::Unexpected("boom".to_string());
        assert!(failure.to_string().contains("boom"));
    }

    #[test]
    fn test_run_outcome_serialization() {
        let json = serde_json::to_string(&RunOutcome::AbortedAuthFailure).unwrap();
        assert_eq!(json, "\"aborted_auth_failure\"");
    }
}
