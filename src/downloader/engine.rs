//! 条目遍历引擎
//!
//! 在一个已登录的会话内遍历目标分组的条目：
//! - 已记录的 ID 直接跳过（集合查询）
//! - 达到单会话配额时停止，剩余条目留给下一个会话
//! - 任意一个条目下载失败都视为会话级失败，立即结束本会话，不在同一会话内重试

use tracing::{error, info, warn};

use super::pacing::{DelayKind, PacingPolicy, Sleeper};
use super::task::{ItemFailure, ItemOutcome, IterationOutcome, SessionState, UnfinishedReason};
use crate::persistence::DedupLedger;
use crate::portal::{CandidateItem, Portal};

/// 条目遍历引擎
pub struct ItemIterationEngine<'a> {
    /// 目标分组（名称子串）
    target_category: String,
    /// 单会话下载上限
    quota: u32,
    /// 下载间隔
    pacing: PacingPolicy,
    sleeper: &'a dyn Sleeper,
}

impl<'a> ItemIterationEngine<'a> {
    pub fn new(
        target_category: impl Into<String>,
        quota: u32,
        pacing: PacingPolicy,
        sleeper: &'a dyn Sleeper,
    ) -> Self {
        Self {
            target_category: target_category.into(),
            quota,
            pacing,
            sleeper,
        }
    }

    pub fn quota(&self) -> u32 {
        self.quota
    }

    /// 遍历目标分组
    pub async fn run(
        &self,
        portal: &mut dyn Portal,
        ledger: &mut DedupLedger,
        state: &mut SessionState,
    ) -> IterationOutcome {
        info!("记录中已有 {} 个已下载的服务器 ID", ledger.len());

        let listing = match portal.list_category(&self.target_category).await {
            Ok(Some(listing)) => listing,
            Ok(None) => {
                warn!(
                    "未找到目标分组 \"{}\"（列表可能尚未加载），下个会话重试",
                    self.target_category
                );
                return IterationOutcome::Unfinished(UnfinishedReason::CategoryNotFound);
            }
            Err(e) => {
                error!("读取分组列表失败，结束本会话: {}", e);
                return IterationOutcome::Unfinished(UnfinishedReason::ListingFailed);
            }
        };

        info!(
            "--- 处理目标分组: {} ({} 个配置) ---",
            listing.label,
            listing.items.len()
        );

        for item in &listing.items {
            match self.process_item(portal, ledger, state, item).await {
                ItemOutcome::AlreadyDownloaded | ItemOutcome::Downloaded => {}
                ItemOutcome::Deferred => {
                    return IterationOutcome::Unfinished(UnfinishedReason::QuotaReached);
                }
                ItemOutcome::Failed(failure) => {
                    error!(
                        "下载配置失败 (分组: {}, 服务器 ID: {})，结束本会话，下个会话重试: {}",
                        item.category, item.id, failure
                    );
                    return IterationOutcome::Unfinished(UnfinishedReason::DownloadFailed);
                }
            }
        }

        info!("分组 {} 的所有配置已在本次运行中处理完成", listing.label);
        IterationOutcome::Finished
    }

    /// 处理单个条目
    pub async fn process_item(
        &self,
        portal: &mut dyn Portal,
        ledger: &mut DedupLedger,
        state: &mut SessionState,
        item: &CandidateItem,
    ) -> ItemOutcome {
        if ledger.contains(&item.id) {
            info!("跳过配置 (服务器 ID: {})，已下载过", item.id);
            return ItemOutcome::AlreadyDownloaded;
        }

        if state.downloaded >= self.quota {
            info!(
                "已达到单会话下载上限 ({})，停止并准备重新登录",
                self.quota
            );
            return ItemOutcome::Deferred;
        }

        match portal.download(item).await {
            Ok(()) => {
                state.downloaded += 1;
                ledger.add(item.id.clone());

                let delay = self.pacing.next_delay();
                info!(
                    "下载成功 (服务器 ID: {})，本会话共 {} 个，等待 {:.1}s...",
                    item.id,
                    state.downloaded,
                    delay.as_secs_f64()
                );
                self.sleeper.sleep(delay, DelayKind::Pacing).await;

                ItemOutcome::Downloaded
            }
            Err(e) if e.is_rate_limit_signal() => {
                ItemOutcome::Failed(ItemFailure::RateLimited(e.to_string()))
            }
            Err(e) => ItemOutcome::Failed(ItemFailure::Unexpected(e.to_string())),
        }
    }
}
