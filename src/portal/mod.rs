//! 门户站点适配层
//!
//! 下载调度只通过 [`Portal`] / [`PortalFactory`] 与浏览器交互，
//! 页面结构与选择器全部封装在具体实现（[`proton::ProtonPortal`]）中。

pub mod proton;

use async_trait::async_trait;

use crate::config::Credentials;
use crate::webdriver::{ElementRef, WebDriverError};

pub use proton::{ProtonPortal, ProtonPortalFactory};

/// 本次会话中发现的可下载条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    /// 服务器 ID（去重键）
    pub id: String,
    /// 所属分组名称
    pub category: String,
    /// 触发下载的按钮
    pub handle: ElementRef,
}

/// 目标分组的当前列表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryListing {
    /// 分组名称（例如国家名）
    pub label: String,
    /// 按页面顺序排列的条目
    pub items: Vec<CandidateItem>,
}

/// 一个已打开的浏览器会话
#[async_trait]
pub trait Portal: Send {
    /// 提交账号密码
    async fn login(&mut self, credentials: &Credentials) -> Result<(), WebDriverError>;

    /// 进入下载页面
    async fn open_downloads(&mut self) -> Result<(), WebDriverError>;

    /// 列出名称包含 `filter` 的第一个分组，找不到时返回 `None`
    async fn list_category(&mut self, filter: &str)
        -> Result<Option<CategoryListing>, WebDriverError>;

    /// 下载单个条目：触发、确认、等待遮罩消失
    async fn download(&mut self, item: &CandidateItem) -> Result<(), WebDriverError>;

    /// 登出（尽力而为，调用方忽略结果）
    async fn logout(&mut self) -> Result<(), WebDriverError>;

    /// 释放浏览器会话
    async fn close(&mut self) -> Result<(), WebDriverError>;
}

/// 浏览器会话工厂，每个下载会话获取一个全新的实例
#[async_trait]
pub trait PortalFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn Portal>, WebDriverError>;
}

/// 从分组标题文本中提取分组名称（取第一行）
pub fn category_label(summary_text: &str) -> String {
    summary_text.lines().next().unwrap_or("").trim().to_string()
}

/// 分组名称是否匹配目标（子串匹配）
pub fn matches_category(label: &str, filter: &str) -> bool {
    !filter.is_empty() && label.contains(filter)
}
