// Proton 账户门户实现
//
// 所有页面选择器集中在这里，站点改版时只需要修改本文件

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{category_label, matches_category, CandidateItem, CategoryListing, Portal, PortalFactory};
use crate::config::{Credentials, PortalConfig, SessionConfig, WebDriverConfig};
use crate::webdriver::{ChromeCapabilities, ElementRef, Locator, WebDriverClient, WebDriverError};

/// 首页上的登录入口
const LOGIN_LINK: Locator<'static> =
    Locator::XPath("//a[contains(@href, 'https://account.protonvpn.com/login')]");
const USERNAME_FIELD: Locator<'static> = Locator::Id("username");
const PASSWORD_FIELD: Locator<'static> = Locator::Id("password");
/// 登录表单的"继续"/"登录"按钮
const SUBMIT_BUTTON: Locator<'static> = Locator::Css(".button-large");
/// 登录成功后出现的侧边导航
const ACCOUNT_NAVIGATION: Locator<'static> = Locator::Css(".navigation-item");
/// 侧边导航中的"下载"入口
const DOWNLOADS_LINK: Locator<'static> = Locator::Css(".navigation-item:nth-child(7) .text-ellipsis");
/// OpenVPN 配置页签
const OPENVPN_TAB: Locator<'static> = Locator::Css(".flex:nth-child(4) > .mr-8:nth-child(3) > .relative");
/// 每个国家一个 <details> 分组
const CATEGORY_BLOCKS: Locator<'static> = Locator::Css(".mb-6 details");
const CATEGORY_SUMMARY: Locator<'static> = Locator::Css("summary");
const TABLE_ROWS: Locator<'static> = Locator::Css("tr");
/// 第一列为服务器 ID
const ID_CELL: Locator<'static> = Locator::Css("td:nth-child(1)");
const ROW_BUTTON: Locator<'static> = Locator::Css(".button");
/// 下载确认弹窗中的确认按钮
const CONFIRM_BUTTON: Locator<'static> = Locator::Css(".button-solid-norm:nth-child(2)");
/// 弹窗遮罩，存在时会拦截点击
const MODAL_BACKDROP: Locator<'static> = Locator::ClassName("modal-two-backdrop");
/// 登出接口失败时的界面入口
const AVATAR_MENU: Locator<'static> = Locator::Css(".p-1");
const SIGN_OUT_BUTTON: Locator<'static> = Locator::Css(".mb-4 > .button");

/// 页面操作之间的停顿
const STEP_DELAY: Duration = Duration::from_secs(1);
const SHORT_STEP_DELAY: Duration = Duration::from_millis(500);
/// 提交密码后等待页面跳转
const LOGIN_SETTLE_DELAY: Duration = Duration::from_secs(3);

/// 显式等待超时
#[derive(Debug, Clone, Copy)]
pub struct PortalWaits {
    /// 普通页面元素
    pub element: Duration,
    /// 下载确认与遮罩消失
    pub download: Duration,
}

impl PortalWaits {
    pub fn from_session_config(config: &SessionConfig) -> Self {
        Self {
            element: Duration::from_secs(config.element_wait_secs),
            download: Duration::from_secs(config.download_wait_secs),
        }
    }
}

/// Proton 账户门户
pub struct ProtonPortal {
    driver: WebDriverClient,
    config: PortalConfig,
    waits: PortalWaits,
}

impl ProtonPortal {
    pub fn new(driver: WebDriverClient, config: PortalConfig, waits: PortalWaits) -> Self {
        Self {
            driver,
            config,
            waits,
        }
    }

    async fn fill(&self, locator: Locator<'_>, text: &str) -> Result<(), WebDriverError> {
        let field = self.driver.find(locator).await?;
        self.driver.clear(&field).await?;
        self.driver.send_keys(&field, text).await
    }

    async fn click(&self, locator: Locator<'_>) -> Result<(), WebDriverError> {
        let element = self.driver.find(locator).await?;
        self.driver.click(&element).await
    }

    async fn logout_via_ui(&self) -> Result<(), WebDriverError> {
        self.click(AVATAR_MENU).await?;
        tokio::time::sleep(STEP_DELAY).await;
        self.click(SIGN_OUT_BUTTON).await?;
        tokio::time::sleep(STEP_DELAY).await;
        Ok(())
    }

    /// 读取分组内的条目，无法识别的行跳过
    async fn read_rows(
        &self,
        block: &ElementRef,
        label: &str,
    ) -> Result<Vec<CandidateItem>, WebDriverError> {
        let rows = self.driver.find_all_in(block, TABLE_ROWS).await?;
        let mut items = Vec::with_capacity(rows.len().saturating_sub(1));

        // 第一行为表头
        for (index, row) in rows.iter().skip(1).enumerate() {
            let id = match self.driver.find_in(row, ID_CELL).await {
                Ok(cell) => self.driver.text(&cell).await.map(|t| t.trim().to_string()),
                Err(e) => Err(e),
            };
            let id = match id {
                Ok(id) if !id.is_empty() => id,
                Ok(_) => {
                    warn!("第 {} 行服务器 ID 为空，跳过", index);
                    continue;
                }
                Err(e) => {
                    warn!("无法读取第 {} 行的服务器 ID，跳过: {}", index, e);
                    continue;
                }
            };

            match self.driver.find_in(row, ROW_BUTTON).await {
                Ok(handle) => items.push(CandidateItem {
                    id,
                    category: label.to_string(),
                    handle,
                }),
                Err(e) => warn!("无法找到下载按钮 (服务器 ID: {})，跳过: {}", id, e),
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl Portal for ProtonPortal {
    async fn login(&mut self, credentials: &Credentials) -> Result<(), WebDriverError> {
        self.driver.goto(&self.config.home_url).await?;
        tokio::time::sleep(STEP_DELAY).await;

        self.click(LOGIN_LINK).await?;
        tokio::time::sleep(STEP_DELAY).await;

        self.fill(USERNAME_FIELD, &credentials.username).await?;
        tokio::time::sleep(STEP_DELAY).await;
        self.click(SUBMIT_BUTTON).await?;
        tokio::time::sleep(STEP_DELAY).await;

        self.fill(PASSWORD_FIELD, &credentials.password).await?;
        tokio::time::sleep(STEP_DELAY).await;
        self.click(SUBMIT_BUTTON).await?;
        tokio::time::sleep(LOGIN_SETTLE_DELAY).await;

        // 账户导航出现才算登录成功，否则密码错误也会被当成成功。
        // 页面渲染过慢同样会在这里超时，结果是登录失败并中止运行，而不是可重试的导航失败
        self.driver
            .wait_clickable(ACCOUNT_NAVIGATION, self.waits.element)
            .await?;

        info!("登录成功: {}", credentials.username);
        Ok(())
    }

    async fn open_downloads(&mut self) -> Result<(), WebDriverError> {
        let link = self
            .driver
            .wait_clickable(DOWNLOADS_LINK, self.waits.element)
            .await?;
        self.driver.click(&link).await?;
        tokio::time::sleep(Duration::from_secs(2)).await;

        info!("已进入下载页面");
        Ok(())
    }

    async fn list_category(
        &mut self,
        filter: &str,
    ) -> Result<Option<CategoryListing>, WebDriverError> {
        self.driver.execute("window.scrollTo(0,0)", vec![]).await?;
        tokio::time::sleep(STEP_DELAY).await;

        if let Err(e) = self.click(OPENVPN_TAB).await {
            debug!("切换 OpenVPN 页签失败（可能已选中）: {}", e);
        } else {
            tokio::time::sleep(STEP_DELAY).await;
        }

        let blocks = self.driver.find_all(CATEGORY_BLOCKS).await?;
        info!("共找到 {} 个国家分组", blocks.len());

        for block in &blocks {
            let summary = self.driver.find_in(block, CATEGORY_SUMMARY).await?;
            let label = category_label(&self.driver.text(&summary).await?);

            if !matches_category(&label, filter) {
                continue;
            }

            self.driver
                .execute("arguments[0].open = true;", vec![block.to_json()])
                .await?;
            tokio::time::sleep(SHORT_STEP_DELAY).await;

            let items = self.read_rows(block, &label).await?;
            return Ok(Some(CategoryListing { label, items }));
        }

        Ok(None)
    }

    async fn download(&mut self, item: &CandidateItem) -> Result<(), WebDriverError> {
        self.driver.scroll_into_view(&item.handle).await?;
        tokio::time::sleep(SHORT_STEP_DELAY).await;

        self.driver.click(&item.handle).await?;

        let confirm = self
            .driver
            .wait_clickable(CONFIRM_BUTTON, self.waits.download)
            .await?;
        self.driver.click(&confirm).await?;

        self.driver
            .wait_invisible(MODAL_BACKDROP, self.waits.download)
            .await
    }

    async fn logout(&mut self) -> Result<(), WebDriverError> {
        match self.driver.goto(&self.config.logout_url).await {
            Ok(()) => {
                tokio::time::sleep(STEP_DELAY).await;
                info!("登出成功");
                Ok(())
            }
            Err(e) => {
                debug!("登出地址访问失败，尝试通过界面登出: {}", e);
                self.logout_via_ui().await?;
                info!("通过界面登出成功");
                Ok(())
            }
        }
    }

    async fn close(&mut self) -> Result<(), WebDriverError> {
        self.driver.quit().await
    }
}

/// 为每个会话启动新的 Chrome 实例
#[derive(Debug, Clone)]
pub struct ProtonPortalFactory {
    webdriver: WebDriverConfig,
    portal: PortalConfig,
    waits: PortalWaits,
    download_dir: PathBuf,
}

impl ProtonPortalFactory {
    pub fn new(
        webdriver: WebDriverConfig,
        portal: PortalConfig,
        waits: PortalWaits,
        download_dir: PathBuf,
    ) -> Self {
        Self {
            webdriver,
            portal,
            waits,
            download_dir,
        }
    }

    fn capabilities(&self) -> ChromeCapabilities {
        ChromeCapabilities {
            headless: self.webdriver.headless,
            window_width: self.webdriver.window_width,
            window_height: self.webdriver.window_height,
            download_dir: self.download_dir.to_string_lossy().into_owned(),
        }
    }
}

#[async_trait]
impl PortalFactory for ProtonPortalFactory {
    async fn open(&self) -> Result<Box<dyn Portal>, WebDriverError> {
        let driver = WebDriverClient::connect(
            &self.webdriver.url,
            &self.capabilities(),
            Duration::from_millis(self.webdriver.poll_interval_ms),
        )
        .await?;

        let prepared = async {
            driver
                .set_window_size(self.webdriver.window_width, self.webdriver.window_height)
                .await?;
            driver
                .set_implicit_wait(Duration::from_secs(self.webdriver.implicit_wait_secs))
                .await
        }
        .await;

        // 会话已创建，初始化失败也要关闭浏览器
        if let Err(e) = prepared {
            if let Err(quit_err) = driver.quit().await {
                warn!("关闭浏览器会话失败: {}", quit_err);
            }
            return Err(e);
        }

        info!("浏览器初始化完成 (headless={})", self.webdriver.headless);
        Ok(Box::new(ProtonPortal::new(
            driver,
            self.portal.clone(),
            self.waits,
        )))
    }
}
