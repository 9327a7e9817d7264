//! 测试用的脚本化门户与记录型等待

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::pacing::{DelayKind, Sleeper};
use crate::config::Credentials;
use crate::portal::{CandidateItem, CategoryListing, Portal, PortalFactory};
use crate::webdriver::{ElementRef, WebDriverError};

pub const CATEGORY: &str = "United States";

/// 单个条目的下载失败方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Timeout,
    Intercepted,
    Other,
    Panic,
}

/// 列表页面的表现
#[derive(Debug, Clone)]
pub enum Listing {
    Items(Vec<String>),
    Missing,
    Broken,
}

/// 一个会话的脚本
#[derive(Debug, Clone)]
pub struct SessionScript {
    pub login_ok: bool,
    pub navigation_ok: bool,
    pub logout_ok: bool,
    pub listing: Listing,
    pub failures: HashMap<String, Failure>,
}

impl SessionScript {
    pub fn items(ids: &[&str]) -> Self {
        Self {
            login_ok: true,
            navigation_ok: true,
            logout_ok: true,
            listing: Listing::Items(ids.iter().map(|id| id.to_string()).collect()),
            failures: HashMap::new(),
        }
    }

    pub fn failing(mut self, id: &str, failure: Failure) -> Self {
        self.failures.insert(id.to_string(), failure);
        self
    }

    pub fn login_fails(mut self) -> Self {
        self.login_ok = false;
        self
    }

    pub fn navigation_fails(mut self) -> Self {
        self.navigation_ok = false;
        self
    }

    pub fn logout_fails(mut self) -> Self {
        self.logout_ok = false;
        self
    }

    pub fn with_listing(mut self, listing: Listing) -> Self {
        self.listing = listing;
        self
    }
}

/// 所有会话共享的调用记录
#[derive(Debug, Default)]
pub struct Journal {
    pub opened: u32,
    pub closed: u32,
    pub logins: u32,
    pub logouts: u32,
    /// (会话序号, 服务器 ID)
    pub attempts: Vec<(u32, String)>,
}

impl Journal {
    pub fn attempted_ids(&self) -> Vec<String> {
        self.attempts.iter().map(|(_, id)| id.clone()).collect()
    }

    pub fn attempts_in(&self, session: u32) -> Vec<String> {
        self.attempts
            .iter()
            .filter(|(s, _)| *s == session)
            .map(|(_, id)| id.clone())
            .collect()
    }
}

pub struct FakePortal {
    session: u32,
    script: SessionScript,
    journal: Arc<Mutex<Journal>>,
}

impl FakePortal {
    pub fn new(session: u32, script: SessionScript, journal: Arc<Mutex<Journal>>) -> Self {
        Self {
            session,
            script,
            journal,
        }
    }
}

#[async_trait]
impl Portal for FakePortal {
    async fn login(&mut self, _credentials: &Credentials) -> Result<(), WebDriverError> {
        self.journal.lock().unwrap().logins += 1;
        if self.script.login_ok {
            Ok(())
        } else {
            Err(WebDriverError::NoSuchElement("#password".to_string()))
        }
    }

    async fn open_downloads(&mut self) -> Result<(), WebDriverError> {
        if self.script.navigation_ok {
            Ok(())
        } else {
            Err(WebDriverError::Timeout("downloads link".to_string()))
        }
    }

    async fn list_category(
        &mut self,
        filter: &str,
    ) -> Result<Option<CategoryListing>, WebDriverError> {
        match &self.script.listing {
            Listing::Missing => Ok(None),
            Listing::Broken => Err(WebDriverError::StaleElement("summary".to_string())),
            Listing::Items(_) if !CATEGORY.contains(filter) => Ok(None),
            Listing::Items(ids) => Ok(Some(CategoryListing {
                label: CATEGORY.to_string(),
                items: ids
                    .iter()
                    .map(|id| CandidateItem {
                        id: id.clone(),
                        category: CATEGORY.to_string(),
                        handle: ElementRef(format!("button-{}", id)),
                    })
                    .collect(),
            })),
        }
    }

    async fn download(&mut self, item: &CandidateItem) -> Result<(), WebDriverError> {
        self.journal
            .lock()
            .unwrap()
            .attempts
            .push((self.session, item.id.clone()));

        match self.script.failures.get(&item.id) {
            None => Ok(()),
            Some(Failure::Timeout) => Err(WebDriverError::Timeout("confirm button".to_string())),
            Some(Failure::Intercepted) => {
                Err(WebDriverError::ClickIntercepted("modal backdrop".to_string()))
            }
            Some(Failure::Other) => Err(WebDriverError::UnexpectedResponse("boom".to_string())),
            Some(Failure::Panic) => panic!("driver crashed while downloading {}", item.id),
        }
    }

    async fn logout(&mut self) -> Result<(), WebDriverError> {
        self.journal.lock().unwrap().logouts += 1;
        if self.script.logout_ok {
            Ok(())
        } else {
            Err(WebDriverError::InvalidSession("gone".to_string()))
        }
    }

    async fn close(&mut self) -> Result<(), WebDriverError> {
        self.journal.lock().unwrap().closed += 1;
        Ok(())
    }
}

/// 按顺序为每个会话提供脚本，脚本用完后重复最后一个
pub struct FakeFactory {
    scripts: Vec<SessionScript>,
    pub journal: Arc<Mutex<Journal>>,
    pub fail_open: bool,
}

impl FakeFactory {
    pub fn new(scripts: Vec<SessionScript>) -> Self {
        assert!(!scripts.is_empty());
        Self {
            scripts,
            journal: Arc::new(Mutex::new(Journal::default())),
            fail_open: false,
        }
    }

    pub fn single(script: SessionScript) -> Self {
        Self::new(vec![script])
    }

    pub fn journal(&self) -> std::sync::MutexGuard<'_, Journal> {
        self.journal.lock().unwrap()
    }
}

#[async_trait]
impl PortalFactory for FakeFactory {
    async fn open(&self) -> Result<Box<dyn Portal>, WebDriverError> {
        if self.fail_open {
            return Err(WebDriverError::InvalidSession("chromedriver not running".to_string()));
        }

        let session = {
            let mut journal = self.journal.lock().unwrap();
            journal.opened += 1;
            journal.opened
        };
        let index = (session as usize - 1).min(self.scripts.len() - 1);

        Ok(Box::new(FakePortal::new(
            session,
            self.scripts[index].clone(),
            Arc::clone(&self.journal),
        )))
    }
}

/// 只记录不等待
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    pub sleeps: Mutex<Vec<(DelayKind, Duration)>>,
}

impl RecordingSleeper {
    pub fn of_kind(&self, kind: DelayKind) -> Vec<Duration> {
        self.sleeps
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, d)| *d)
            .collect()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration, kind: DelayKind) {
        self.sleeps.lock().unwrap().push((kind, duration));
    }
}

pub fn credentials() -> Credentials {
    Credentials::new("tester", "hunter2")
}
