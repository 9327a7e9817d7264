// 账号凭证（仅从环境变量读取）

use std::fmt;

use thiserror::Error;

/// 用户名环境变量
pub const USERNAME_ENV: &str = "VPN_USERNAME";

/// 密码环境变量
pub const PASSWORD_ENV: &str = "VPN_PASSWORD";

/// 配置错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// 缺少必需的环境变量
    #[error("缺少环境变量 {0}，请在运行环境（例如 CI Secrets）中配置账号信息")]
    MissingCredential(&'static str),
}

/// 登录凭证
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

// 避免密码出现在日志中
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// 从进程环境变量读取凭证
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 通过任意查找函数读取凭证，空字符串视为缺失
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &'static str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::MissingCredential(key))
        };

        let username = read(USERNAME_ENV)?;
        let password = read(PASSWORD_ENV)?;

        Ok(Self { username, password })
    }
}
