// WebDriver 错误类型

use thiserror::Error;

use super::types::WireError;

/// 浏览器自动化错误
#[derive(Debug, Error)]
pub enum WebDriverError {
    /// 显式等待超时
    #[error("等待超时: {0}")]
    Timeout(String),

    /// 点击被其他元素遮挡（通常是弹窗遮罩）
    #[error("点击被遮挡: {0}")]
    ClickIntercepted(String),

    /// 找不到元素
    #[error("元素不存在: {0}")]
    NoSuchElement(String),

    /// 元素引用已失效（页面已刷新）
    #[error("元素已失效: {0}")]
    StaleElement(String),

    /// 会话不存在或已关闭
    #[error("浏览器会话无效: {0}")]
    InvalidSession(String),

    /// 其他 WebDriver 协议错误
    #[error("WebDriver 错误 [{code}]: {message}")]
    Protocol { code: String, message: String },

    /// 响应格式不符合预期
    #[error("WebDriver 响应格式错误: {0}")]
    UnexpectedResponse(String),

    /// 网络错误
    #[error("WebDriver 请求失败: {0}")]
    Http(#[from] reqwest::Error),
}

impl WebDriverError {
    /// 从 W3C 错误体转换
    pub fn from_wire(wire: WireError) -> Self {
        match wire.error.as_str() {
            "no such element" => WebDriverError::NoSuchElement(wire.message),
            "element click intercepted" => WebDriverError::ClickIntercepted(wire.message),
            "timeout" | "script timeout" => WebDriverError::Timeout(wire.message),
            "stale element reference" => WebDriverError::StaleElement(wire.message),
            "invalid session id" => WebDriverError::InvalidSession(wire.message),
            _ => WebDriverError::Protocol {
                code: wire.error,
                message: wire.message,
            },
        }
    }

    /// 是否为限流的典型表现（等待超时 / 点击被遮挡）
    pub fn is_rate_limit_signal(&self) -> bool {
        matches!(
            self,
            WebDriverError::Timeout(_) | WebDriverError::ClickIntercepted(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, WebDriverError>;
