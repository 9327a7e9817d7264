// WebDriver 协议模块（浏览器自动化）

pub mod client;
pub mod error;
pub mod types;

pub use client::WebDriverClient;
pub use error::WebDriverError;
pub use types::{ChromeCapabilities, ElementRef, Locator};
