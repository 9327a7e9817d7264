// WebDriver 协议数据类型定义

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// W3C 规范中的元素引用键
pub const ELEMENT_KEY: &str = "element-6066-11e4-a5ba-4d4cd9b4d0c5";

/// 元素定位方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator<'a> {
    /// CSS 选择器
    Css(&'a str),
    /// XPath 表达式
    XPath(&'a str),
    /// 元素 id（转换为 CSS `#id`）
    Id(&'a str),
    /// class 名称（转换为 CSS `.class`）
    ClassName(&'a str),
}

impl Locator<'_> {
    /// 转换为 W3C `using` / `value` 参数
    pub fn to_strategy(&self) -> (&'static str, String) {
        match self {
            Locator::Css(css) => ("css selector", css.to_string()),
            Locator::XPath(xpath) => ("xpath", xpath.to_string()),
            Locator::Id(id) => ("css selector", format!("#{}", id)),
            Locator::ClassName(class) => ("css selector", format!(".{}", class)),
        }
    }

    /// 请求体
    pub fn to_body(&self) -> Value {
        let (using, value) = self.to_strategy();
        json!({ "using": using, "value": value })
    }
}

impl std::fmt::Display for Locator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (using, value) = self.to_strategy();
        write!(f, "{}={}", using, value)
    }
}

/// 页面元素引用
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(pub String);

impl ElementRef {
    /// 作为脚本参数传递时的 JSON 形式
    pub fn to_json(&self) -> Value {
        json!({ ELEMENT_KEY: self.0 })
    }

    /// 从响应 JSON 中解析元素引用
    pub fn from_json(value: &Value) -> Option<Self> {
        value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(|id| ElementRef(id.to_string()))
    }
}

/// WebDriver 统一响应外层
#[derive(Debug, Deserialize)]
pub struct WireResponse {
    #[serde(default)]
    pub value: Value,
}

/// WebDriver 错误响应体
#[derive(Debug, Clone, Deserialize)]
pub struct WireError {
    /// 错误码，例如 `no such element`
    pub error: String,
    #[serde(default)]
    pub message: String,
}

/// Chrome 启动参数
#[derive(Debug, Clone, Serialize)]
pub struct ChromeCapabilities {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// 下载保存目录（绝对路径）
    pub download_dir: String,
}

impl ChromeCapabilities {
    /// 构造新建会话请求体
    pub fn to_session_request(&self) -> Value {
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
            format!("--window-size={},{}", self.window_width, self.window_height),
        ];
        if self.headless {
            args.insert(0, "--headless".to_string());
        }

        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": args,
                        "prefs": {
                            "download.default_directory": self.download_dir,
                            "download.prompt_for_download": false,
                            "download.directory_upgrade": true,
                            "safebrowsing.enabled": true
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_strategies() {
        assert_eq!(
            Locator::Id("username").to_strategy(),
            ("css selector", "#username".to_string())
        );
        assert_eq!(
            Locator::ClassName("modal-two-backdrop").to_strategy(),
            ("css selector", ".modal-two-backdrop".to_string())
        );
        assert_eq!(
            Locator::XPath("//a").to_strategy(),
            ("xpath", "//a".to_string())
        );
    }

    #[test]
    fn test_element_ref_round_trip() {
        let element = ElementRef("abc-123".to_string());
        assert_eq!(ElementRef::from_json(&element.to_json()), Some(element));
        assert_eq!(ElementRef::from_json(&json!({ "other": "x" })), None);
    }

    #[test]
    fn test_session_request_has_download_prefs() {
        let caps = ChromeCapabilities {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            download_dir: "/data/configs".to_string(),
        };

        let body = caps.to_session_request();
        let options = &body["capabilities"]["alwaysMatch"]["goog:chromeOptions"];

        assert_eq!(options["args"][0], "--headless");
        assert_eq!(
            options["prefs"]["download.default_directory"],
            "/data/configs"
        );
        assert_eq!(options["prefs"]["download.prompt_for_download"], false);
    }

    #[test]
    fn test_headful_session_omits_headless_flag() {
        let caps = ChromeCapabilities {
            headless: false,
            window_width: 800,
            window_height: 600,
            download_dir: "/tmp".to_string(),
        };

        let body = caps.to_session_request();
        let args = body["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"]
            .as_array()
            .unwrap();
        assert!(args.iter().all(|a| a != "--headless"));
    }
}
