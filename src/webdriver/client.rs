// WebDriver 客户端实现
//
// 只实现本项目用到的 W3C WebDriver 命令子集：会话、导航、元素定位与交互、脚本执行，
// 以及带超时的显式等待

use std::time::Duration;

use reqwest::{Client, Method};
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::error::{Result, WebDriverError};
use super::types::{ChromeCapabilities, ElementRef, Locator, WireError, WireResponse};

/// 判断元素是否可见（不受隐式等待影响）
const VISIBLE_SCRIPT: &str = "const els = document.querySelectorAll(arguments[0]);\
     return Array.prototype.some.call(els, e => !!(e.offsetWidth || e.offsetHeight || e.getClientRects().length));";

/// WebDriver 会话客户端
///
/// 一个实例对应一个浏览器会话，`quit` 之后不可再使用
#[derive(Debug)]
pub struct WebDriverClient {
    /// HTTP客户端
    client: Client,
    /// WebDriver 服务地址
    base_url: String,
    /// 会话 ID
    session_id: String,
    /// 显式等待轮询间隔
    poll_interval: Duration,
}

impl WebDriverClient {
    /// 创建新的浏览器会话
    pub async fn connect(
        base_url: &str,
        capabilities: &ChromeCapabilities,
        poll_interval: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let value = send_raw(
            &client,
            Method::POST,
            &format!("{}/session", base_url),
            Some(capabilities.to_session_request()),
        )
        .await?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| WebDriverError::UnexpectedResponse(format!("缺少 sessionId: {}", value)))?
            .to_string();

        info!(
            "浏览器会话已创建: session_id={}, headless={}",
            session_id, capabilities.headless
        );

        Ok(Self {
            client,
            base_url,
            session_id,
            poll_interval,
        })
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}/session/{}{}", self.base_url, self.session_id, path);
        send_raw(&self.client, method, &url, body).await
    }

    /// 设置隐式等待
    pub async fn set_implicit_wait(&self, wait: Duration) -> Result<()> {
        self.send(
            Method::POST,
            "/timeouts",
            Some(json!({ "implicit": wait.as_millis() as u64 })),
        )
        .await?;
        Ok(())
    }

    /// 设置窗口大小
    pub async fn set_window_size(&self, width: u32, height: u32) -> Result<()> {
        self.send(
            Method::POST,
            "/window/rect",
            Some(json!({ "width": width, "height": height })),
        )
        .await?;
        Ok(())
    }

    /// 打开页面
    pub async fn goto(&self, url: &str) -> Result<()> {
        debug!("打开页面: {}", url);
        self.send(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    /// 查找单个元素
    pub async fn find(&self, locator: Locator<'_>) -> Result<ElementRef> {
        let value = self
            .send(Method::POST, "/element", Some(locator.to_body()))
            .await?;
        parse_element(&value)
    }

    /// 查找所有匹配元素
    pub async fn find_all(&self, locator: Locator<'_>) -> Result<Vec<ElementRef>> {
        let value = self
            .send(Method::POST, "/elements", Some(locator.to_body()))
            .await?;
        parse_elements(&value)
    }

    /// 在父元素内查找单个元素
    pub async fn find_in(&self, parent: &ElementRef, locator: Locator<'_>) -> Result<ElementRef> {
        let path = format!("/element/{}/element", parent.0);
        let value = self
            .send(Method::POST, &path, Some(locator.to_body()))
            .await?;
        parse_element(&value)
    }

    /// 在父元素内查找所有匹配元素
    pub async fn find_all_in(
        &self,
        parent: &ElementRef,
        locator: Locator<'_>,
    ) -> Result<Vec<ElementRef>> {
        let path = format!("/element/{}/elements", parent.0);
        let value = self
            .send(Method::POST, &path, Some(locator.to_body()))
            .await?;
        parse_elements(&value)
    }

    /// 点击元素
    pub async fn click(&self, element: &ElementRef) -> Result<()> {
        let path = format!("/element/{}/click", element.0);
        self.send(Method::POST, &path, Some(json!({}))).await?;
        Ok(())
    }

    /// 清空输入框
    pub async fn clear(&self, element: &ElementRef) -> Result<()> {
        let path = format!("/element/{}/clear", element.0);
        self.send(Method::POST, &path, Some(json!({}))).await?;
        Ok(())
    }

    /// 输入文本
    pub async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<()> {
        let path = format!("/element/{}/value", element.0);
        self.send(Method::POST, &path, Some(json!({ "text": text })))
            .await?;
        Ok(())
    }

    /// 读取元素可见文本
    pub async fn text(&self, element: &ElementRef) -> Result<String> {
        let path = format!("/element/{}/text", element.0);
        let value = self.send(Method::GET, &path, None).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| WebDriverError::UnexpectedResponse(format!("文本不是字符串: {}", value)))
    }

    /// 元素是否可见
    pub async fn is_displayed(&self, element: &ElementRef) -> Result<bool> {
        let path = format!("/element/{}/displayed", element.0);
        let value = self.send(Method::GET, &path, None).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// 元素是否可用
    pub async fn is_enabled(&self, element: &ElementRef) -> Result<bool> {
        let path = format!("/element/{}/enabled", element.0);
        let value = self.send(Method::GET, &path, None).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// 执行同步脚本
    pub async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.send(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    /// 滚动到元素位置（居中）
    pub async fn scroll_into_view(&self, element: &ElementRef) -> Result<()> {
        self.execute(
            "arguments[0].scrollIntoView({block: 'center'});",
            vec![element.to_json()],
        )
        .await?;
        Ok(())
    }

    /// 等待元素可点击（存在、可见且可用）
    pub async fn wait_clickable(
        &self,
        locator: Locator<'_>,
        timeout: Duration,
    ) -> Result<ElementRef> {
        let deadline = Instant::now() + timeout;

        loop {
            match self.find(locator).await {
                // 元素在检查期间被重新渲染时引用会失效，按"尚不可点击"继续等待
                Ok(element) => match self.is_clickable(&element).await {
                    Ok(true) => return Ok(element),
                    Ok(false) | Err(WebDriverError::StaleElement(_)) => {}
                    Err(e) => return Err(e),
                },
                Err(WebDriverError::NoSuchElement(_)) | Err(WebDriverError::StaleElement(_)) => {}
                Err(e) => return Err(e),
            }

            if Instant::now() >= deadline {
                return Err(WebDriverError::Timeout(format!(
                    "{} 在 {:?} 内未变为可点击",
                    locator, timeout
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn is_clickable(&self, element: &ElementRef) -> Result<bool> {
        Ok(self.is_displayed(element).await? && self.is_enabled(element).await?)
    }

    /// 等待元素不可见（不存在也视为不可见）
    pub async fn wait_invisible(&self, locator: Locator<'_>, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;

        loop {
            if !self.any_visible(locator).await? {
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(WebDriverError::Timeout(format!(
                    "{} 在 {:?} 内未消失",
                    locator, timeout
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn any_visible(&self, locator: Locator<'_>) -> Result<bool> {
        match locator.to_strategy() {
            ("css selector", css) => {
                let value = self.execute(VISIBLE_SCRIPT, vec![json!(css)]).await?;
                Ok(value.as_bool().unwrap_or(false))
            }
            _ => {
                for element in self.find_all(locator).await? {
                    match self.is_displayed(&element).await {
                        Ok(true) => return Ok(true),
                        Ok(false) | Err(WebDriverError::StaleElement(_)) => {}
                        Err(e) => return Err(e),
                    }
                }
                Ok(false)
            }
        }
    }

    /// 关闭浏览器会话
    pub async fn quit(&self) -> Result<()> {
        self.send(Method::DELETE, "", None).await?;
        info!("浏览器会话已关闭: session_id={}", self.session_id);
        Ok(())
    }
}

/// 发送请求并解析 W3C 响应
async fn send_raw(client: &Client, method: Method, url: &str, body: Option<Value>) -> Result<Value> {
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.send().await?;
    let status = response.status();
    let wire: WireResponse = response.json().await?;

    if status.is_success() {
        return Ok(wire.value);
    }

    match serde_json::from_value::<WireError>(wire.value.clone()) {
        Ok(err) => {
            debug!("WebDriver 返回错误: status={}, error={}", status, err.error);
            Err(WebDriverError::from_wire(err))
        }
        Err(_) => {
            warn!("无法解析 WebDriver 错误响应: status={}, body={}", status, wire.value);
            Err(WebDriverError::UnexpectedResponse(format!(
                "HTTP {}: {}",
                status, wire.value
            )))
        }
    }
}

fn parse_element(value: &Value) -> Result<ElementRef> {
    ElementRef::from_json(value)
        .ok_or_else(|| WebDriverError::UnexpectedResponse(format!("无法解析元素引用: {}", value)))
}

fn parse_elements(value: &Value) -> Result<Vec<ElementRef>> {
    let items = value
        .as_array()
        .ok_or_else(|| WebDriverError::UnexpectedResponse(format!("元素列表不是数组: {}", value)))?;
    items.iter().map(parse_element).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webdriver::types::ELEMENT_KEY;

    #[test]
    fn test_parse_elements() {
        let value = json!([{ ELEMENT_KEY: "a" }, { ELEMENT_KEY: "b" }]);
        let elements = parse_elements(&value).unwrap();
        assert_eq!(
            elements,
            vec![ElementRef("a".to_string()), ElementRef("b".to_string())]
        );
    }

    #[test]
    fn test_parse_elements_rejects_non_array() {
        assert!(matches!(
            parse_elements(&json!({ "x": 1 })),
            Err(WebDriverError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_parse_element_rejects_missing_key() {
        assert!(parse_element(&json!({ "ELEMENT": "legacy" })).is_err());
    }

    mod mock {
        use std::net::SocketAddr;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        use axum::extract::State;
        use axum::http::StatusCode;
        use axum::routing::{get, post};
        use axum::{Json, Router};
        use serde_json::{json, Value};
        use tokio::net::TcpListener;

        use crate::webdriver::types::ELEMENT_KEY;

        pub const SESSION: &str = "mock-session";

        /// 模拟 chromedriver 的一小部分行为
        #[derive(Default)]
        pub struct MockDriver {
            /// 目标元素是否存在
            pub present: bool,
            /// 前几次 `/displayed` 返回元素已失效
            pub stale_reads: usize,
            /// 可见性脚本的返回值
            pub visible: bool,
            pub displayed_calls: AtomicUsize,
        }

        type Reply = (StatusCode, Json<Value>);

        fn ok(value: Value) -> Reply {
            (StatusCode::OK, Json(json!({ "value": value })))
        }

        fn wire_error(status: StatusCode, code: &str) -> Reply {
            (
                status,
                Json(json!({ "value": { "error": code, "message": "mock", "stacktrace": "" } })),
            )
        }

        async fn new_session() -> Reply {
            ok(json!({ "sessionId": SESSION, "capabilities": {} }))
        }

        async fn find_element(State(mock): State<Arc<MockDriver>>) -> Reply {
            if mock.present {
                ok(json!({ ELEMENT_KEY: "e1" }))
            } else {
                wire_error(StatusCode::NOT_FOUND, "no such element")
            }
        }

        async fn displayed(State(mock): State<Arc<MockDriver>>) -> Reply {
            let calls = mock.displayed_calls.fetch_add(1, Ordering::SeqCst);
            if calls < mock.stale_reads {
                wire_error(StatusCode::NOT_FOUND, "stale element reference")
            } else {
                ok(json!(true))
            }
        }

        async fn enabled() -> Reply {
            ok(json!(true))
        }

        async fn execute(State(mock): State<Arc<MockDriver>>) -> Reply {
            ok(json!(mock.visible))
        }

        async fn click() -> Reply {
            wire_error(StatusCode::BAD_REQUEST, "element click intercepted")
        }

        pub async fn start(mock: Arc<MockDriver>) -> SocketAddr {
            let base = format!("/session/{}", SESSION);
            let app = Router::new()
                .route("/session", post(new_session))
                .route(&format!("{}/element", base), post(find_element))
                .route(&format!("{}/element/:id/displayed", base), get(displayed))
                .route(&format!("{}/element/:id/enabled", base), get(enabled))
                .route(&format!("{}/element/:id/click", base), post(click))
                .route(&format!("{}/execute/sync", base), post(execute))
                .with_state(mock);

            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            addr
        }
    }

    use mock::MockDriver;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    const SHORT_WAIT: Duration = Duration::from_millis(200);

    async fn connect(mock: MockDriver) -> (WebDriverClient, Arc<MockDriver>) {
        let mock = Arc::new(mock);
        let addr = mock::start(Arc::clone(&mock)).await;
        let caps = ChromeCapabilities {
            headless: true,
            window_width: 800,
            window_height: 600,
            download_dir: "/tmp".to_string(),
        };
        let client = WebDriverClient::connect(
            &format!("http://{}", addr),
            &caps,
            Duration::from_millis(10),
        )
        .await
        .unwrap();
        (client, mock)
    }

    #[tokio::test]
    async fn test_wait_clickable_keeps_polling_after_stale_element() {
        let (client, mock) = connect(MockDriver {
            present: true,
            stale_reads: 1,
            ..Default::default()
        })
        .await;

        let element = client
            .wait_clickable(Locator::Css(".confirm"), Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(element, ElementRef("e1".to_string()));
        assert!(mock.displayed_calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_wait_clickable_times_out_when_missing() {
        let (client, _mock) = connect(MockDriver::default()).await;

        let err = client
            .wait_clickable(Locator::Css(".confirm"), SHORT_WAIT)
            .await
            .unwrap_err();

        assert!(matches!(err, WebDriverError::Timeout(_)));
        assert!(err.is_rate_limit_signal());
    }

    #[tokio::test]
    async fn test_wait_invisible_returns_when_hidden() {
        let (client, _mock) = connect(MockDriver {
            visible: false,
            ..Default::default()
        })
        .await;

        client
            .wait_invisible(Locator::ClassName("modal-two-backdrop"), SHORT_WAIT)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_invisible_times_out_while_visible() {
        let (client, _mock) = connect(MockDriver {
            visible: true,
            ..Default::default()
        })
        .await;

        let err = client
            .wait_invisible(Locator::ClassName("modal-two-backdrop"), SHORT_WAIT)
            .await
            .unwrap_err();

        assert!(matches!(err, WebDriverError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_error_body_maps_to_variant() {
        let (client, _mock) = connect(MockDriver::default()).await;

        let find = client.find(Locator::Id("password")).await;
        assert!(matches!(find, Err(WebDriverError::NoSuchElement(_))));

        let click = client.click(&ElementRef("e1".to_string())).await;
        assert!(matches!(click, Err(WebDriverError::ClickIntercepted(_))));
    }
}
