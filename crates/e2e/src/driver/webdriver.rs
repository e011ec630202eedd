//! W3C WebDriver adapter
//!
//! Talks plain WebDriver over HTTP to chromedriver, geckodriver or a Selenium
//! grid. Element lookup and state reads run as scripts in the page so that
//! locator semantics (text filter, scope, document order) match the mock.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, trace, warn};

use pagecheck_common::{DomNode, ElementState, Locator, Viewport, WebDriverConfig};

use super::{Driver, StorageSnapshot};
use crate::error::{DriverError, DriverResult};

/// Key under which WebDriver returns element references
const ELEMENT_KEY: &str = "element-6066-11e4-a52f-4ca7eb1c9f2b";

const LOCATE_JS: &str = r#"
function norm(s) { return (s || '').split(/\s+/).filter(Boolean).join(' '); }
function locate(loc) {
  let root = document;
  if (loc.within) {
    const scope = locate(loc.within)[loc.within.index || 0];
    if (!scope) return [];
    root = scope;
  }
  let found = Array.from(root.querySelectorAll(loc.css));
  if (loc.text !== undefined && loc.text !== null) {
    const needle = norm(loc.text);
    found = found.filter(el => norm(el.textContent).includes(needle));
    found = found.filter(el => !found.some(other => other !== el && el.contains(other)));
  }
  return found;
}
function visible(el) {
  const style = window.getComputedStyle(el);
  if (style.visibility === 'hidden' || style.display === 'none') return false;
  return !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
}
"#;

const QUERY_JS: &str = r#"
return locate(arguments[0]).map(el => ({
  tag: el.tagName.toLowerCase(),
  attributes: Object.fromEntries(Array.from(el.attributes).map(a => [a.name, a.value])),
  text: norm(el.textContent),
  value: typeof el.value === 'string' ? el.value : '',
  visible: visible(el),
  enabled: !el.matches(':disabled'),
}));
"#;

const ELEMENT_JS: &str = r#"
const loc = arguments[0];
return locate(loc)[loc.index || 0] || null;
"#;

const SNAPSHOT_JS: &str = r#"
function ser(node) {
  if (node.nodeType === Node.TEXT_NODE) return { tag: '#text', text: node.data };
  const out = {
    tag: node.tagName.toLowerCase(),
    attributes: Object.fromEntries(Array.from(node.attributes).map(a => [a.name, a.value])),
    rendered: visible(node),
    children: [],
  };
  if (['input', 'textarea', 'select'].includes(out.tag)) out.value = node.value;
  for (const child of node.childNodes) {
    if (child.nodeType === Node.ELEMENT_NODE || child.nodeType === Node.TEXT_NODE) {
      out.children.push(ser(child));
    }
  }
  return out;
}
return ser(document.documentElement);
"#;

// Blank and data: pages have no storage and throw SecurityError on access
const STORAGE_JS: &str = r#"
if (!/^https?:$/.test(location.protocol)) return { local: {}, session: {} };
return {
  local: Object.fromEntries(Object.entries(window.localStorage)),
  session: Object.fromEntries(Object.entries(window.sessionStorage)),
};
"#;

const CLEAR_STORAGE_JS: &str = r#"
if (/^https?:$/.test(location.protocol)) {
  window.localStorage.clear();
  window.sessionStorage.clear();
}
"#;

#[derive(Debug, Deserialize)]
struct WireError {
    error: String,
    #[serde(default)]
    message: String,
}

const INNER_SIZE_JS: &str = "return { width: window.innerWidth, height: window.innerHeight };";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
struct WindowRect {
    width: u32,
    height: u32,
}

/// Outer window size whose content area is `target`, given one measurement
/// of the outer and inner sizes. `None` when the content already fits.
fn outer_size_for(target: Viewport, outer: WindowRect, inner: WindowRect) -> Option<WindowRect> {
    if inner.width == target.width && inner.height == target.height {
        return None;
    }
    Some(WindowRect {
        width: target.width + outer.width.saturating_sub(inner.width),
        height: target.height + outer.height.saturating_sub(inner.height),
    })
}

/// A live WebDriver session
pub struct WebDriver {
    client: Client,
    endpoint: String,
    session_id: String,
}

impl WebDriver {
    /// Start a new browser session
    pub async fn connect(config: &WebDriverConfig) -> DriverResult<Self> {
        let client = Client::new();
        let endpoint = config.url.trim_end_matches('/').to_string();
        let capabilities = capabilities(&config.browser, config.headless);

        debug!("Creating WebDriver session at {}", endpoint);
        let response = client
            .post(format!("{}/session", endpoint))
            .json(&json!({ "capabilities": { "alwaysMatch": capabilities } }))
            .send()
            .await?;
        let value = unwrap_response(response, "new session").await?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::Protocol {
                code: "session not created".to_string(),
                message: "response carried no sessionId".to_string(),
            })?
            .to_string();
        debug!("WebDriver session {} started", session_id);

        Ok(Self {
            client,
            endpoint,
            session_id,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn command(&self, method: Method, path: &str, body: Value) -> DriverResult<Value> {
        let url = format!("{}/session/{}{}", self.endpoint, self.session_id, path);
        trace!("WebDriver {} {}", method, path);
        let request = self.client.request(method.clone(), &url);
        let request = if method == Method::GET || method == Method::DELETE {
            request
        } else {
            request.json(&body)
        };
        let response = request.send().await?;
        unwrap_response(response, path).await
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> DriverResult<Value> {
        let source = format!("{}\n{}", LOCATE_JS, script);
        self.command(
            Method::POST,
            "/execute/sync",
            json!({ "script": source, "args": args }),
        )
        .await
    }

    async fn element_id(&self, locator: &Locator) -> DriverResult<String> {
        let value = self.execute(ELEMENT_JS, vec![json!(locator)]).await?;
        value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DriverError::NotFound {
                selector: locator.to_string(),
            })
    }

    async fn set_window_rect(&self, width: u32, height: u32) -> DriverResult<WindowRect> {
        let value = self
            .command(
                Method::POST,
                "/window/rect",
                json!({ "width": width, "height": height }),
            )
            .await?;
        decode(value)
    }

    async fn inner_size(&self) -> DriverResult<WindowRect> {
        decode(self.execute(INNER_SIZE_JS, vec![]).await?)
    }

    async fn element_command(
        &self,
        locator: &Locator,
        action: &str,
        body: Value,
    ) -> DriverResult<()> {
        let id = self.element_id(locator).await?;
        self.command(Method::POST, &format!("/element/{}/{}", id, action), body)
            .await
            .map_err(|e| with_selector(e, locator))?;
        Ok(())
    }
}

fn capabilities(browser: &str, headless: bool) -> Value {
    match browser {
        "firefox" => {
            let args: Vec<&str> = if headless { vec!["-headless"] } else { vec![] };
            json!({ "browserName": "firefox", "moz:firefoxOptions": { "args": args } })
        }
        "edge" | "MicrosoftEdge" => {
            let args: Vec<&str> = if headless { vec!["--headless=new"] } else { vec![] };
            json!({ "browserName": "MicrosoftEdge", "ms:edgeOptions": { "args": args } })
        }
        _ => {
            let args: Vec<&str> = if headless { vec!["--headless=new"] } else { vec![] };
            json!({ "browserName": "chrome", "goog:chromeOptions": { "args": args } })
        }
    }
}

async fn unwrap_response(response: reqwest::Response, context: &str) -> DriverResult<Value> {
    let status = response.status();
    let mut body: Value = response.json().await?;
    let value = body.get_mut("value").map(Value::take).unwrap_or(Value::Null);
    if status.is_success() {
        return Ok(value);
    }
    let wire: WireError = serde_json::from_value(value).map_err(|_| DriverError::Protocol {
        code: status.to_string(),
        message: format!("{} failed without an error body", context),
    })?;
    Err(map_error(&wire.error, wire.message))
}

fn map_error(code: &str, message: String) -> DriverError {
    match code {
        "no such element" | "stale element reference" => DriverError::NotFound { selector: message },
        "element not interactable" | "element click intercepted" | "invalid element state" => {
            DriverError::NotInteractable {
                selector: String::new(),
                reason: message,
            }
        }
        "invalid session id" | "session not created" | "no such window" => {
            DriverError::SessionLost(message)
        }
        "invalid selector" => DriverError::InvalidSelector(message),
        _ => DriverError::Protocol {
            code: code.to_string(),
            message,
        },
    }
}

fn with_selector(error: DriverError, locator: &Locator) -> DriverError {
    match error {
        DriverError::NotFound { .. } => DriverError::NotFound {
            selector: locator.to_string(),
        },
        DriverError::NotInteractable { reason, .. } => DriverError::NotInteractable {
            selector: locator.to_string(),
            reason,
        },
        other => other,
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> DriverResult<T> {
    serde_json::from_value(value).map_err(|e| DriverError::Protocol {
        code: "unexpected script result".to_string(),
        message: e.to_string(),
    })
}

#[async_trait]
impl Driver for WebDriver {
    async fn navigate(&mut self, url: &str) -> DriverResult<()> {
        debug!("navigate {}", url);
        self.command(Method::POST, "/url", json!({ "url": url }))
            .await
            .map_err(|e| match e {
                fatal if fatal.is_fatal() => fatal,
                other => DriverError::Navigation {
                    url: url.to_string(),
                    reason: other.to_string(),
                },
            })?;
        Ok(())
    }

    async fn query(&mut self, locator: &Locator) -> DriverResult<Vec<ElementState>> {
        let value = self.execute(QUERY_JS, vec![json!(locator)]).await?;
        decode(value)
    }

    async fn type_text(&mut self, locator: &Locator, text: &str) -> DriverResult<()> {
        self.element_command(locator, "value", json!({ "text": text })).await
    }

    async fn clear(&mut self, locator: &Locator) -> DriverResult<()> {
        self.element_command(locator, "clear", json!({})).await
    }

    async fn click(&mut self, locator: &Locator) -> DriverResult<()> {
        self.element_command(locator, "click", json!({})).await
    }

    /// Window rect covers the browser chrome too, so the window is grown by
    /// the measured difference until the content area has the requested size
    async fn set_viewport(&mut self, viewport: Viewport) -> DriverResult<()> {
        let outer = self.set_window_rect(viewport.width, viewport.height).await?;
        let inner = self.inner_size().await?;
        if let Some(rect) = outer_size_for(viewport, outer, inner) {
            debug!(
                "Resizing window to {}x{} for a {} content area",
                rect.width, rect.height, viewport
            );
            self.set_window_rect(rect.width, rect.height).await?;
        }
        Ok(())
    }

    async fn viewport(&mut self) -> DriverResult<Viewport> {
        let inner = self.inner_size().await?;
        Ok(Viewport::new(inner.width, inner.height))
    }

    async fn clear_storage(&mut self) -> DriverResult<()> {
        self.execute(CLEAR_STORAGE_JS, vec![]).await?;
        Ok(())
    }

    async fn storage(&mut self) -> DriverResult<StorageSnapshot> {
        decode(self.execute(STORAGE_JS, vec![]).await?)
    }

    async fn page_snapshot(&mut self) -> DriverResult<DomNode> {
        decode(self.execute(SNAPSHOT_JS, vec![]).await?)
    }

    async fn close(&mut self) -> DriverResult<()> {
        if let Err(e) = self.command(Method::DELETE, "", Value::Null).await {
            warn!("Failed to delete WebDriver session {}: {}", self.session_id, e);
            return Err(e);
        }
        debug!("WebDriver session {} closed", self.session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        assert!(matches!(
            map_error("no such element", "gone".into()),
            DriverError::NotFound { .. }
        ));
        assert!(map_error("invalid session id", "closed".into()).is_fatal());
        assert!(matches!(
            map_error("javascript error", "boom".into()),
            DriverError::Protocol { .. }
        ));
        let err = with_selector(
            map_error("element click intercepted", "covered".into()),
            &Locator::contains("button", "Login"),
        );
        assert_eq!(
            err,
            DriverError::NotInteractable {
                selector: "button containing \"Login\"".into(),
                reason: "covered".into(),
            }
        );
    }

    #[test]
    fn test_capabilities() {
        let caps = capabilities("chrome", true);
        assert_eq!(caps["browserName"], "chrome");
        assert_eq!(caps["goog:chromeOptions"]["args"][0], "--headless=new");
        let caps = capabilities("firefox", false);
        assert!(caps["moz:firefoxOptions"]["args"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_outer_size_adds_browser_chrome() {
        let rect = |width, height| WindowRect { width, height };
        let iphone_x = Viewport::new(375, 812);

        assert_eq!(
            outer_size_for(iphone_x, rect(375, 812), rect(375, 727)),
            Some(rect(375, 897))
        );
        assert_eq!(
            outer_size_for(iphone_x, rect(500, 900), rect(484, 812)),
            Some(rect(391, 900))
        );
        assert_eq!(outer_size_for(iphone_x, rect(375, 812), rect(375, 812)), None);
    }

    #[test]
    fn test_storage_scripts_skip_pages_without_origin() {
        let guard = "/^https?:$/.test(location.protocol)";
        assert!(CLEAR_STORAGE_JS.contains(guard));
        assert!(STORAGE_JS.contains(guard));
    }

    #[test]
    fn test_locator_wire_format() {
        let locator = Locator::focusable().within(Locator::css("form")).nth(2);
        let wire = json!(locator);
        assert_eq!(wire["within"]["css"], "form");
        assert_eq!(wire["index"], 2);
        assert!(wire.get("text").is_none());
    }

    #[test]
    fn test_query_result_decodes() {
        let value = json!([{
            "tag": "input",
            "attributes": { "name": "email" },
            "text": "",
            "value": "a@b.c",
            "visible": true,
            "enabled": true
        }]);
        let states: Vec<ElementState> = decode(value).unwrap();
        assert_eq!(states[0].attr("name"), Some("email"));
    }
}
