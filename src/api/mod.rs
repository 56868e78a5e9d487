use crate::config::RenderConfig;
use crate::internal::models::ClipRect;
use crate::internal::render::RenderSurface;
use crate::utils::image_clip::clip_png;
use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;

/// W3C key under which element references are returned.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Scrolls to the page origin and reports the viewport size in CSS pixels.
const VIEWPORT_SCRIPT: &str =
    "window.scrollTo(0, 0); return {width: window.innerWidth, height: window.innerHeight};";

#[derive(Debug, Clone, Copy, Deserialize)]
struct Extent {
    width: f64,
    height: f64,
}

/// An error reported by the WebDriver server itself.
#[derive(Debug, thiserror::Error)]
#[error("webdriver {command} failed ({status}): {error}: {message}")]
pub struct WebDriverError {
    pub command: String,
    pub status: u16,
    pub error: String,
    pub message: String,
}

impl WebDriverError {
    fn from_value(command: &str, status: u16, value: &Value) -> Self {
        let field = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            command: command.to_string(),
            status,
            error: field("error"),
            message: field("message"),
        }
    }

    /// The element disappeared or never existed.
    fn is_gone(&self) -> bool {
        matches!(
            self.error.as_str(),
            "no such element" | "stale element reference"
        )
    }
}

fn is_gone(err: &anyhow::Error) -> bool {
    err.downcast_ref::<WebDriverError>()
        .is_some_and(WebDriverError::is_gone)
}

/// A browser session on a WebDriver server, used as the render surface.
///
/// Uses the async `reqwest::Client`; every failure carries context naming the
/// WebDriver command that produced it.
pub struct WebDriverSession {
    client: Client,
    base_url: String,
    session_id: String,
    poll_interval: Duration,
    device_scale_factor: f64,
}

impl WebDriverSession {
    /// Open a new headless browser session sized to the configured viewport.
    #[tracing::instrument(skip(config), fields(webdriver = %config.webdriver_url))]
    pub async fn connect(config: &RenderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to build HTTP client")?;
        let base_url = config.webdriver_url.trim_end_matches('/').to_string();

        let mut args = vec![
            "--headless=new".to_string(),
            "--hide-scrollbars".to_string(),
            format!("--force-device-scale-factor={}", config.device_scale_factor),
            format!(
                "--window-size={},{}",
                config.viewport_width, config.viewport_height
            ),
        ];
        args.extend(config.browser_args.iter().cloned());

        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        });

        let created: Value = send(&client, &base_url, Method::POST, "/session", Some(capabilities))
            .await
            .with_context(|| format!("failed to start a browser session at {}", base_url))?;
        let session_id = created
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("WebDriver response carried no sessionId: {created}"))?
            .to_string();

        let session = Self {
            client,
            base_url,
            session_id,
            poll_interval: config.poll_interval(),
            device_scale_factor: config.device_scale_factor,
        };

        session
            .command::<Value>(
                Method::POST,
                "window/rect",
                Some(json!({
                    "width": config.viewport_width,
                    "height": config.viewport_height,
                })),
            )
            .await
            .context("failed to size the browser window")?;

        tracing::info!(session = %session.session_id, "browser session started");
        Ok(session)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn command<T>(&self, method: Method, suffix: &str, body: Option<Value>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let path = format!("/session/{}/{}", self.session_id, suffix);
        send(&self.client, &self.base_url, method, &path, body).await
    }

    async fn find_element(&self, selector: &str) -> Result<Option<String>> {
        let found: Result<Value> = self
            .command(
                Method::POST,
                "element",
                Some(json!({ "using": "css selector", "value": selector })),
            )
            .await;

        match found {
            Ok(value) => value
                .get(ELEMENT_KEY)
                .and_then(Value::as_str)
                .map(|id| Some(id.to_string()))
                .ok_or_else(|| anyhow!("malformed element reference for {selector}: {value}")),
            Err(e) if is_gone(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn set_window_size(&self, width: u32, height: u32) -> Result<()> {
        self.command::<Value>(
            Method::POST,
            "window/rect",
            Some(json!({ "width": width, "height": height })),
        )
        .await
        .map(drop)
    }

    async fn capture(&self) -> Result<Vec<u8>> {
        let encoded: String = self.command(Method::GET, "screenshot", None).await?;
        STANDARD
            .decode(encoded.as_bytes())
            .context("screenshot was not valid base64")
    }

    /// Capture the viewport with the page scrolled to its origin, growing the
    /// window first when `clip` reaches past the viewport. The window is put
    /// back to its previous size afterwards.
    async fn capture_covering(&self, clip: ClipRect) -> Result<Vec<u8>> {
        let viewport: Extent = self
            .command(
                Method::POST,
                "execute/sync",
                Some(json!({ "script": VIEWPORT_SCRIPT, "args": [] })),
            )
            .await
            .context("failed to read the viewport size")?;

        let extra_width = ((clip.x + clip.width).ceil() - viewport.width).max(0.0);
        let extra_height = ((clip.y + clip.height).ceil() - viewport.height).max(0.0);
        if extra_width == 0.0 && extra_height == 0.0 {
            return self.capture().await;
        }

        let window: Extent = self
            .command(Method::GET, "window/rect", None)
            .await
            .context("failed to read the window size")?;
        tracing::debug!(
            extra_width,
            extra_height,
            "clip exceeds the viewport, growing the window"
        );
        let (width, height) = (window.width.ceil() as u32, window.height.ceil() as u32);
        self.set_window_size(width + extra_width as u32, height + extra_height as u32)
            .await
            .context("failed to grow the browser window")?;

        let captured = self.capture().await;
        self.set_window_size(width, height)
            .await
            .context("failed to restore the browser window")?;
        captured
    }
}

/// Issue one WebDriver command and unwrap its `value`.
async fn send<T>(
    client: &Client,
    base_url: &str,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> Result<T>
where
    T: DeserializeOwned,
{
    let url = format!("{}{}", base_url, path);
    let command = format!("{} {}", method, path);
    tracing::debug!(%command, "webdriver");

    let mut request = client.request(method, &url);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let resp = request
        .send()
        .await
        .with_context(|| format!("failed to send {}", command))?;
    let status = resp.status();
    let mut payload: Value = resp
        .json()
        .await
        .with_context(|| format!("failed to parse WebDriver response to {}", command))?;
    let value = payload.get_mut("value").map(Value::take).unwrap_or(Value::Null);

    if !status.is_success() {
        return Err(WebDriverError::from_value(&command, status.as_u16(), &value).into());
    }

    serde_json::from_value(value)
        .with_context(|| format!("unexpected WebDriver value for {}", command))
}

impl RenderSurface for WebDriverSession {
    async fn open(&mut self, url: &str) -> Result<()> {
        self.command::<Value>(Method::POST, "url", Some(json!({ "url": url })))
            .await
            .map(drop)
    }

    async fn wait_hidden(&mut self, selector: &str) -> Result<()> {
        loop {
            let Some(id) = self.find_element(selector).await? else {
                return Ok(());
            };
            let displayed: Result<bool> = self
                .command(Method::GET, &format!("element/{}/displayed", id), None)
                .await;
            match displayed {
                Ok(false) => return Ok(()),
                Ok(true) => {}
                Err(e) if is_gone(&e) => return Ok(()),
                Err(e) => return Err(e),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn element_rect(&mut self, selector: &str) -> Result<ClipRect> {
        let id = self
            .find_element(selector)
            .await?
            .ok_or_else(|| anyhow!("no element matches {}", selector))?;
        self.command(Method::GET, &format!("element/{}/rect", id), None)
            .await
    }

    async fn screenshot(&mut self, clip: ClipRect) -> Result<Vec<u8>> {
        let png = self.capture_covering(clip).await?;
        clip_png(&png, clip, self.device_scale_factor)
    }

    async fn close(self) -> Result<()> {
        send::<Value>(
            &self.client,
            &self.base_url,
            Method::DELETE,
            &format!("/session/{}", self.session_id),
            None,
        )
        .await
        .map(drop)
        .with_context(|| format!("failed to close browser session {}", self.session_id))
    }
}
