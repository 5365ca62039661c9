//! W3C WebDriver backend (chromedriver, selenium) via fantoccini.

use crate::browser::driver::{BrowserDriver, BrowserLauncher};
use crate::config::SearchConfig;
use crate::{HarvestError, Result};
use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Chrome arguments for every session: headless, fixed viewport, no GPU,
/// no extensions or popup blocking, private mode.
pub fn chrome_args() -> Vec<String> {
    vec![
        "--headless".to_string(),
        "--disable-gpu".to_string(),
        format!(
            "--window-size={},{}",
            SearchConfig::WINDOW_WIDTH,
            SearchConfig::WINDOW_HEIGHT
        ),
        "--ignore-certificate-errors".to_string(),
        "--disable-extensions".to_string(),
        "--disable-popup-blocking".to_string(),
        "--incognito".to_string(),
    ]
}

fn capabilities() -> Map<String, Value> {
    let mut caps = Map::new();
    caps.insert("browserName".to_string(), json!("chrome"));
    caps.insert("goog:chromeOptions".to_string(), json!({ "args": chrome_args() }));
    caps
}

/// One WebDriver session.
pub struct WebDriverSession {
    client: Client,
}

impl WebDriverSession {
    /// Open a new session against the WebDriver server at `webdriver_url`.
    pub async fn connect(webdriver_url: &str) -> Result<Self> {
        let mut builder = ClientBuilder::rustls().map_err(|e| {
            HarvestError::session(format!("Failed to initialise TLS for WebDriver: {}", e))
        })?;
        builder.capabilities(capabilities());
        let client = builder.connect(webdriver_url).await?;
        info!("Opened WebDriver session at {}", webdriver_url);
        Ok(Self { client })
    }
}

#[async_trait]
impl BrowserDriver for WebDriverSession {
    async fn goto(&self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        self.client.goto(url).await?;
        Ok(())
    }

    async fn click(&self, css_selector: &str, timeout: Duration) -> Result<()> {
        let element = self
            .client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(css_selector))
            .await?;
        element.click().await?;
        Ok(())
    }

    async fn page_height(&self) -> Result<u64> {
        let value = self
            .client
            .execute("return document.body.scrollHeight", vec![])
            .await?;
        value
            .as_u64()
            .or_else(|| value.as_f64().map(|h| h.max(0.0) as u64))
            .ok_or_else(|| HarvestError::session(format!("Unexpected page height: {}", value)))
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.client
            .execute("window.scrollTo(0, document.body.scrollHeight);", vec![])
            .await?;
        Ok(())
    }

    async fn page_source(&self) -> Result<String> {
        Ok(self.client.source().await?)
    }

    async fn quit(&self) -> Result<()> {
        self.client.clone().close().await?;
        debug!("Closed WebDriver session");
        Ok(())
    }
}

/// Launches [`WebDriverSession`]s against a fixed endpoint.
#[derive(Debug, Clone)]
pub struct WebDriverLauncher {
    webdriver_url: String,
}

impl WebDriverLauncher {
    pub fn new(webdriver_url: impl Into<String>) -> Self {
        Self {
            webdriver_url: webdriver_url.into(),
        }
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    type Driver = WebDriverSession;

    async fn launch(&self) -> Result<WebDriverSession> {
        WebDriverSession::connect(&self.webdriver_url).await
    }
}
