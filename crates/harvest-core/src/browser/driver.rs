//! Browser driver abstraction.

use crate::Result;
use async_trait::async_trait;
use std::time::Duration;

/// The browser primitives the search controller needs.
///
/// Methods take `&self` so a driver can be shared by retried operations;
/// implementations serialize commands internally where required.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Load `url` in the current window.
    async fn goto(&self, url: &str) -> Result<()>;

    /// Wait up to `timeout` for `css_selector` to appear, then click it.
    async fn click(&self, css_selector: &str, timeout: Duration) -> Result<()>;

    /// Current `document.body.scrollHeight`.
    async fn page_height(&self) -> Result<u64>;

    async fn scroll_to_bottom(&self) -> Result<()>;

    /// Serialized DOM of the current page.
    async fn page_source(&self) -> Result<String>;

    /// End the session. Further calls fail.
    async fn quit(&self) -> Result<()>;
}

/// Creates a fresh driver session per entity.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    type Driver: BrowserDriver;

    async fn launch(&self) -> Result<Self::Driver>;
}
