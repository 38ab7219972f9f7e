//! The hosted browser surface boundary.
//!
//! Everything this crate knows about the embedded browser is behind
//! [`BrowserSurface`]: submit a script string and get its structured-clone
//! result back, read the current navigation URL, navigate. Hosts that embed
//! their own webview implement this trait; [`chromiumoxide::ChromiumSurface`]
//! is the bundled CDP-backed implementation for standalone use.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;

pub mod chromiumoxide;

/// Errors surfaced by the hosting browser.
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// The injected script threw, including timeout errors raised by
    /// compiled poll loops.
    #[error("script execution failed: {0}")]
    Script(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("browser surface is not available: {0}")]
    Unavailable(String),
}

/// A page that can run injected scripts and report where it is.
///
/// Implementations return the script's completion value as JSON; a script
/// with no return value yields `null`. Promise results are awaited before
/// being returned.
#[async_trait]
pub trait BrowserSurface: Send + Sync {
    /// Execute a self-contained script string and return its result.
    async fn execute_script(&self, script: &str) -> Result<JsonValue, SurfaceError>;

    /// The page's current navigation URL.
    async fn current_url(&self) -> Result<String, SurfaceError>;

    /// Navigate the page to `url`.
    async fn navigate(&self, url: &str) -> Result<(), SurfaceError>;

    /// Apply a cookie string to the page's document.
    async fn set_cookies(&self, cookies: &str) -> Result<(), SurfaceError> {
        self.execute_script(&format!("document.cookie = {cookies}"))
            .await
            .map(|_| ())
    }
}
