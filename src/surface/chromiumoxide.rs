//! Chromiumoxide-backed [`BrowserSurface`] implementation.
//!
//! Bundled so the crate can drive a real page without a hosting webview:
//! launches (or attaches to) a Chromium instance, keeps one active page, and
//! evaluates compiled chains with promise awaiting and by-value returns.
//! Hosts that embed their own browser surface ignore this module and
//! implement [`BrowserSurface`] directly.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::surface::{BrowserSurface, SurfaceError};

fn cdp_error(err: impl std::fmt::Display) -> SurfaceError {
    SurfaceError::Script(err.to_string())
}

/// Launch options for the bundled Chromium surface.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub user_data_dir: Option<PathBuf>,
}

struct SurfaceState {
    browser: Browser,
    _handler: JoinHandle<()>,
    page: Page,
}

/// A single-page browser surface backed by a local Chromium instance.
pub struct ChromiumSurface {
    state: Mutex<Option<SurfaceState>>,
}

impl ChromiumSurface {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(None),
        }
    }

    /// Launch a browser and open a blank page. Idempotent once launched.
    pub async fn launch(&self, options: LaunchOptions) -> Result<(), SurfaceError> {
        let mut guard = self.state.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let mut builder = BrowserConfig::builder();
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &options.executable {
            builder = builder.chrome_executable(executable);
        }
        if let Some(dir) = &options.user_data_dir {
            builder = builder.user_data_dir(dir);
        }
        let config = builder.build().map_err(SurfaceError::Unavailable)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| SurfaceError::Unavailable(err.to_string()))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|err| SurfaceError::Unavailable(err.to_string()))?;

        *guard = Some(SurfaceState {
            browser,
            _handler: handler_task,
            page,
        });
        Ok(())
    }

    /// Close the browser and drop the page handle.
    pub async fn close(&self) -> Result<(), SurfaceError> {
        let mut guard = self.state.lock().await;
        if let Some(mut state) = guard.take() {
            state
                .browser
                .close()
                .await
                .map_err(|err| SurfaceError::Unavailable(err.to_string()))?;
        }
        Ok(())
    }

    async fn page(&self) -> Result<Page, SurfaceError> {
        let guard = self.state.lock().await;
        guard
            .as_ref()
            .map(|state| state.page.clone())
            .ok_or_else(|| SurfaceError::Unavailable("surface has not been launched".to_string()))
    }
}

impl Default for ChromiumSurface {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserSurface for ChromiumSurface {
    async fn execute_script(&self, script: &str) -> Result<JsonValue, SurfaceError> {
        let page = self.page().await?;
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(SurfaceError::Script)?;
        let result = page.evaluate(params).await.map_err(cdp_error)?;
        Ok(result.value().cloned().unwrap_or(JsonValue::Null))
    }

    async fn current_url(&self) -> Result<String, SurfaceError> {
        let page = self.page().await?;
        let url = page.url().await.map_err(cdp_error)?;
        Ok(url.unwrap_or_default())
    }

    async fn navigate(&self, url: &str) -> Result<(), SurfaceError> {
        let page = self.page().await?;
        page.goto(url)
            .await
            .map_err(|err| SurfaceError::Navigation(err.to_string()))?;
        Ok(())
    }
}

/// Convenience constructor used by standalone callers.
pub async fn launch_surface(options: LaunchOptions) -> Result<Arc<ChromiumSurface>, SurfaceError> {
    let surface = Arc::new(ChromiumSurface::new());
    surface.launch(options).await?;
    Ok(surface)
}
