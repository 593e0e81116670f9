//! Headless Chromium renderer
//!
//! Launches an isolated browser per session so no state leaks between
//! targets. Only available with the `browser` feature.

use crate::config::RendererConfig;
#[cfg(feature = "browser")]
use crate::error::IrisError;
use crate::error::Result;
use crate::renderer::{RenderSession, Renderer};
#[cfg(feature = "browser")]
use crate::renderer::WaitPolicy;
use async_trait::async_trait;

#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tokio::task::JoinHandle;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

/// Counts resources the page has fetched so far; stable counts mean the network is quiet
#[cfg(feature = "browser")]
const RESOURCE_COUNT_JS: &str = "performance.getEntriesByType('resource').length";

/// Browser-backed renderer for audit sessions
pub struct ChromiumRenderer {
    #[cfg_attr(not(feature = "browser"), allow(dead_code))]
    config: RendererConfig,
}

impl ChromiumRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl Renderer for ChromiumRenderer {
    fn name(&self) -> &str {
        "chromium"
    }

    async fn open_session(&self) -> Result<Box<dyn RenderSession>> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(self.config.viewport_width, self.config.viewport_height)
            .arg("--disable-gpu");
        for arg in &self.config.chrome_args {
            builder = builder.arg(arg.as_str());
        }
        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(ref exe) = self.config.executable {
            builder = builder.chrome_executable(exe);
        }
        let browser_config = builder
            .build()
            .map_err(|e| IrisError::RenderError(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| IrisError::RenderError(format!("Failed to launch browser: {e}")))?;

        // Drive CDP events until the browser goes away
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(p) => p,
            Err(e) => {
                let mut session = ChromiumSession {
                    browser: Some(browser),
                    page: None,
                    handler: Some(handler_task),
                };
                let _ = session.close().await;
                return Err(IrisError::RenderError(format!("Failed to open page: {e}")));
            }
        };

        info!("Browser session opened");
        Ok(Box::new(ChromiumSession {
            browser: Some(browser),
            page: Some(page),
            handler: Some(handler_task),
        }))
    }
}

/// One browser process with a single page
#[cfg(feature = "browser")]
pub struct ChromiumSession {
    browser: Option<Browser>,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
}

#[cfg(feature = "browser")]
impl ChromiumSession {
    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| IrisError::RenderError("session already closed".to_string()))
    }

    async fn resource_count(&self) -> Result<u64> {
        let value = self
            .page()?
            .evaluate_expression(RESOURCE_COUNT_JS)
            .await
            .map_err(|e| IrisError::RenderError(e.to_string()))?
            .into_value::<u64>()
            .unwrap_or_default();
        Ok(value)
    }

    async fn wait_for_network_idle(&self, policy: &WaitPolicy) -> Result<()> {
        let mut last = self.resource_count().await?;
        loop {
            tokio::time::sleep(policy.idle_window).await;
            let current = self.resource_count().await?;
            if current == last {
                return Ok(());
            }
            debug!("Network still active: {} resources (was {})", current, last);
            last = current;
        }
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl RenderSession for ChromiumSession {
    async fn load(&mut self, address: &str, policy: &WaitPolicy) -> Result<()> {
        let navigate = async {
            self.page()?
                .goto(address)
                .await
                .map_err(|e| IrisError::RenderError(format!("Navigation to {address} failed: {e}")))?;
            self.wait_for_network_idle(policy).await?;
            Ok::<(), IrisError>(())
        };

        match tokio::time::timeout(policy.timeout, navigate).await {
            Ok(outcome) => outcome,
            Err(_) => Err(IrisError::RenderError(format!(
                "Navigation timeout of {} ms exceeded",
                policy.timeout.as_millis()
            ))),
        }
    }

    async fn run_script(&mut self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page()?
            .evaluate_expression(script)
            .await
            .map_err(|e| IrisError::RenderError(format!("Script evaluation failed: {e}")))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!("Page close failed: {}", e);
            }
        }
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("Browser close failed: {}", e);
            }
            let _ = browser.wait().await;
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        Ok(())
    }
}

#[cfg(feature = "browser")]
impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}

/// Stub implementation when browser feature is not enabled
#[cfg(not(feature = "browser"))]
#[async_trait]
impl Renderer for ChromiumRenderer {
    fn name(&self) -> &str {
        "chromium (disabled)"
    }

    async fn open_session(&self) -> Result<Box<dyn RenderSession>> {
        Err(crate::error::IrisError::RenderError(
            "Browser rendering requires the 'browser' feature flag. \
             Compile with: cargo build --features browser"
                .to_string(),
        ))
    }
}
