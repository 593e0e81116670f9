//! Page rendering capability
//!
//! A [`Renderer`] hands out scoped [`RenderSession`]s. Each session loads one
//! document and executes scripts against it; callers must close it on every
//! exit path. Sessions are never shared across targets or scans.

pub mod chromium;

use crate::config::RendererConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Bounded wait applied when loading a target: the load event, then no new
/// network activity for `idle_window`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Hard upper bound; exceeding it fails the load
    pub timeout: Duration,
    pub idle_window: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            idle_window: Duration::from_millis(500),
        }
    }
}

impl WaitPolicy {
    pub fn from_config(config: &RendererConfig) -> Self {
        Self {
            timeout: config.timeout(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// One isolated document context
#[async_trait]
pub trait RenderSession: Send {
    /// Navigates to `address` and waits per `policy`
    async fn load(&mut self, address: &str, policy: &WaitPolicy) -> Result<()>;

    /// Evaluates `script` in the loaded document, awaiting a returned promise
    async fn run_script(&mut self, script: &str) -> Result<serde_json::Value>;

    /// Releases the session. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}

/// Factory for render sessions
#[async_trait]
pub trait Renderer: Send + Sync {
    fn name(&self) -> &str;

    async fn open_session(&self) -> Result<Box<dyn RenderSession>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_waits_for_network_idle_30s() {
        let policy = WaitPolicy::default();
        assert_eq!(policy.timeout, Duration::from_secs(30));
        assert_eq!(policy.idle_window, Duration::from_millis(500));
    }

    #[test]
    fn test_policy_follows_config_timeout() {
        let config = RendererConfig {
            timeout_secs: 12,
            ..RendererConfig::default()
        };
        assert_eq!(
            WaitPolicy::from_config(&config).timeout,
            Duration::from_secs(12)
        );
    }
}
