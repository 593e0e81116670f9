//! Single-target audit execution
//!
//! [`AuditRunner::audit`] never fails: any renderer or analyzer problem is
//! captured in the returned [`TargetResult`]'s `error` field.

use crate::analyzer::Analyzer;
use crate::error::{IrisError, Result};
use crate::models::{AuditReport, TargetResult};
use crate::renderer::{RenderSession, Renderer, WaitPolicy};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Runs one audit against one target using a fresh render session
#[derive(Clone)]
pub struct AuditRunner {
    renderer: Arc<dyn Renderer>,
    analyzer: Arc<dyn Analyzer>,
    policy: WaitPolicy,
    analysis_timeout: Duration,
}

impl AuditRunner {
    pub fn new(renderer: Arc<dyn Renderer>, analyzer: Arc<dyn Analyzer>) -> Self {
        Self {
            renderer,
            analyzer,
            policy: WaitPolicy::default(),
            analysis_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_policy(mut self, policy: WaitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_analysis_timeout(mut self, timeout: Duration) -> Self {
        self.analysis_timeout = timeout;
        self
    }

    /// Audits `target`, returning either its findings or a captured error
    pub async fn audit(&self, target: &str) -> TargetResult {
        match self.try_audit(target).await {
            Ok(report) => {
                info!(
                    "Completed audit for {}: {} violations, {} passes",
                    target,
                    report.violations.len(),
                    report.passes.len()
                );
                TargetResult::success(target, report)
            }
            Err(e) => {
                error!("Error scanning {}: {}", target, e);
                TargetResult::failure(target, format!("Failed to scan {target}: {e}"))
            }
        }
    }

    async fn try_audit(&self, target: &str) -> Result<AuditReport> {
        let mut session =
            match tokio::time::timeout(self.policy.timeout, self.renderer.open_session()).await {
                Ok(opened) => opened?,
                Err(_) => {
                    return Err(IrisError::RenderError(format!(
                        "{} session did not open within {} ms",
                        self.renderer.name(),
                        self.policy.timeout.as_millis()
                    )))
                }
            };

        let outcome = self.audit_in_session(session.as_mut(), target).await;

        // Released on every path, including analysis failure and timeouts
        if let Err(e) = session.close().await {
            warn!("Failed to close render session for {}: {}", target, e);
        }

        outcome
    }

    async fn audit_in_session(
        &self,
        session: &mut dyn RenderSession,
        target: &str,
    ) -> Result<AuditReport> {
        // The renderer is expected to honour the policy; this bound holds even if it does not
        match tokio::time::timeout(self.policy.timeout, session.load(target, &self.policy)).await
        {
            Ok(loaded) => loaded?,
            Err(_) => {
                return Err(IrisError::RenderError(format!(
                    "Navigation timeout of {} ms exceeded",
                    self.policy.timeout.as_millis()
                )))
            }
        }

        match tokio::time::timeout(self.analysis_timeout, self.analyzer.analyze(session)).await {
            Ok(report) => report,
            Err(_) => Err(IrisError::AnalysisError(format!(
                "{} did not finish within {} ms",
                self.analyzer.name(),
                self.analysis_timeout.as_millis()
            ))),
        }
    }
}
