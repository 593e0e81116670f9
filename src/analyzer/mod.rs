//! Accessibility analysis capability
//!
//! An [`Analyzer`] runs inside an already loaded [`RenderSession`] and
//! returns a structured [`AuditReport`].

pub mod axe;

pub use axe::AxeAnalyzer;

use crate::error::Result;
use crate::models::AuditReport;
use crate::renderer::RenderSession;
use async_trait::async_trait;

/// Trait for accessibility analysis backends
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Returns the analyzer name
    fn name(&self) -> &str;

    /// Analyzes the document currently loaded in `session`
    async fn analyze(&self, session: &mut dyn RenderSession) -> Result<AuditReport>;
}
