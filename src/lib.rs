//! Iris - Accessibility Scan Service
//!
//! Registers one or more web pages as a named scan, renders each page in an
//! isolated headless browser, runs the axe-core analyzer against it and
//! aggregates the findings. Per-target failures are captured in the scan's
//! results; only orchestration problems fail a scan as a whole.

pub mod aggregate;
pub mod analyzer;
pub mod audit;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod renderer;
pub mod report;
pub mod server;
pub mod service;
pub mod store;
pub mod validate;

use crate::analyzer::AxeAnalyzer;
use crate::audit::AuditRunner;
use crate::config::AppConfig;
use crate::orchestrator::ScanOrchestrator;
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::WaitPolicy;
use crate::service::ScanService;
use crate::store::ScanStore;
use std::sync::Arc;
use std::time::Duration;

/// Wires the Chromium renderer and axe analyzer into a service over `store`
pub fn build_service(config: &AppConfig, store: Arc<dyn ScanStore>) -> ScanService {
    let renderer = Arc::new(ChromiumRenderer::new(config.renderer.clone()));
    let analyzer = Arc::new(AxeAnalyzer::from_path(config.analyzer.script_path.clone()));
    let runner = AuditRunner::new(renderer, analyzer)
        .with_policy(WaitPolicy::from_config(&config.renderer))
        .with_analysis_timeout(Duration::from_secs(config.analyzer.timeout_secs));
    let orchestrator = ScanOrchestrator::new(Arc::clone(&store), runner);
    ScanService::new(store, orchestrator)
}
