//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use iris::analyzer::axe::RUN_SCRIPT;
use iris::analyzer::AxeAnalyzer;
use iris::audit::AuditRunner;
use iris::error::{IrisError, Result};
use iris::models::{Scan, ScanPatch, ScanStatus};
use iris::orchestrator::ScanOrchestrator;
use iris::renderer::{RenderSession, Renderer, WaitPolicy};
use iris::service::ScanService;
use iris::store::{ListFilter, MemoryStore, Page, PageOptions, ScanStore};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Stand-in for the axe bundle; the fake session recognises it as the injection step
pub const AXE_SOURCE: &str = "/* axe-core test bundle */ window.axe = {};";

/// How the fake browser reacts to a target
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Page loads and axe returns this raw report
    Report(Value),
    /// Navigation fails with this message
    LoadError(String),
    /// Navigation never settles
    Hang,
    /// Page loads but axe reports an error
    AnalyzerError(String),
}

/// Builds a raw axe report with the given number of violations and passes
pub fn axe_report(violations: usize, passes: usize) -> Value {
    let rule = |id: String, impact: Value, summary: bool| {
        let mut node = json!({
            "html": format!("<div id=\"{id}\"></div>"),
            "target": [format!("#{id}")],
            "impact": impact.clone(),
        });
        if summary {
            node["failureSummary"] = json!("Fix any of the following: ...");
        }
        json!({
            "id": id,
            "impact": impact,
            "tags": ["wcag2a", "wcag2aa"],
            "description": "test rule",
            "help": "test help",
            "helpUrl": "https://dequeuniversity.com/rules/axe/4.8/test",
            "nodes": [node],
        })
    };
    json!({
        "violations": (0..violations)
            .map(|i| rule(format!("violation-{i}"), json!("serious"), true))
            .collect::<Vec<_>>(),
        "passes": (0..passes)
            .map(|i| rule(format!("pass-{i}"), Value::Null, false))
            .collect::<Vec<_>>(),
        "inapplicable": [],
        "incomplete": [],
    })
}

/// Scripted renderer that records how many sessions were opened and closed
#[derive(Clone, Default)]
pub struct FakeRenderer {
    behaviors: Arc<HashMap<String, Behavior>>,
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
    load_delay: Duration,
    open_delay: Duration,
    refuse_sessions: bool,
}

impl FakeRenderer {
    pub fn new(behaviors: impl IntoIterator<Item = (&'static str, Behavior)>) -> Self {
        Self {
            behaviors: Arc::new(
                behaviors
                    .into_iter()
                    .map(|(t, b)| (t.to_string(), b))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    /// Every load takes at least `delay`
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    /// `open_session` takes at least `delay`, as with a stuck browser launch
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Fails `open_session` outright, as when the browser cannot launch
    pub fn refusing() -> Self {
        Self {
            refuse_sessions: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    fn name(&self) -> &str {
        "fake"
    }

    async fn open_session(&self) -> Result<Box<dyn RenderSession>> {
        tokio::time::sleep(self.open_delay).await;
        if self.refuse_sessions {
            return Err(IrisError::RenderError("Failed to launch browser".to_string()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            behaviors: Arc::clone(&self.behaviors),
            closed: Arc::clone(&self.closed),
            load_delay: self.load_delay,
            current: None,
            is_closed: false,
        }))
    }
}

pub struct FakeSession {
    behaviors: Arc<HashMap<String, Behavior>>,
    closed: Arc<AtomicUsize>,
    load_delay: Duration,
    current: Option<Behavior>,
    is_closed: bool,
}

#[async_trait]
impl RenderSession for FakeSession {
    async fn load(&mut self, address: &str, policy: &WaitPolicy) -> Result<()> {
        tokio::time::sleep(self.load_delay).await;
        let behavior = self
            .behaviors
            .get(address)
            .cloned()
            .unwrap_or_else(|| Behavior::Report(axe_report(0, 0)));
        match behavior {
            Behavior::LoadError(msg) => Err(IrisError::RenderError(msg)),
            Behavior::Hang => {
                tokio::time::sleep(policy.timeout * 10).await;
                Ok(())
            }
            other => {
                self.current = Some(other);
                Ok(())
            }
        }
    }

    async fn run_script(&mut self, script: &str) -> Result<Value> {
        if script == AXE_SOURCE {
            return Ok(Value::Null);
        }
        assert_eq!(script, RUN_SCRIPT, "unexpected script");
        match self.current {
            Some(Behavior::Report(ref report)) => Ok(report.clone()),
            Some(Behavior::AnalyzerError(ref msg)) => Ok(json!({ "error": msg })),
            _ => Err(IrisError::RenderError("no document loaded".to_string())),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if !self.is_closed {
            self.is_closed = true;
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Memory store that can be told to fail writes moving a scan into one status
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_on: Mutex<Option<ScanStatus>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, status: Option<ScanStatus>) {
        *self.fail_on.lock().unwrap() = status;
    }

    fn check(&self, patch: &ScanPatch) -> Result<()> {
        let fail_on = *self.fail_on.lock().unwrap();
        match (fail_on, patch.status) {
            (Some(blocked), Some(next)) if blocked == next => {
                Err(IrisError::StoreError("database unavailable".to_string()))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ScanStore for FlakyStore {
    async fn create(&self, targets: Vec<String>) -> Result<Scan> {
        self.inner.create(targets).await
    }

    async fn get(&self, id: Uuid) -> Result<Scan> {
        self.inner.get(id).await
    }

    async fn update(&self, id: Uuid, patch: ScanPatch) -> Result<Scan> {
        self.check(&patch)?;
        self.inner.update(id, patch).await
    }

    async fn update_if(&self, id: Uuid, allowed: &[ScanStatus], patch: ScanPatch) -> Result<Scan> {
        self.check(&patch)?;
        self.inner.update_if(id, allowed, patch).await
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.inner.delete(id).await
    }

    async fn list(&self, filter: &ListFilter, options: &PageOptions) -> Result<Page<Scan>> {
        self.inner.list(filter, options).await
    }
}

/// Short load bound so hanging targets fail quickly
pub fn test_policy() -> WaitPolicy {
    WaitPolicy::default().with_timeout(Duration::from_millis(200))
}

pub fn test_runner(renderer: FakeRenderer) -> AuditRunner {
    AuditRunner::new(
        Arc::new(renderer),
        Arc::new(AxeAnalyzer::from_source(AXE_SOURCE)),
    )
    .with_policy(test_policy())
    .with_analysis_timeout(Duration::from_secs(2))
}

/// Service over `store` using the fake browser
pub fn test_service_with_store(renderer: FakeRenderer, store: Arc<dyn ScanStore>) -> ScanService {
    let orchestrator = ScanOrchestrator::new(Arc::clone(&store), test_runner(renderer));
    ScanService::new(store, orchestrator)
}

/// Service over a fresh memory store using the fake browser
pub fn test_service(renderer: FakeRenderer) -> ScanService {
    test_service_with_store(renderer, Arc::new(MemoryStore::new()))
}
