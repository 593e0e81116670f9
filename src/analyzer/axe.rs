//! axe-core analyzer
//!
//! Injects the axe-core bundle into the rendered page, runs it and maps the
//! raw report onto [`Finding`]s. Errors reported by axe itself come back as
//! `{ "error": message }` and are surfaced as [`IrisError::AnalysisError`].

use crate::analyzer::Analyzer;
use crate::error::{IrisError, Result};
use crate::models::{AuditReport, Finding, FindingNode, Impact};
use crate::renderer::RenderSession;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use tokio::sync::OnceCell;
use tracing::debug;

/// Runs axe and resolves with either its results or an error message
pub const RUN_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (typeof axe === 'undefined') {
            resolve({ error: 'axe-core is not loaded in the page' });
            return;
        }
        axe.run((err, results) => {
            if (err) {
                resolve({ error: err.message || String(err) });
            } else {
                resolve(JSON.parse(JSON.stringify(results)));
            }
        });
    })
"#;

/// Separator used to flatten iframe / shadow DOM selector chains
const SELECTOR_CHAIN_SEPARATOR: &str = " >>> ";

enum ScriptSource {
    File(PathBuf),
    Inline(String),
}

/// Analyzer backed by the axe-core JavaScript engine
pub struct AxeAnalyzer {
    source: ScriptSource,
    script: OnceCell<String>,
}

impl AxeAnalyzer {
    /// Uses the axe bundle at `path`; the file is read on first use
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: ScriptSource::File(path.into()),
            script: OnceCell::new(),
        }
    }

    /// Uses an in-memory axe bundle
    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: ScriptSource::Inline(source.into()),
            script: OnceCell::new(),
        }
    }

    async fn script(&self) -> Result<&str> {
        let script = self
            .script
            .get_or_try_init(|| async {
                match &self.source {
                    ScriptSource::Inline(s) => Ok(s.clone()),
                    ScriptSource::File(path) => {
                        tokio::fs::read_to_string(path).await.map_err(|e| {
                            IrisError::AnalysisError(format!(
                                "Cannot read axe-core script {}: {e}",
                                path.display()
                            ))
                        })
                    }
                }
            })
            .await?;
        Ok(script.as_str())
    }
}

#[async_trait]
impl Analyzer for AxeAnalyzer {
    fn name(&self) -> &str {
        "axe-core"
    }

    async fn analyze(&self, session: &mut dyn RenderSession) -> Result<AuditReport> {
        let script = self.script().await?;
        session
            .run_script(script)
            .await
            .map_err(|e| IrisError::AnalysisError(format!("Script injection failed: {e}")))?;

        let raw = session.run_script(RUN_SCRIPT).await?;
        let report = parse_report(raw)?;
        debug!(
            "axe reported {} violations, {} passes, {} inapplicable, {} incomplete",
            report.violations.len(),
            report.passes.len(),
            report.inapplicable.len(),
            report.incomplete.len()
        );
        Ok(report)
    }
}

#[derive(Debug, Deserialize)]
struct AxeResults {
    error: Option<String>,
    #[serde(default)]
    violations: Vec<AxeRule>,
    #[serde(default)]
    passes: Vec<AxeRule>,
    #[serde(default)]
    inapplicable: Vec<AxeRule>,
    #[serde(default)]
    incomplete: Vec<AxeRule>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AxeRule {
    id: String,
    impact: Option<Impact>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    help: String,
    #[serde(default)]
    help_url: String,
    #[serde(default)]
    nodes: Vec<AxeNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AxeNode {
    #[serde(default)]
    html: String,
    #[serde(default)]
    target: Vec<Value>,
    impact: Option<Impact>,
    failure_summary: Option<String>,
}

/// Converts the raw value returned by [`RUN_SCRIPT`] into an [`AuditReport`]
pub fn parse_report(raw: Value) -> Result<AuditReport> {
    if raw.is_null() {
        return Err(IrisError::AnalysisError("axe returned no results".to_string()));
    }
    let results: AxeResults = serde_json::from_value(raw)
        .map_err(|e| IrisError::AnalysisError(format!("Malformed axe report: {e}")))?;

    if let Some(message) = results.error {
        return Err(IrisError::AnalysisError(message));
    }

    Ok(AuditReport {
        violations: convert(results.violations, true),
        passes: convert(results.passes, false),
        inapplicable: convert(results.inapplicable, false),
        incomplete: convert(results.incomplete, false),
    })
}

fn convert(rules: Vec<AxeRule>, keep_failure_summary: bool) -> Vec<Finding> {
    rules
        .into_iter()
        .map(|rule| Finding {
            rule_id: rule.id,
            impact: rule.impact,
            tags: rule.tags.into_iter().collect(),
            description: rule.description,
            help_text: rule.help,
            help_url: rule.help_url,
            nodes: rule
                .nodes
                .into_iter()
                .map(|node| FindingNode {
                    markup_snippet: node.html,
                    target_selectors: node.target.iter().map(flatten_selector).collect(),
                    impact: node.impact,
                    failure_summary: if keep_failure_summary {
                        node.failure_summary
                    } else {
                        None
                    },
                })
                .collect(),
        })
        .collect()
}

/// axe emits nested arrays for elements inside iframes or shadow roots
fn flatten_selector(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .map(flatten_selector)
            .collect::<Vec<_>>()
            .join(SELECTOR_CHAIN_SEPARATOR),
        other => other.to_string(),
    }
}
