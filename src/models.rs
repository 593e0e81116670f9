//! Core data models for iris

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::IrisError;

/// Lifecycle state of a scan
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ScanStatus {
    /// Completed and failed scans never transition on their own
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Running => "running",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanStatus {
    type Err = IrisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(ScanStatus::Pending),
            "running" => Ok(ScanStatus::Running),
            "completed" => Ok(ScanStatus::Completed),
            "failed" => Ok(ScanStatus::Failed),
            other => Err(IrisError::ValidationError(format!(
                "unknown status '{other}' (expected pending, running, completed or failed)"
            ))),
        }
    }
}

/// Severity reported by the analyzer for a rule or a node
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Critical,
    Serious,
    Moderate,
    Minor,
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Impact::Critical => write!(f, "critical"),
            Impact::Serious => write!(f, "serious"),
            Impact::Moderate => write!(f, "moderate"),
            Impact::Minor => write!(f, "minor"),
        }
    }
}

/// One DOM node a rule was evaluated against
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FindingNode {
    /// Outer HTML of the node
    pub markup_snippet: String,
    /// Selectors locating the node in the document
    pub target_selectors: Vec<String>,
    pub impact: Option<Impact>,
    /// Only present on violations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_summary: Option<String>,
}

/// One rule outcome reported by the analyzer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub rule_id: String,
    pub impact: Option<Impact>,
    /// Category labels (e.g. wcag2aa)
    pub tags: BTreeSet<String>,
    pub description: String,
    pub help_text: String,
    pub help_url: String,
    #[serde(default)]
    pub nodes: Vec<FindingNode>,
}

/// Structured report produced by an analyzer for one rendered document.
/// Missing categories deserialize as empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuditReport {
    #[serde(default)]
    pub violations: Vec<Finding>,
    #[serde(default)]
    pub passes: Vec<Finding>,
    #[serde(default)]
    pub inapplicable: Vec<Finding>,
    #[serde(default)]
    pub incomplete: Vec<Finding>,
}

/// Outcome of auditing a single target. Either carries findings or an error, never both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetResult {
    pub target: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub violations: Vec<Finding>,
    #[serde(default)]
    pub passes: Vec<Finding>,
    #[serde(default)]
    pub inapplicable: Vec<Finding>,
    #[serde(default)]
    pub incomplete: Vec<Finding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TargetResult {
    /// Builds a successful result from an analyzer report
    pub fn success(target: impl Into<String>, report: AuditReport) -> Self {
        Self {
            target: target.into(),
            timestamp: Utc::now(),
            violations: report.violations,
            passes: report.passes,
            inapplicable: report.inapplicable,
            incomplete: report.incomplete,
            error: None,
        }
    }

    /// Builds a failed result; all finding collections stay empty
    pub fn failure(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            timestamp: Utc::now(),
            violations: Vec::new(),
            passes: Vec::new(),
            inapplicable: Vec::new(),
            incomplete: Vec::new(),
            error: Some(message.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Summary counts derived from a scan's results
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScanTotals {
    pub total_violations: u64,
    pub total_passes: u64,
}

/// A unit of work: one or more targets audited together
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Scan {
    pub id: Uuid,
    pub targets: Vec<String>,
    pub status: ScanStatus,
    #[serde(default)]
    pub results: Vec<TargetResult>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_violations: u64,
    #[serde(default)]
    pub total_passes: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Scan {
    /// Creates a pending scan with a fresh id
    pub fn new(targets: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            targets,
            status: ScanStatus::Pending,
            results: Vec::new(),
            failure_reason: None,
            started_at: now,
            completed_at: None,
            total_violations: 0,
            total_passes: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn totals(&self) -> ScanTotals {
        ScanTotals {
            total_violations: self.total_violations,
            total_passes: self.total_passes,
        }
    }

    /// Number of targets whose audit failed
    pub fn failed_targets(&self) -> usize {
        self.results.iter().filter(|r| r.is_failure()).count()
    }
}

/// Partial update applied to a stored scan. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanPatch {
    pub targets: Option<Vec<String>>,
    pub status: Option<ScanStatus>,
    pub results: Option<(Vec<TargetResult>, ScanTotals)>,
    pub failure_reason: Option<Option<String>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

impl ScanPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: ScanStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        self.targets = Some(targets);
        self
    }

    /// Results and their totals always travel together
    pub fn with_results(mut self, results: Vec<TargetResult>, totals: ScanTotals) -> Self {
        self.results = Some((results, totals));
        self
    }

    pub fn with_failure_reason(mut self, reason: Option<String>) -> Self {
        self.failure_reason = Some(reason);
        self
    }

    pub fn with_started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    pub fn with_completed_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.completed_at = Some(at);
        self
    }

    /// Applies the patch and bumps `updated_at`
    pub fn apply(self, scan: &mut Scan) {
        if let Some(targets) = self.targets {
            scan.targets = targets;
        }
        if let Some(status) = self.status {
            scan.status = status;
        }
        if let Some((results, totals)) = self.results {
            scan.results = results;
            scan.total_violations = totals.total_violations;
            scan.total_passes = totals.total_passes;
        }
        if let Some(reason) = self.failure_reason {
            scan.failure_reason = reason;
        }
        if let Some(at) = self.started_at {
            scan.started_at = at;
        }
        if let Some(at) = self.completed_at {
            scan.completed_at = at;
        }
        scan.updated_at = Utc::now();
    }
}

/// Caller-facing update body: only targets and status may be changed directly
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScanUpdate {
    #[serde(default, alias = "urls")]
    pub targets: Option<Vec<String>>,
    #[serde(default)]
    pub status: Option<ScanStatus>,
}

impl ScanUpdate {
    pub fn is_empty(&self) -> bool {
        self.targets.is_none() && self.status.is_none()
    }

    /// New targets or a move back to `pending` discard the previous run:
    /// results, totals, `failure_reason` and `completed_at` are cleared.
    pub fn into_patch(self) -> ScanPatch {
        let resets = self.targets.is_some() || self.status.is_some_and(|s| !s.is_terminal());
        let patch = ScanPatch {
            targets: self.targets,
            status: self.status,
            ..ScanPatch::default()
        };
        if !resets {
            return patch;
        }
        ScanPatch {
            status: Some(patch.status.unwrap_or(ScanStatus::Pending)),
            ..patch
        }
        .with_results(Vec::new(), ScanTotals::default())
        .with_failure_reason(None)
        .with_completed_at(None)
    }
}
