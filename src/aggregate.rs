//! Result aggregation and tabular export

use crate::error::{IrisError, Result};
use crate::models::{Scan, ScanStatus, ScanTotals, TargetResult};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Sums violation and pass counts across results. Failed targets contribute zero.
pub fn aggregate(results: &[TargetResult]) -> ScanTotals {
    results.iter().fold(ScanTotals::default(), |mut acc, r| {
        acc.total_violations += r.violations.len() as u64;
        acc.total_passes += r.passes.len() as u64;
        acc
    })
}

/// One exported row per audited target
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    pub target: String,
    pub timestamp: DateTime<Utc>,
    pub violation_count: usize,
    pub pass_count: usize,
    pub inapplicable_count: usize,
    pub incomplete_count: usize,
}

impl From<&TargetResult> for TableRow {
    fn from(result: &TargetResult) -> Self {
        Self {
            target: result.target.clone(),
            timestamp: result.timestamp,
            violation_count: result.violations.len(),
            pass_count: result.passes.len(),
            inapplicable_count: result.inapplicable.len(),
            incomplete_count: result.incomplete.len(),
        }
    }
}

/// Flattens a completed scan into rows, in target order
pub fn to_table(scan: &Scan) -> Result<Vec<TableRow>> {
    if scan.status != ScanStatus::Completed {
        return Err(IrisError::PreconditionFailed(format!(
            "Scan must be completed to export results (current status: {})",
            scan.status
        )));
    }
    Ok(scan.results.iter().map(TableRow::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuditReport, Finding};
    use std::collections::BTreeSet;

    fn findings(n: usize) -> Vec<Finding> {
        (0..n)
            .map(|i| Finding {
                rule_id: format!("rule-{i}"),
                impact: None,
                tags: BTreeSet::new(),
                description: String::new(),
                help_text: String::new(),
                help_url: String::new(),
                nodes: Vec::new(),
            })
            .collect()
    }

    fn ok(target: &str, violations: usize, passes: usize) -> TargetResult {
        TargetResult::success(
            target,
            AuditReport {
                violations: findings(violations),
                passes: findings(passes),
                inapplicable: findings(1),
                incomplete: Vec::new(),
            },
        )
    }

    #[test]
    fn test_aggregate_sums_across_results() {
        let results = vec![ok("https://a.example", 2, 5), ok("https://b.example", 1, 3)];
        assert_eq!(
            aggregate(&results),
            ScanTotals {
                total_violations: 3,
                total_passes: 8
            }
        );
    }

    #[test]
    fn test_failed_targets_count_zero() {
        let results = vec![
            ok("https://a.example", 4, 1),
            TargetResult::failure("https://b.example", "unreachable"),
        ];
        let totals = aggregate(&results);
        assert_eq!(totals.total_violations, 4);
        assert_eq!(totals.total_passes, 1);
    }

    #[test]
    fn test_aggregate_empty() {
        assert_eq!(aggregate(&[]), ScanTotals::default());
    }

    #[test]
    fn test_to_table_requires_completed() {
        let mut scan = Scan::new(vec!["https://a.example".into()]);
        for status in [ScanStatus::Pending, ScanStatus::Running, ScanStatus::Failed] {
            scan.status = status;
            let err = to_table(&scan).unwrap_err();
            assert!(matches!(err, IrisError::PreconditionFailed(_)));
        }
    }

    #[test]
    fn test_to_table_one_row_per_result_in_order() {
        let mut scan = Scan::new(vec!["https://a.example".into(), "https://b.example".into()]);
        scan.status = ScanStatus::Completed;
        scan.results = vec![
            ok("https://a.example", 2, 1),
            TargetResult::failure("https://b.example", "timeout"),
        ];
        let rows = to_table(&scan).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].target, "https://a.example");
        assert_eq!(rows[0].violation_count, 2);
        assert_eq!(rows[0].inapplicable_count, 1);
        assert_eq!(rows[1].target, "https://b.example");
        assert_eq!(rows[1].violation_count, 0);
        assert_eq!(rows[1].pass_count, 0);
    }
}
