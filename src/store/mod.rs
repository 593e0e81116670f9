//! Durable scan records
//!
//! [`ScanStore`] is the persistence seam: CRUD plus filtered, sorted and
//! paginated listing. [`ScanStore::update_if`] is an atomic compare-and-set
//! on status so concurrent executions of one scan cannot both start.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::{IrisError, Result};
use crate::models::{Scan, ScanPatch, ScanStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use uuid::Uuid;

pub const DEFAULT_LIMIT: usize = 10;
pub const DEFAULT_PAGE: usize = 1;

/// Listing filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListFilter {
    pub status: Option<ScanStatus>,
}

/// Sorting and paging options
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageOptions {
    /// `field:asc|desc`, comma separated
    pub sort_by: Option<String>,
    pub limit: Option<usize>,
    pub page: Option<usize>,
}

/// One page of a listing
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub results: Vec<T>,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
    pub total_results: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortField {
    CreatedAt,
    UpdatedAt,
    StartedAt,
    CompletedAt,
    Status,
    TotalViolations,
    TotalPasses,
}

impl SortField {
    fn parse(name: &str) -> Result<Self> {
        match name {
            "createdAt" => Ok(Self::CreatedAt),
            "updatedAt" => Ok(Self::UpdatedAt),
            "startedAt" => Ok(Self::StartedAt),
            "completedAt" => Ok(Self::CompletedAt),
            "status" => Ok(Self::Status),
            "totalViolations" => Ok(Self::TotalViolations),
            "totalPasses" => Ok(Self::TotalPasses),
            other => Err(IrisError::ValidationError(format!("cannot sort by '{other}'"))),
        }
    }

    fn compare(&self, a: &Scan, b: &Scan) -> Ordering {
        match self {
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            Self::StartedAt => a.started_at.cmp(&b.started_at),
            Self::CompletedAt => a.completed_at.cmp(&b.completed_at),
            Self::Status => a.status.cmp(&b.status),
            Self::TotalViolations => a.total_violations.cmp(&b.total_violations),
            Self::TotalPasses => a.total_passes.cmp(&b.total_passes),
        }
    }
}

/// Parsed `sortBy` expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortBy(Vec<(SortField, bool)>);

impl SortBy {
    /// Parses `field:asc,other:desc`; direction defaults to ascending
    pub fn parse(expr: Option<&str>) -> Result<Self> {
        let Some(expr) = expr.map(str::trim).filter(|e| !e.is_empty()) else {
            return Ok(Self(vec![(SortField::CreatedAt, false)]));
        };
        let keys = expr
            .split(',')
            .map(|part| {
                let (field, dir) = part.trim().split_once(':').unwrap_or((part.trim(), "asc"));
                let descending = match dir {
                    "asc" => false,
                    "desc" => true,
                    other => {
                        return Err(IrisError::ValidationError(format!(
                            "invalid sort direction '{other}'"
                        )))
                    }
                };
                Ok((SortField::parse(field)?, descending))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self(keys))
    }

    fn compare(&self, a: &Scan, b: &Scan) -> Ordering {
        for (field, descending) in &self.0 {
            let ord = field.compare(a, b);
            let ord = if *descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.id.cmp(&b.id)
    }
}

/// Filters, sorts and slices an unordered collection of scans
pub fn paginate<'a>(
    scans: impl IntoIterator<Item = &'a Scan>,
    filter: &ListFilter,
    options: &PageOptions,
) -> Result<Page<Scan>> {
    let sort = SortBy::parse(options.sort_by.as_deref())?;
    let limit = options.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT);
    let page = options.page.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE);

    let mut matching: Vec<&Scan> = scans
        .into_iter()
        .filter(|s| filter.status.map_or(true, |status| s.status == status))
        .collect();
    matching.sort_by(|a, b| sort.compare(a, b));

    let total_results = matching.len();
    let total_pages = total_results.div_ceil(limit);
    let results = matching
        .into_iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .cloned()
        .collect();

    Ok(Page {
        results,
        page,
        limit,
        total_pages,
        total_results,
    })
}

/// Applies `patch` to the scan `id` in `scans` if its status is one of `allowed`
pub(crate) fn patch_in_place(
    scans: &mut HashMap<Uuid, Scan>,
    id: Uuid,
    allowed: Option<&[ScanStatus]>,
    patch: ScanPatch,
) -> Result<Scan> {
    let scan = scans.get_mut(&id).ok_or_else(|| not_found(id))?;
    if let Some(allowed) = allowed {
        if !allowed.contains(&scan.status) {
            return Err(IrisError::Conflict(format!(
                "Scan is already {}",
                scan.status
            )));
        }
    }
    patch.apply(scan);
    Ok(scan.clone())
}

pub(crate) fn not_found(id: Uuid) -> IrisError {
    IrisError::NotFound(format!("Scan {id} not found"))
}

/// Persistence contract for scans
#[async_trait]
pub trait ScanStore: Send + Sync {
    /// Persists a new pending scan
    async fn create(&self, targets: Vec<String>) -> Result<Scan>;

    async fn get(&self, id: Uuid) -> Result<Scan>;

    async fn update(&self, id: Uuid, patch: ScanPatch) -> Result<Scan>;

    /// Applies `patch` only if the current status is in `allowed`, otherwise `Conflict`
    async fn update_if(&self, id: Uuid, allowed: &[ScanStatus], patch: ScanPatch) -> Result<Scan>;

    async fn delete(&self, id: Uuid) -> Result<()>;

    async fn list(&self, filter: &ListFilter, options: &PageOptions) -> Result<Page<Scan>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn scans() -> Vec<Scan> {
        let base = Utc::now();
        (0..5)
            .map(|i| {
                let mut s = Scan::new(vec![format!("https://site{i}.example")]);
                s.created_at = base + Duration::seconds(i);
                s.total_violations = (5 - i) as u64;
                if i % 2 == 0 {
                    s.status = ScanStatus::Completed;
                }
                s
            })
            .collect()
    }

    #[test]
    fn test_default_options() {
        let all = scans();
        let page = paginate(&all, &ListFilter::default(), &PageOptions::default()).unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, 10);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.total_results, 5);
        assert_eq!(page.results[0].targets[0], "https://site0.example");
    }

    #[test]
    fn test_status_filter() {
        let all = scans();
        let filter = ListFilter {
            status: Some(ScanStatus::Completed),
        };
        let page = paginate(&all, &filter, &PageOptions::default()).unwrap();
        assert_eq!(page.total_results, 3);
        assert!(page.results.iter().all(|s| s.status == ScanStatus::Completed));
    }

    #[test]
    fn test_limit_and_page() {
        let all = scans();
        let options = PageOptions {
            sort_by: None,
            limit: Some(2),
            page: Some(3),
        };
        let page = paginate(&all, &ListFilter::default(), &options).unwrap();
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].targets[0], "https://site4.example");
    }

    #[test]
    fn test_page_past_end_is_empty() {
        let all = scans();
        let options = PageOptions {
            page: Some(9),
            ..PageOptions::default()
        };
        let page = paginate(&all, &ListFilter::default(), &options).unwrap();
        assert!(page.results.is_empty());
        assert_eq!(page.total_results, 5);
    }

    #[test]
    fn test_sort_descending() {
        let all = scans();
        let options = PageOptions {
            sort_by: Some("totalViolations:desc".to_string()),
            ..PageOptions::default()
        };
        let page = paginate(&all, &ListFilter::default(), &options).unwrap();
        assert_eq!(page.results[0].total_violations, 5);
        assert_eq!(page.results[4].total_violations, 1);
    }

    #[test]
    fn test_unknown_sort_field_rejected() {
        let options = PageOptions {
            sort_by: Some("password:asc".to_string()),
            ..PageOptions::default()
        };
        let err = paginate(&scans(), &ListFilter::default(), &options).unwrap_err();
        assert!(matches!(err, IrisError::ValidationError(_)));
        assert!(SortBy::parse(Some("createdAt:sideways")).is_err());
    }
}
