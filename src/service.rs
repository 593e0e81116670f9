//! Scan service: the operations exposed to transports and the CLI

use crate::aggregate::{self, TableRow};
use crate::error::Result;
use crate::models::{Scan, ScanStatus, ScanUpdate};
use crate::orchestrator::{CancelFlag, ScanOrchestrator};
use crate::report;
use crate::store::{ListFilter, Page, PageOptions, ScanStore};
use crate::validate;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// A running scan belongs to its orchestrator until it reaches a terminal state
const UPDATABLE_FROM: [ScanStatus; 3] =
    [ScanStatus::Pending, ScanStatus::Completed, ScanStatus::Failed];

/// Validated CRUD plus execution and export over a [`ScanStore`]
#[derive(Clone)]
pub struct ScanService {
    store: Arc<dyn ScanStore>,
    orchestrator: ScanOrchestrator,
}

impl ScanService {
    pub fn new(store: Arc<dyn ScanStore>, orchestrator: ScanOrchestrator) -> Self {
        Self {
            store,
            orchestrator,
        }
    }

    /// Creates a pending scan. Requires at least one valid http(s) target.
    pub async fn create(&self, targets: Vec<String>) -> Result<Scan> {
        validate::validate_targets(&targets)?;
        let targets = targets.into_iter().map(|t| t.trim().to_string()).collect();
        let scan = self.store.create(targets).await?;
        info!("Created scan {} with {} targets", scan.id, scan.targets.len());
        Ok(scan)
    }

    pub async fn get(&self, id: Uuid) -> Result<Scan> {
        self.store.get(id).await
    }

    pub async fn query(&self, filter: &ListFilter, options: &PageOptions) -> Result<Page<Scan>> {
        self.store.list(filter, options).await
    }

    /// Changes targets and/or status ahead of a (re-)execution.
    /// Rejected with `Conflict` while the scan is running.
    pub async fn update(&self, id: Uuid, mut update: ScanUpdate) -> Result<Scan> {
        validate::validate_update(&update)?;
        if let Some(targets) = update.targets.take() {
            update.targets = Some(targets.into_iter().map(|t| t.trim().to_string()).collect());
        }
        let scan = self
            .store
            .update_if(id, &UPDATABLE_FROM, update.into_patch())
            .await?;
        info!("Updated scan {}", id);
        Ok(scan)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.store.delete(id).await?;
        info!("Deleted scan {}", id);
        Ok(())
    }

    pub async fn execute(&self, id: Uuid) -> Result<Scan> {
        self.orchestrator.execute(id).await
    }

    pub async fn execute_with_cancel(&self, id: Uuid, cancel: &CancelFlag) -> Result<Scan> {
        self.orchestrator.execute_with_cancel(id, cancel).await
    }

    /// Per-target rows of a completed scan
    pub async fn export_table(&self, id: Uuid) -> Result<Vec<TableRow>> {
        let scan = self.store.get(id).await?;
        aggregate::to_table(&scan)
    }

    /// CSV rendering of [`export_table`](Self::export_table)
    pub async fn export_csv(&self, id: Uuid) -> Result<String> {
        let rows = self.export_table(id).await?;
        Ok(report::csv::render(&rows))
    }
}
