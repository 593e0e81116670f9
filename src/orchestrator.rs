//! Scan lifecycle state machine
//!
//! ```text
//! pending ─┐                    ┌─ all targets done ──▶ completed
//!          ├─ execute ─▶ running┤
//! failed ──┘                    └─ orchestration error ▶ failed
//! ```
//!
//! Targets are audited strictly one after another. A target that fails is
//! recorded in its [`TargetResult`] and the loop moves on; only errors
//! outside target auditing move the scan to `failed`.

use crate::aggregate;
use crate::audit::AuditRunner;
use crate::error::{IrisError, Result};
use crate::models::{Scan, ScanPatch, ScanStatus, TargetResult};
use crate::store::ScanStore;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// States from which `execute` may start a run
const EXECUTABLE_FROM: [ScanStatus; 2] = [ScanStatus::Pending, ScanStatus::Failed];

/// A failure may be recorded over anything but a finished run
const FAILABLE_FROM: [ScanStatus; 3] =
    [ScanStatus::Pending, ScanStatus::Running, ScanStatus::Failed];

pub const CANCELLED_REASON: &str = "scan cancelled";

/// Cooperative cancellation signal, checked between targets
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives a scan from `pending`/`failed` to a terminal state
#[derive(Clone)]
pub struct ScanOrchestrator {
    store: Arc<dyn ScanStore>,
    runner: AuditRunner,
}

impl ScanOrchestrator {
    pub fn new(store: Arc<dyn ScanStore>, runner: AuditRunner) -> Self {
        Self { store, runner }
    }

    /// Executes every target of scan `id` and returns the terminal record
    pub async fn execute(&self, id: Uuid) -> Result<Scan> {
        self.execute_with_cancel(id, &CancelFlag::new()).await
    }

    /// Like [`execute`](Self::execute), stopping between targets once `cancel` is set
    pub async fn execute_with_cancel(&self, id: Uuid, cancel: &CancelFlag) -> Result<Scan> {
        let scan = self.store.get(id).await?;
        check_executable(&scan)?;

        let scan = match self.start(id).await {
            Ok(scan) => scan,
            Err(e @ (IrisError::NotFound(_) | IrisError::Conflict(_))) => return Err(e),
            Err(e) => return Err(self.fail(id, e).await),
        };
        info!("Scan {} running: {} targets", id, scan.targets.len());

        let results = match self.audit_all(&scan, cancel).await {
            Ok(results) => results,
            Err(e) => return Err(self.fail(id, e).await),
        };

        let totals = aggregate::aggregate(&results);
        let failed_targets = results.iter().filter(|r| r.is_failure()).count();
        let patch = ScanPatch::new()
            .with_status(ScanStatus::Completed)
            .with_results(results, totals)
            .with_completed_at(Some(Utc::now()));

        match self.store.update_if(id, &[ScanStatus::Running], patch).await {
            Ok(done) => {
                info!(
                    "Scan {} completed: {} total violations, {} total passes, {} failed targets",
                    id, totals.total_violations, totals.total_passes, failed_targets
                );
                Ok(done)
            }
            Err(e @ (IrisError::NotFound(_) | IrisError::Conflict(_))) => {
                warn!("Scan {} changed while running, discarding results: {}", id, e);
                Err(e)
            }
            Err(e) => Err(self.fail(id, e).await),
        }
    }

    /// pending|failed -> running, atomically against the stored status
    async fn start(&self, id: Uuid) -> Result<Scan> {
        let patch = ScanPatch::new()
            .with_status(ScanStatus::Running)
            .with_started_at(Utc::now())
            .with_failure_reason(None)
            .with_completed_at(None);
        self.store.update_if(id, &EXECUTABLE_FROM, patch).await
    }

    async fn audit_all(&self, scan: &Scan, cancel: &CancelFlag) -> Result<Vec<TargetResult>> {
        let mut results = Vec::with_capacity(scan.targets.len());
        for (index, target) in scan.targets.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(
                    "Scan {} cancelled after {}/{} targets",
                    scan.id,
                    index,
                    scan.targets.len()
                );
                return Err(IrisError::OrchestrationError(CANCELLED_REASON.to_string()));
            }
            debug!(
                "Scan {}: auditing target {}/{}: {}",
                scan.id,
                index + 1,
                scan.targets.len(),
                target
            );
            results.push(self.runner.audit(target).await);
        }
        Ok(results)
    }

    /// running -> failed. Returns the error to hand back to the caller.
    async fn fail(&self, id: Uuid, cause: IrisError) -> IrisError {
        let reason = match cause {
            IrisError::OrchestrationError(ref message) => message.clone(),
            ref other => other.to_string(),
        };
        error!("Scan {} failed: {}", id, reason);

        let patch = ScanPatch::new()
            .with_status(ScanStatus::Failed)
            .with_failure_reason(Some(reason.clone()))
            .with_completed_at(Some(Utc::now()));
        if let Err(e) = self.store.update_if(id, &FAILABLE_FROM, patch).await {
            error!("Could not record failure of scan {}: {}", id, e);
        }

        IrisError::OrchestrationError(reason)
    }
}

fn check_executable(scan: &Scan) -> Result<()> {
    if EXECUTABLE_FROM.contains(&scan.status) {
        Ok(())
    } else {
        Err(IrisError::Conflict(format!("Scan is already {}", scan.status)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_table() {
        let mut scan = Scan::new(vec!["https://example.com".into()]);
        for (status, allowed) in [
            (ScanStatus::Pending, true),
            (ScanStatus::Running, false),
            (ScanStatus::Completed, false),
            (ScanStatus::Failed, true),
        ] {
            scan.status = status;
            assert_eq!(check_executable(&scan).is_ok(), allowed, "{status}");
        }
    }

    #[test]
    fn test_guard_messages() {
        let mut scan = Scan::new(vec!["https://example.com".into()]);
        scan.status = ScanStatus::Running;
        assert_eq!(
            check_executable(&scan).unwrap_err().to_string(),
            "Scan is already running"
        );
        scan.status = ScanStatus::Completed;
        assert_eq!(
            check_executable(&scan).unwrap_err().to_string(),
            "Scan is already completed"
        );
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!flag.is_cancelled());
        clone.cancel();
        assert!(flag.is_cancelled());
    }
}
