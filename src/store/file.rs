//! JSON file backed scan store
//!
//! The whole collection is held in memory and rewritten to disk after every
//! mutation. Writes go to a sibling temp file first and are renamed into
//! place, so a crash never leaves a half written store.

use super::{not_found, paginate, patch_in_place, ListFilter, Page, PageOptions, ScanStore};
use crate::error::{IrisError, Result};
use crate::models::{Scan, ScanPatch, ScanStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

pub struct FileStore {
    path: PathBuf,
    scans: RwLock<HashMap<Uuid, Scan>>,
}

impl FileStore {
    /// Opens the store at `path`, starting empty if the file does not exist yet
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let scans = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => HashMap::new(),
            Ok(content) => {
                let list: Vec<Scan> = serde_json::from_str(&content)?;
                list.into_iter().map(|s| (s.id, s)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(IrisError::IoError(e)),
        };
        info!("Loaded {} scans from {}", scans.len(), path.display());
        Ok(Self {
            path,
            scans: RwLock::new(scans),
        })
    }

    async fn flush(&self, scans: &HashMap<Uuid, Scan>) -> Result<()> {
        let mut list: Vec<&Scan> = scans.values().collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        let json = serde_json::to_string_pretty(&list)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| IrisError::StoreError(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| IrisError::StoreError(format!("replace {}: {e}", self.path.display())))?;
        debug!("Persisted {} scans to {}", list.len(), self.path.display());
        Ok(())
    }

    async fn mutate(
        &self,
        id: Uuid,
        allowed: Option<&[ScanStatus]>,
        patch: ScanPatch,
    ) -> Result<Scan> {
        let mut scans = self.scans.write().await;
        let previous = scans.get(&id).cloned().ok_or_else(|| not_found(id))?;
        let updated = patch_in_place(&mut scans, id, allowed, patch)?;
        if let Err(e) = self.flush(&scans).await {
            // Keep memory consistent with what is on disk
            scans.insert(id, previous);
            return Err(e);
        }
        Ok(updated)
    }
}

#[async_trait]
impl ScanStore for FileStore {
    async fn create(&self, targets: Vec<String>) -> Result<Scan> {
        let scan = Scan::new(targets);
        let mut scans = self.scans.write().await;
        scans.insert(scan.id, scan.clone());
        if let Err(e) = self.flush(&scans).await {
            scans.remove(&scan.id);
            return Err(e);
        }
        Ok(scan)
    }

    async fn get(&self, id: Uuid) -> Result<Scan> {
        self.scans
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn update(&self, id: Uuid, patch: ScanPatch) -> Result<Scan> {
        self.mutate(id, None, patch).await
    }

    async fn update_if(&self, id: Uuid, allowed: &[ScanStatus], patch: ScanPatch) -> Result<Scan> {
        self.mutate(id, Some(allowed), patch).await
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut scans = self.scans.write().await;
        let removed = scans.remove(&id).ok_or_else(|| not_found(id))?;
        if let Err(e) = self.flush(&scans).await {
            scans.insert(id, removed);
            return Err(e);
        }
        Ok(())
    }

    async fn list(&self, filter: &ListFilter, options: &PageOptions) -> Result<Page<Scan>> {
        let scans = self.scans.read().await;
        paginate(scans.values(), filter, options)
    }
}
