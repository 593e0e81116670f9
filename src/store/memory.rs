//! In-process scan store

use super::{not_found, paginate, patch_in_place, ListFilter, Page, PageOptions, ScanStore};
use crate::error::Result;
use crate::models::{Scan, ScanPatch, ScanStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Keeps scans in a map guarded by a single lock
#[derive(Default)]
pub struct MemoryStore {
    scans: RwLock<HashMap<Uuid, Scan>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.scans.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.scans.read().await.is_empty()
    }
}

#[async_trait]
impl ScanStore for MemoryStore {
    async fn create(&self, targets: Vec<String>) -> Result<Scan> {
        let scan = Scan::new(targets);
        self.scans.write().await.insert(scan.id, scan.clone());
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
        patch_in_place(&mut *self.scans.write().await, id, None, patch)
    }

    async fn update_if(&self, id: Uuid, allowed: &[ScanStatus], patch: ScanPatch) -> Result<Scan> {
        patch_in_place(&mut *self.scans.write().await, id, Some(allowed), patch)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.scans
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(id))
    }

    async fn list(&self, filter: &ListFilter, options: &PageOptions) -> Result<Page<Scan>> {
        let scans = self.scans.read().await;
        paginate(scans.values(), filter, options)
    }
}
