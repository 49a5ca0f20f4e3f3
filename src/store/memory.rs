// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! In-process `ScanStore` used for single-shot CLI scans and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::ScanStore;
use crate::errors::{StoreError, StoreResult};
use crate::types::{
    DiscoveredAsset, Finding, LogLevel, NewScan, Scan, ScanLog, ScanStatus, ScanStatusUpdate,
};

#[derive(Default)]
struct Inner {
    scans: HashMap<Uuid, Scan>,
    asset_keys: HashSet<(Uuid, String)>,
    assets: HashMap<Uuid, Vec<DiscoveredAsset>>,
    findings: HashMap<Uuid, Vec<Finding>>,
    logs: HashMap<Uuid, Vec<ScanLog>>,
    /// (status, progress, current_action) after every applied update
    history: HashMap<Uuid, Vec<(ScanStatus, u8, String)>>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every progress value the scan has had, in write order
    pub fn progress_history(&self, scan_id: Uuid) -> Vec<u8> {
        self.inner
            .read()
            .history
            .get(&scan_id)
            .map(|h| h.iter().map(|(_, p, _)| *p).collect())
            .unwrap_or_default()
    }

    /// Every status the scan has been in, in write order
    pub fn status_history(&self, scan_id: Uuid) -> Vec<ScanStatus> {
        let inner = self.inner.read();
        let mut statuses: Vec<ScanStatus> = Vec::new();
        if let Some(history) = inner.history.get(&scan_id) {
            for (status, _, _) in history {
                if statuses.last() != Some(status) {
                    statuses.push(*status);
                }
            }
        }
        statuses
    }

    /// Every current_action label the scan has shown, in write order
    pub fn action_history(&self, scan_id: Uuid) -> Vec<String> {
        let inner = self.inner.read();
        let mut actions: Vec<String> = Vec::new();
        if let Some(history) = inner.history.get(&scan_id) {
            for (_, _, action) in history {
                if actions.last() != Some(action) {
                    actions.push(action.clone());
                }
            }
        }
        actions
    }

    /// All scans, including templates
    pub fn all_scans(&self) -> Vec<Scan> {
        let mut scans: Vec<Scan> = self.inner.read().scans.values().cloned().collect();
        scans.sort_by_key(|s| s.created_at);
        scans
    }

    /// Children generated from a template
    pub fn children_of(&self, template_id: Uuid) -> Vec<Scan> {
        self.all_scans()
            .into_iter()
            .filter(|s| s.parent_scan_id == Some(template_id))
            .collect()
    }
}

#[async_trait]
impl ScanStore for MemoryStore {
    async fn create_scan(&self, new_scan: NewScan) -> StoreResult<Scan> {
        let scan = Scan {
            id: Uuid::new_v4(),
            project_id: new_scan.project_id,
            target_url: new_scan.target_url,
            status: ScanStatus::Pending,
            progress: 0,
            current_action: "Pending".to_string(),
            node: None,
            config: new_scan.config,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            parent_scan_id: new_scan.parent_scan_id,
            last_run_at: None,
            next_run_at: new_scan.next_run_at,
        };

        let mut inner = self.inner.write();
        inner
            .history
            .insert(scan.id, vec![(scan.status, scan.progress, scan.current_action.clone())]);
        inner.scans.insert(scan.id, scan.clone());
        Ok(scan)
    }

    async fn get_scan(&self, id: Uuid) -> StoreResult<Option<Scan>> {
        Ok(self.inner.read().scans.get(&id).cloned())
    }

    async fn update_scan_status(&self, id: Uuid, update: ScanStatusUpdate) -> StoreResult<bool> {
        let mut inner = self.inner.write();
        let scan = inner
            .scans
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("scan {}", id)))?;

        if scan.status.is_terminal() {
            return Ok(false);
        }

        let now = Utc::now();
        if let Some(status) = update.status {
            scan.status = status;
            if status == ScanStatus::Scanning && scan.started_at.is_none() {
                scan.started_at = Some(now);
            }
            if status.is_terminal() {
                scan.completed_at = Some(now);
            }
        }
        if let Some(progress) = update.progress {
            scan.progress = scan.progress.max(progress.min(100));
        }
        if let Some(action) = update.current_action {
            scan.current_action = action;
        }
        if let Some(node) = update.node {
            scan.node = Some(node);
        }

        let snapshot = (scan.status, scan.progress, scan.current_action.clone());
        inner.history.entry(id).or_default().push(snapshot);
        Ok(true)
    }

    async fn insert_asset(&self, asset: DiscoveredAsset) -> StoreResult<bool> {
        let mut inner = self.inner.write();
        if !inner.asset_keys.insert((asset.scan_id, asset.url.clone())) {
            return Ok(false);
        }
        inner.assets.entry(asset.scan_id).or_default().push(asset);
        Ok(true)
    }

    async fn insert_finding(&self, finding: Finding) -> StoreResult<()> {
        self.inner
            .write()
            .findings
            .entry(finding.scan_id)
            .or_default()
            .push(finding);
        Ok(())
    }

    async fn append_log(&self, scan_id: Uuid, level: LogLevel, message: &str) -> StoreResult<()> {
        self.inner.write().logs.entry(scan_id).or_default().push(ScanLog {
            scan_id,
            level,
            message: message.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_due_templates(&self, now: DateTime<Utc>) -> StoreResult<Vec<Scan>> {
        let mut due: Vec<Scan> = self
            .inner
            .read()
            .scans
            .values()
            .filter(|s| s.is_template())
            .filter(|s| s.next_run_at.map(|next| next <= now).unwrap_or(true))
            .cloned()
            .collect();
        due.sort_by_key(|s| (s.next_run_at, s.created_at));
        Ok(due)
    }

    async fn update_template_schedule(
        &self,
        id: Uuid,
        last_run_at: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let scan = inner
            .scans
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("scan {}", id)))?;
        scan.last_run_at = Some(last_run_at);
        scan.next_run_at = Some(next_run_at);
        Ok(())
    }

    async fn list_assets(&self, scan_id: Uuid) -> StoreResult<Vec<DiscoveredAsset>> {
        Ok(self.inner.read().assets.get(&scan_id).cloned().unwrap_or_default())
    }

    async fn list_findings(&self, scan_id: Uuid) -> StoreResult<Vec<Finding>> {
        Ok(self.inner.read().findings.get(&scan_id).cloned().unwrap_or_default())
    }

    async fn list_logs(&self, scan_id: Uuid) -> StoreResult<Vec<ScanLog>> {
        Ok(self.inner.read().logs.get(&scan_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScanConfig;

    fn new_scan() -> NewScan {
        NewScan::new(Uuid::new_v4(), "https://example.com", ScanConfig::default())
    }

    #[tokio::test]
    async fn test_asset_uniqueness() {
        let store = MemoryStore::new();
        let scan = store.create_scan(new_scan()).await.unwrap();

        let asset = DiscoveredAsset {
            scan_id: scan.id,
            url: "https://example.com/".to_string(),
            status_code: Some(200),
            depth: 0,
            discovered_at: Utc::now(),
        };

        assert!(store.insert_asset(asset.clone()).await.unwrap());
        assert!(!store.insert_asset(asset).await.unwrap());
        assert_eq!(store.list_assets(scan.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_terminal_scan_not_updated() {
        let store = MemoryStore::new();
        let scan = store.create_scan(new_scan()).await.unwrap();

        let failed = ScanStatusUpdate {
            status: Some(ScanStatus::Failed),
            ..Default::default()
        };
        assert!(store.update_scan_status(scan.id, failed).await.unwrap());

        let progress = ScanStatusUpdate {
            progress: Some(80),
            ..Default::default()
        };
        assert!(!store.update_scan_status(scan.id, progress).await.unwrap());

        let stored = store.get_scan(scan.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ScanStatus::Failed);
        assert_eq!(stored.progress, 0);
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_progress_never_decreases() {
        let store = MemoryStore::new();
        let scan = store.create_scan(new_scan()).await.unwrap();

        for p in [10, 40, 20] {
            store
                .update_scan_status(scan.id, ScanStatusUpdate { progress: Some(p), ..Default::default() })
                .await
                .unwrap();
        }

        assert_eq!(store.progress_history(scan.id), vec![0, 10, 40, 40]);
    }

    #[tokio::test]
    async fn test_due_templates() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let mut template = new_scan();
        template.config.is_scheduled = true;
        template.next_run_at = Some(now - chrono::Duration::minutes(1));
        let due = store.create_scan(template).await.unwrap();

        let mut later = new_scan();
        later.config.is_scheduled = true;
        later.next_run_at = Some(now + chrono::Duration::hours(1));
        store.create_scan(later).await.unwrap();

        store.create_scan(new_scan()).await.unwrap();

        let templates = store.list_due_templates(now).await.unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].id, due.id);
    }
}
