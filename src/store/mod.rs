// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Scan Store
 * Storage interface shared by the crawler, the scheduler and the
 * surrounding application
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::StoreResult;
use crate::types::{
    DiscoveredAsset, Finding, LogLevel, NewScan, Scan, ScanLog, ScanStatusUpdate,
};

pub use memory::MemoryStore;

/// Persistence for scans and everything a scan produces.
///
/// Writes are partitioned by scan id; implementations need no cross-scan locking.
#[async_trait]
pub trait ScanStore: Send + Sync {
    /// Create a scan in `pending` state
    async fn create_scan(&self, new_scan: NewScan) -> StoreResult<Scan>;

    async fn get_scan(&self, id: Uuid) -> StoreResult<Option<Scan>>;

    /// Apply a partial status update.
    ///
    /// Returns `false` without changing anything when the scan is already
    /// terminal. Progress never decreases. Entering `scanning` stamps
    /// `started_at`, entering a terminal state stamps `completed_at`.
    async fn update_scan_status(&self, id: Uuid, update: ScanStatusUpdate) -> StoreResult<bool>;

    /// Record a discovered URL. Returns `false` if the scan already has it.
    async fn insert_asset(&self, asset: DiscoveredAsset) -> StoreResult<bool>;

    async fn insert_finding(&self, finding: Finding) -> StoreResult<()>;

    async fn append_log(&self, scan_id: Uuid, level: LogLevel, message: &str) -> StoreResult<()>;

    /// Templates whose `next_run_at` is unset or not after `now`
    async fn list_due_templates(&self, now: DateTime<Utc>) -> StoreResult<Vec<Scan>>;

    async fn update_template_schedule(
        &self,
        id: Uuid,
        last_run_at: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn list_assets(&self, scan_id: Uuid) -> StoreResult<Vec<DiscoveredAsset>>;

    async fn list_findings(&self, scan_id: Uuid) -> StoreResult<Vec<Finding>>;

    async fn list_logs(&self, scan_id: Uuid) -> StoreResult<Vec<ScanLog>>;
}
