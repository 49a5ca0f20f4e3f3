// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Scan Worker
 * Runs crawls as supervised background jobs, bounded by a concurrency
 * limit, with per-scan cancellation
 *
 * © 2026 Bountyy Oy
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::crawler::{CrawlSummary, Crawler, ScanCancellation};
use crate::errors::{ScannerError, ScannerResult};
use crate::scan_state::ScanStateMachine;
use crate::scheduler::ScanLauncher;
use crate::store::ScanStore;
use crate::types::{LogLevel, NewScan, Scan, ScanConfig};

/// A background scan that ended in error
#[derive(Debug)]
pub struct JobFailure {
    pub scan_id: Uuid,
    pub error: ScannerError,
}

pub struct ScanWorker {
    crawler: Arc<Crawler>,
    store: Arc<dyn ScanStore>,
    active_jobs: Arc<RwLock<HashMap<Uuid, ScanCancellation>>>,
    permits: Arc<Semaphore>,
    failures: mpsc::UnboundedSender<JobFailure>,
    jobs: Mutex<JoinSet<()>>,
}

impl ScanWorker {
    /// Create a worker running at most `max_concurrent_scans` crawls at once.
    ///
    /// Spawns the failure reporter, so this must be called inside a tokio runtime.
    pub fn new(crawler: Arc<Crawler>, max_concurrent_scans: usize) -> Self {
        let (failures, receiver) = mpsc::unbounded_channel();
        tokio::spawn(report_failures(receiver));

        let store = Arc::clone(crawler.store());
        info!("[Worker] Ready, {} concurrent scan slot(s)", max_concurrent_scans.max(1));

        Self {
            crawler,
            store,
            active_jobs: Arc::new(RwLock::new(HashMap::new())),
            permits: Arc::new(Semaphore::new(max_concurrent_scans.max(1))),
            failures,
            jobs: Mutex::new(JoinSet::new()),
        }
    }

    /// Create a scan and start it in the background.
    ///
    /// Recurring templates are only stored; the scheduler spawns their runs.
    pub async fn trigger_scan(
        &self,
        project_id: Uuid,
        target_url: &str,
        config: ScanConfig,
    ) -> ScannerResult<Scan> {
        let scan = self
            .store
            .create_scan(NewScan::new(project_id, target_url, config))
            .await?;

        if scan.is_template() {
            info!("[Worker] Stored recurring template {} for {}", scan.id, scan.target_url);
            return Ok(scan);
        }

        self.spawn_job(scan.clone()).await?;
        Ok(scan)
    }

    /// Run a scan in the foreground and wait for its outcome
    pub async fn run_to_completion(&self, scan: &Scan) -> ScannerResult<CrawlSummary> {
        let cancel = ScanCancellation::new();
        self.active_jobs.write().await.insert(scan.id, cancel.clone());
        let result = self.crawler.run(scan, cancel).await;
        self.active_jobs.write().await.remove(&scan.id);
        result
    }

    /// Cancel a scan.
    ///
    /// A running scan stops dispatching, drains in-flight pages and fails with
    /// the reason. A scan not running here is failed directly. Returns `false`
    /// when the scan had already finished. Templates are never run, so they
    /// cannot be cancelled either.
    pub async fn cancel_scan(&self, scan_id: Uuid, reason: &str) -> ScannerResult<bool> {
        if let Some(cancel) = self.active_jobs.read().await.get(&scan_id) {
            info!("[Worker] Cancelling scan {}: {}", scan_id, reason);
            cancel.cancel(reason);
            return Ok(true);
        }

        let scan = self
            .store
            .get_scan(scan_id)
            .await?
            .ok_or(ScannerError::ScanNotFound(scan_id))?;
        if scan.is_template() {
            return Err(ScannerError::TemplateExecution(scan_id));
        }
        if scan.status.is_terminal() {
            return Ok(false);
        }

        let message = format!("Scan cancelled: {}", reason);
        let update = ScanStateMachine::from_scan(&scan).fail(&message)?;
        let applied = self.store.update_scan_status(scan_id, update).await?;
        if applied {
            self.store.append_log(scan_id, LogLevel::Error, &message).await?;
        }
        Ok(applied)
    }

    pub async fn status(&self, scan_id: Uuid) -> ScannerResult<Scan> {
        self.store
            .get_scan(scan_id)
            .await?
            .ok_or(ScannerError::ScanNotFound(scan_id))
    }

    pub async fn active_scans(&self) -> Vec<Uuid> {
        self.active_jobs.read().await.keys().copied().collect()
    }

    /// Cancel everything still running and wait for it to wind down
    pub async fn shutdown(&self, reason: &str) {
        let active: Vec<ScanCancellation> = self.active_jobs.read().await.values().cloned().collect();
        if !active.is_empty() {
            info!("[Worker] Shutting down, cancelling {} scan(s)", active.len());
        }
        for cancel in active {
            cancel.cancel(reason);
        }

        let mut jobs = std::mem::take(&mut *self.jobs.lock());
        while let Some(result) = jobs.join_next().await {
            if let Err(e) = result {
                error!("[Worker] Job supervisor panicked: {}", e);
            }
        }
    }

    async fn spawn_job(&self, scan: Scan) -> ScannerResult<()> {
        let cancel = ScanCancellation::new();
        {
            let mut active = self.active_jobs.write().await;
            if active.contains_key(&scan.id) {
                warn!("[Worker] Scan {} is already running", scan.id);
                return Ok(());
            }
            active.insert(scan.id, cancel.clone());
        }

        let job = Job {
            crawler: Arc::clone(&self.crawler),
            store: Arc::clone(&self.store),
            active_jobs: Arc::clone(&self.active_jobs),
            permits: Arc::clone(&self.permits),
            failures: self.failures.clone(),
        };

        let mut jobs = self.jobs.lock();
        while jobs.try_join_next().is_some() {}
        jobs.spawn(job.supervise(scan, cancel));
        Ok(())
    }
}

#[async_trait]
impl ScanLauncher for ScanWorker {
    async fn launch(&self, scan: Scan) -> ScannerResult<()> {
        if scan.is_template() {
            return Err(ScannerError::TemplateExecution(scan.id));
        }
        self.spawn_job(scan).await
    }
}

/// Everything one background job needs
struct Job {
    crawler: Arc<Crawler>,
    store: Arc<dyn ScanStore>,
    active_jobs: Arc<RwLock<HashMap<Uuid, ScanCancellation>>>,
    permits: Arc<Semaphore>,
    failures: mpsc::UnboundedSender<JobFailure>,
}

impl Job {
    /// Run the crawl on its own task so a panic is caught and reported
    async fn supervise(self, scan: Scan, cancel: ScanCancellation) {
        let scan_id = scan.id;

        // Waiting for a slot ends early on cancellation; the crawler then
        // records the cancelled run without fetching anything.
        let _permit = tokio::select! {
            permit = Arc::clone(&self.permits).acquire_owned() => permit.ok(),
            _ = cancel.token().cancelled() => None,
        };

        let crawler = Arc::clone(&self.crawler);
        let run = tokio::spawn(async move { crawler.run(&scan, cancel).await });

        let outcome = match run.await {
            Ok(Ok(summary)) => {
                debug!(
                    "[Worker] Scan {} finished: {} pages, {} findings",
                    scan_id, summary.pages_visited, summary.findings
                );
                None
            }
            Ok(Err(e)) => Some(e),
            Err(join_error) => {
                let e = ScannerError::FatalCrawler(format!("crawl task panicked: {}", join_error));
                self.mark_failed(scan_id, &e).await;
                Some(e)
            }
        };

        self.active_jobs.write().await.remove(&scan_id);

        if let Some(error) = outcome {
            let _ = self.failures.send(JobFailure { scan_id, error });
        }
    }

    /// Best-effort terminal update for a run that died without reporting
    async fn mark_failed(&self, scan_id: Uuid, cause: &ScannerError) {
        let scan = match self.store.get_scan(scan_id).await {
            Ok(Some(scan)) => scan,
            _ => return,
        };
        let message = cause.to_string();
        let Ok(update) = ScanStateMachine::from_scan(&scan).fail(&message) else {
            return;
        };
        if let Ok(true) = self.store.update_scan_status(scan_id, update).await {
            let _ = self.store.append_log(scan_id, LogLevel::Error, &message).await;
        }
    }
}

async fn report_failures(mut receiver: mpsc::UnboundedReceiver<JobFailure>) {
    while let Some(JobFailure { scan_id, error }) = receiver.recv().await {
        match &error {
            ScannerError::Cancelled(reason) => {
                info!("[Worker] Scan {} cancelled: {}", scan_id, reason)
            }
            e if e.is_fatal() => error!("[Worker] Scan {} failed: {}", scan_id, e),
            e => warn!("[Worker] Scan {} ended with error: {}", scan_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::CrawlerSettings;
    use crate::store::MemoryStore;
    use crate::types::ScanStatus;

    fn worker() -> (ScanWorker, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let crawler = Arc::new(Crawler::new(store.clone(), CrawlerSettings::default()));
        (ScanWorker::new(crawler, 2), store)
    }

    #[tokio::test]
    async fn test_template_is_stored_not_run() {
        let (worker, _store) = worker();
        let config = ScanConfig {
            is_scheduled: true,
            schedule_cron: Some("0 3 * * *".to_string()),
            ..ScanConfig::default()
        };
        let scan = worker
            .trigger_scan(Uuid::new_v4(), "https://example.com", config)
            .await
            .unwrap();
        assert_eq!(scan.status, ScanStatus::Pending);
        assert!(worker.active_scans().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_pending_scan_not_running_here() {
        let (worker, store) = worker();
        let scan = store
            .create_scan(NewScan::new(Uuid::new_v4(), "https://example.com", ScanConfig::default()))
            .await
            .unwrap();

        assert!(worker.cancel_scan(scan.id, "user request").await.unwrap());
        let scan = worker.status(scan.id).await.unwrap();
        assert_eq!(scan.status, ScanStatus::Failed);

        // Already terminal
        assert!(!worker.cancel_scan(scan.id, "again").await.unwrap());
    }

    #[tokio::test]
    async fn test_cancel_refuses_template() {
        let (worker, store) = worker();
        let config = ScanConfig {
            is_scheduled: true,
            schedule_cron: Some("0 3 * * *".to_string()),
            ..ScanConfig::default()
        };
        let template = worker
            .trigger_scan(Uuid::new_v4(), "https://example.com", config)
            .await
            .unwrap();

        assert!(matches!(
            worker.cancel_scan(template.id, "user").await,
            Err(ScannerError::TemplateExecution(id)) if id == template.id
        ));

        let template = worker.status(template.id).await.unwrap();
        assert_eq!(template.status, ScanStatus::Pending);
        assert!(store.list_logs(template.id).await.unwrap().is_empty());
        let due = store.list_due_templates(chrono::Utc::now()).await.unwrap();
        assert!(due.iter().any(|s| s.id == template.id));
    }

    #[tokio::test]
    async fn test_unknown_scan() {
        let (worker, _store) = worker();
        let id = Uuid::new_v4();
        assert!(matches!(worker.status(id).await, Err(ScannerError::ScanNotFound(_))));
        assert!(matches!(
            worker.cancel_scan(id, "x").await,
            Err(ScannerError::ScanNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_launch_refuses_template() {
        let (worker, store) = worker();
        let config = ScanConfig {
            is_scheduled: true,
            ..ScanConfig::default()
        };
        let template = store
            .create_scan(NewScan::new(Uuid::new_v4(), "https://example.com", config))
            .await
            .unwrap();
        assert!(matches!(
            worker.launch(template).await,
            Err(ScannerError::TemplateExecution(_))
        ));
    }
}
