// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Scan Worker Tests
 * Background scans, cancellation and shutdown
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use scanward::crawler::{Crawler, CrawlerSettings};
use scanward::store::{MemoryStore, ScanStore};
use scanward::types::{Scan, ScanConfig, ScanStatus, ScanType};
use scanward::worker::ScanWorker;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

fn worker(store: Arc<MemoryStore>, slots: usize) -> ScanWorker {
    let settings = CrawlerSettings {
        allow_private_targets: true,
        max_retries: 0,
        ..CrawlerSettings::default()
    };
    ScanWorker::new(Arc::new(Crawler::new(store, settings)), slots)
}

fn config() -> ScanConfig {
    ScanConfig {
        scan_type: ScanType::Quick,
        max_depth: 1,
        max_pages: 20,
        rate_limit: 1000,
        concurrency: 1,
        ..ScanConfig::default()
    }
}

async fn wait_terminal(worker: &ScanWorker, scan_id: Uuid) -> Scan {
    for _ in 0..100 {
        let scan = worker.status(scan_id).await.unwrap();
        if scan.status.is_terminal() {
            return scan;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("scan {} did not finish", scan_id);
}

async fn slow_site(delay_ms: u64) -> MockServer {
    let server = MockServer::start().await;
    let links: String = (0..10).map(|i| format!(r#"<a href="/p{}">p</a>"#, i)).collect();
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(format!("<html><body>{}</body></html>", links), "text/html"),
        )
        .mount(&server)
        .await;
    for i in 0..10 {
        Mock::given(method("GET"))
            .and(path(format!("/p{}", i)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html></html>", "text/html")
                    .set_delay(Duration::from_millis(delay_ms)),
            )
            .mount(&server)
            .await;
    }
    server
}

#[tokio::test]
async fn test_trigger_scan_runs_in_background() {
    let server = slow_site(10).await;
    let store = Arc::new(MemoryStore::new());
    let worker = worker(store.clone(), 2);

    let scan = worker
        .trigger_scan(Uuid::new_v4(), &server.uri(), config())
        .await
        .unwrap();
    assert_eq!(scan.status, ScanStatus::Pending);

    let scan = wait_terminal(&worker, scan.id).await;
    assert_eq!(scan.status, ScanStatus::Completed);
    assert_eq!(scan.progress, 100);
    assert_eq!(store.list_assets(scan.id).await.unwrap().len(), 11);

    // Finished jobs leave the active set
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(worker.active_scans().await.is_empty());
}

#[tokio::test]
async fn test_cancel_running_scan() {
    let server = slow_site(200).await;
    let store = Arc::new(MemoryStore::new());
    let worker = worker(store.clone(), 2);

    let scan = worker
        .trigger_scan(Uuid::new_v4(), &server.uri(), config())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(worker.cancel_scan(scan.id, "no longer needed").await.unwrap());

    let scan = wait_terminal(&worker, scan.id).await;
    assert_eq!(scan.status, ScanStatus::Failed);
    assert!(store.list_assets(scan.id).await.unwrap().len() < 11);

    let logs = store.list_logs(scan.id).await.unwrap();
    assert!(logs.iter().any(|l| l.message == "Scan cancelled: no longer needed"));
}

#[tokio::test]
async fn test_concurrency_slots_bound_running_scans() {
    let server = slow_site(100).await;
    let store = Arc::new(MemoryStore::new());
    let worker = worker(store.clone(), 1);

    let first = worker
        .trigger_scan(Uuid::new_v4(), &server.uri(), config())
        .await
        .unwrap();
    let second = worker
        .trigger_scan(Uuid::new_v4(), &server.uri(), config())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    // Only one slot: the second scan is still waiting in pending
    let waiting = worker.status(second.id).await.unwrap();
    assert_eq!(waiting.status, ScanStatus::Pending);

    assert_eq!(wait_terminal(&worker, first.id).await.status, ScanStatus::Completed);
    assert_eq!(wait_terminal(&worker, second.id).await.status, ScanStatus::Completed);
}

#[tokio::test]
async fn test_shutdown_cancels_active_scans() {
    let server = slow_site(300).await;
    let store = Arc::new(MemoryStore::new());
    let worker = worker(store.clone(), 2);

    let scan = worker
        .trigger_scan(Uuid::new_v4(), &server.uri(), config())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    worker.shutdown("worker shutting down").await;

    let scan = worker.status(scan.id).await.unwrap();
    assert_eq!(scan.status, ScanStatus::Failed);
    assert!(worker.active_scans().await.is_empty());
}
