// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Scanward Library
 * Scan orchestration, crawling, fingerprinting and scheduling
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

pub mod config;
pub mod crawler;
pub mod auth_context;
pub mod database;
pub mod rate_limiter;
pub mod robots;
pub mod types;
pub mod url_normalizer;

// Scan lifecycle
pub mod scan_state;
pub mod scheduler;
pub mod store;
pub mod worker;

// Analyzers
pub mod scanners;
pub mod http_client;

// Production error handling and observability
pub mod errors;
pub mod metrics;

// Technology fingerprinting
pub mod analysis;

pub use crawler::{CrawlSummary, Crawler, CrawlerSettings, ScanCancellation};
pub use errors::{ScannerError, ScannerResult};
pub use scheduler::{ScanLauncher, SchedulerService, TickOutcome};
pub use store::{MemoryStore, ScanStore};
pub use worker::ScanWorker;
