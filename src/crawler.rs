// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Web Crawler Module
 * Bounded breadth-first traversal that fingerprints and analyzes every page
 * and drives the scan state machine
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use chrono::Utc;
use parking_lot::Mutex as SyncMutex;
use scraper::{Html, Selector};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::analysis::TechnologyFingerprinter;
use crate::auth_context::{Authenticator, LoginCredentials};
use crate::config::{validate_scan_config, ScannerConfig};
use crate::errors::{ScannerError, ScannerResult, StateError};
use crate::http_client::{HttpClient, HttpClientConfig};
use crate::metrics::MetricsCollector;
use crate::rate_limiter::{RateLimiterConfig, ScanRateLimiter};
use crate::robots::RobotsCache;
use crate::scan_state::ScanStateMachine;
use crate::scanners::{AnalyzerPipeline, PageContext};
use crate::store::ScanStore;
use crate::types::{DiscoveredAsset, LogLevel, Scan, ScanConfig, ScanStatus, ScanStatusUpdate};
use crate::url_normalizer;

/// (selector, attribute) pairs followed as links
const LINK_SOURCES: &[(&str, &str)] = &[
    ("a[href]", "href"),
    ("link[href]", "href"),
    ("area[href]", "href"),
    ("iframe[src]", "src"),
    ("form[action]", "action"),
];

const SKIPPED_LINK_PREFIXES: &[&str] = &["#", "javascript:", "mailto:", "tel:", "data:"];

const CRAWLING_ACTION: &str = "Crawling";

/// Cancellation signal for one run, carrying the reason shown in the scan log
#[derive(Debug, Clone, Default)]
pub struct ScanCancellation {
    token: CancellationToken,
    reason: Arc<SyncMutex<Option<String>>>,
}

impl ScanCancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// First reason wins
    pub fn cancel(&self, reason: &str) {
        {
            let mut slot = self.reason.lock();
            if slot.is_none() {
                *slot = Some(reason.to_string());
            }
        }
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> String {
        self.reason
            .lock()
            .clone()
            .unwrap_or_else(|| "cancelled".to_string())
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Process-level crawler settings (per-scan settings live in `ScanConfig`)
#[derive(Debug, Clone)]
pub struct CrawlerSettings {
    /// Recorded on the scan as the executing node
    pub node_id: String,
    /// Permit loopback/private targets (labs and tests)
    pub allow_private_targets: bool,
    pub max_retries: u32,
    pub accept_invalid_certs: bool,
}

impl Default for CrawlerSettings {
    fn default() -> Self {
        Self {
            node_id: format!("scanward-{}", std::process::id()),
            allow_private_targets: false,
            max_retries: 2,
            accept_invalid_certs: false,
        }
    }
}

impl From<&ScannerConfig> for CrawlerSettings {
    fn from(config: &ScannerConfig) -> Self {
        Self {
            node_id: config.node_id.clone(),
            allow_private_targets: config.allow_private_targets,
            max_retries: config.max_retries,
            accept_invalid_certs: config.accept_invalid_certs,
        }
    }
}

/// Totals of a completed run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlSummary {
    pub scan_id: Uuid,
    pub status: ScanStatus,
    pub pages_visited: usize,
    pub fetch_failures: usize,
    pub robots_skipped: usize,
    pub findings: usize,
    pub analyzer_errors: usize,
    pub technologies: Vec<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Default)]
struct CrawlStats {
    pages_visited: usize,
    fetch_failures: usize,
    robots_skipped: usize,
    findings: usize,
    analyzer_errors: usize,
    technologies: BTreeSet<String>,
}

/// Result of one page task
struct PageOutcome {
    url: String,
    depth: u32,
    links: Vec<String>,
    findings: usize,
    analyzer_errors: usize,
    technologies: Vec<String>,
    transport_error: Option<ScannerError>,
}

/// Shared by every page task of one run
struct PageWorker {
    scan_id: Uuid,
    seed: String,
    config: Arc<ScanConfig>,
    store: Arc<dyn ScanStore>,
    fingerprinter: Arc<TechnologyFingerprinter>,
    pipeline: Arc<AnalyzerPipeline>,
    http_client: Arc<HttpClient>,
    rate_limiter: Arc<ScanRateLimiter>,
    state: Arc<Mutex<ScanStateMachine>>,
    metrics: Arc<MetricsCollector>,
    /// Keys of site-wide findings already recorded in this run
    site_findings: SyncMutex<HashSet<String>>,
}

impl PageWorker {
    /// Update the action label. Persisted under the lock so writes stay ordered.
    async fn set_action(&self, action: &str) -> ScannerResult<()> {
        let mut sm = self.state.lock().await;
        match sm.set_action(action) {
            Ok(update) => {
                self.store.update_scan_status(self.scan_id, update).await?;
                Ok(())
            }
            // Run already ended (timeout); nothing left to report
            Err(StateError::Terminal { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn log(&self, level: LogLevel, message: &str) -> ScannerResult<()> {
        self.store.append_log(self.scan_id, level, message).await?;
        Ok(())
    }

    async fn record_asset(&self, url: &str, status_code: Option<u16>, depth: u32) -> ScannerResult<()> {
        self.store
            .insert_asset(DiscoveredAsset {
                scan_id: self.scan_id,
                url: url.to_string(),
                status_code,
                depth,
                discovered_at: Utc::now(),
            })
            .await?;
        Ok(())
    }

    /// Fetch, record, fingerprint and analyze one page. Everything the page
    /// produces is written before this returns.
    async fn process(
        self: Arc<Self>,
        url: String,
        depth: u32,
        crawl_delay: Option<Duration>,
    ) -> ScannerResult<PageOutcome> {
        self.rate_limiter.wait_for_slot().await;
        if let Some(delay) = crawl_delay {
            debug!("Respecting Crawl-delay of {:?} for {}", delay, url);
            tokio::time::sleep(delay).await;
        }

        let started = Instant::now();
        let response = match self.http_client.get(&url).await {
            Ok(response) => response,
            Err(e) => {
                self.metrics.record_fetch_failure(&e);
                warn!("[Crawler] Failed to fetch {}: {}", url, e);
                self.record_asset(&url, None, depth).await?;
                self.log(LogLevel::Warn, &format!("Failed to fetch {}: {}", url, e))
                    .await?;
                return Ok(PageOutcome {
                    url,
                    depth,
                    links: Vec::new(),
                    findings: 0,
                    analyzer_errors: 0,
                    technologies: Vec::new(),
                    transport_error: Some(e),
                });
            }
        };

        self.metrics.record_page(response.status_code, started.elapsed());
        if response.status_code == 429 || response.status_code == 503 {
            self.rate_limiter.record_rate_limit(response.status_code).await;
        } else {
            self.rate_limiter.record_success().await;
        }

        self.record_asset(&url, Some(response.status_code), depth).await?;

        let links = if depth < self.config.max_depth && response.is_html() {
            let base = if response.final_url.is_empty() {
                url.as_str()
            } else {
                response.final_url.as_str()
            };
            extract_links(&response.body, base, &self.seed)
        } else {
            Vec::new()
        };

        self.set_action("Fingerprinting").await?;
        let fingerprint = self.fingerprinter.analyze(&response.headers, &response.body);
        let technologies: Vec<String> = fingerprint
            .technologies
            .iter()
            .map(|t| t.name.clone())
            .collect();

        let path = Url::parse(&url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| url.clone());
        self.set_action(&format!("Analyzing {}", path)).await?;

        let ctx = PageContext::new(
            self.scan_id,
            &url,
            &response,
            Arc::clone(&self.config),
            Arc::clone(&self.http_client),
            Arc::clone(&self.rate_limiter),
        );
        let outcome = self.pipeline.run(&ctx).await;

        let mut inserted = 0usize;
        for finding in outcome.page_findings {
            self.store.insert_finding(finding).await?;
            inserted += 1;
        }

        let origin = origin_of(&url);
        for finding in outcome.site_findings {
            let key = format!(
                "{}|{}|{}|{}",
                origin,
                finding.analyzer,
                finding.title,
                finding.parameter.as_deref().unwrap_or_default()
            );
            let first_on_origin = self.site_findings.lock().insert(key);
            if first_on_origin {
                self.store.insert_finding(finding).await?;
                inserted += 1;
            }
        }
        self.metrics.record_findings(inserted);

        let analyzer_errors = outcome.errors.len();
        for e in &outcome.errors {
            if let ScannerError::Analyzer { analyzer, .. } = e {
                self.metrics.record_analyzer_error(analyzer);
            }
            self.log(LogLevel::Warn, &e.to_string()).await?;
        }

        self.log(
            LogLevel::Info,
            &format!(
                "Crawled {} (HTTP {}, depth {}): {} technologies, security score {}, {} findings",
                url,
                response.status_code,
                depth,
                technologies.len(),
                fingerprint.security_score,
                inserted
            ),
        )
        .await?;

        Ok(PageOutcome {
            url,
            depth,
            links,
            findings: inserted,
            analyzer_errors,
            technologies,
            transport_error: None,
        })
    }
}

/// Traversal engine. One `run` per scan; no state is shared between runs.
pub struct Crawler {
    store: Arc<dyn ScanStore>,
    fingerprinter: Arc<TechnologyFingerprinter>,
    pipeline: Arc<AnalyzerPipeline>,
    settings: CrawlerSettings,
    metrics: Arc<MetricsCollector>,
}

impl Crawler {
    pub fn new(store: Arc<dyn ScanStore>, settings: CrawlerSettings) -> Self {
        Self {
            store,
            fingerprinter: Arc::new(TechnologyFingerprinter::new()),
            pipeline: Arc::new(AnalyzerPipeline::with_defaults()),
            settings,
            metrics: Arc::new(MetricsCollector::default()),
        }
    }

    pub fn with_pipeline(mut self, pipeline: AnalyzerPipeline) -> Self {
        self.pipeline = Arc::new(pipeline);
        self
    }

    pub fn with_fingerprinter(mut self, fingerprinter: Arc<TechnologyFingerprinter>) -> Self {
        self.fingerprinter = fingerprinter;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn store(&self) -> &Arc<dyn ScanStore> {
        &self.store
    }

    /// Execute one scan run to a terminal state.
    ///
    /// Templates are refused without touching the store. Every other failure
    /// is persisted (status failed plus a log entry) before the error is returned.
    pub async fn run(&self, scan: &Scan, cancel: ScanCancellation) -> ScannerResult<CrawlSummary> {
        if scan.is_template() {
            return Err(ScannerError::TemplateExecution(scan.id));
        }
        if scan.status.is_terminal() {
            return Err(StateError::Terminal { status: scan.status }.into());
        }

        let started = Instant::now();
        let state = Arc::new(Mutex::new(ScanStateMachine::from_scan(scan)));

        if let Err(e) = validate_scan_config(&scan.target_url, &scan.config)
            .and_then(|_| is_safe_url(&scan.target_url, self.settings.allow_private_targets).map(|_| ()))
        {
            warn!("[Crawler] Rejecting scan {}: {}", scan.id, e);
            self.fail(scan.id, &state, &e.to_string(), &e.to_string()).await?;
            return Err(e);
        }

        {
            let mut sm = state.lock().await;
            let queued = sm.transition(ScanStatus::Queued, "Queued")?;
            self.store.update_scan_status(scan.id, queued).await?;

            let mut scanning = sm.transition(ScanStatus::Scanning, CRAWLING_ACTION)?;
            scanning.node = Some(self.settings.node_id.clone());
            self.store.update_scan_status(scan.id, scanning).await?;
        }
        self.store
            .append_log(
                scan.id,
                LogLevel::Info,
                &format!("Scan started on {} for {}", self.settings.node_id, scan.target_url),
            )
            .await?;
        info!("[Crawler] Starting crawl of {} (scan {})", scan.target_url, scan.id);

        let timeout = Duration::from_secs(scan.config.scan_timeout_secs.max(1));
        let result = tokio::time::timeout(timeout, self.crawl(scan, &state, &cancel)).await;

        let stats = match result {
            Ok(Ok(stats)) => stats,
            Ok(Err(e)) => {
                error!("[Crawler] Scan {} failed: {}", scan.id, e);
                self.fail(scan.id, &state, &e.to_string(), &format!("Scan failed: {}", e))
                    .await?;
                return Err(e);
            }
            Err(_) => {
                // The crawl future (and with it every in-flight page task) is dropped
                let e = ScannerError::Timeout { duration: timeout };
                warn!("[Crawler] Scan {} timed out after {:?}", scan.id, timeout);
                self.fail(
                    scan.id,
                    &state,
                    "scan timeout",
                    &format!("Scan timed out after {}s", timeout.as_secs()),
                )
                .await?;
                return Err(e);
            }
        };

        if cancel.is_cancelled() {
            let reason = cancel.reason();
            info!("[Crawler] Scan {} cancelled: {}", scan.id, reason);
            let message = format!("Scan cancelled: {}", reason);
            self.fail(scan.id, &state, &message, &message).await?;
            return Err(ScannerError::Cancelled(reason));
        }

        self.finish(scan, &state, stats, started).await
    }

    async fn crawl(
        &self,
        scan: &Scan,
        state: &Arc<Mutex<ScanStateMachine>>,
        cancel: &ScanCancellation,
    ) -> ScannerResult<CrawlStats> {
        let config = Arc::new(scan.config.clone());

        let http_client = Arc::new(
            HttpClient::with_config(HttpClientConfig {
                timeout: Duration::from_secs(config.request_timeout_secs.max(1)),
                max_retries: self.settings.max_retries,
                user_agent: config.user_agent.clone(),
                cookie_store: true,
                accept_invalid_certs: self.settings.accept_invalid_certs,
                ..Default::default()
            })
            .map_err(|e| ScannerError::FatalCrawler(format!("HTTP client setup failed: {:#}", e)))?,
        );

        if let Some(credentials) = LoginCredentials::from_scan_config(&config) {
            let session = Authenticator::login(&http_client, &scan.target_url, &credentials).await?;
            self.store
                .append_log(
                    scan.id,
                    LogLevel::Info,
                    &format!("Authenticated via {}", session.authenticated_url),
                )
                .await?;
        }

        let robots = if config.check_robots {
            Some(RobotsCache::new(Arc::clone(&http_client), &config.user_agent))
        } else {
            None
        };

        let seed = url_normalizer::normalize(&scan.target_url);
        let worker = Arc::new(PageWorker {
            scan_id: scan.id,
            seed: seed.clone(),
            config: Arc::clone(&config),
            store: Arc::clone(&self.store),
            fingerprinter: Arc::clone(&self.fingerprinter),
            pipeline: Arc::clone(&self.pipeline),
            http_client,
            rate_limiter: Arc::new(ScanRateLimiter::new(RateLimiterConfig::for_scan(&config))),
            state: Arc::clone(state),
            metrics: Arc::clone(&self.metrics),
            site_findings: SyncMutex::new(HashSet::new()),
        });

        let max_pages = config.max_pages.max(1) as usize;
        let concurrency = config.concurrency.max(1) as usize;

        let mut frontier: VecDeque<(String, u32)> = VecDeque::new();
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(seed.clone());
        frontier.push_back((seed.clone(), 0));

        let mut in_flight: JoinSet<ScannerResult<PageOutcome>> = JoinSet::new();
        let mut dispatched = 0usize;
        let mut stats = CrawlStats::default();

        loop {
            let dispatched_before = dispatched;
            while !cancel.is_cancelled() && in_flight.len() < concurrency && dispatched < max_pages {
                let Some((url, depth)) = frontier.pop_front() else {
                    break;
                };
                if !url_normalizer::is_crawlable(&url) {
                    debug!("Skipping {} (not crawlable)", url);
                    continue;
                }

                let mut crawl_delay = None;
                if let Some(robots) = &robots {
                    let decision = robots.check(&url).await;
                    if !decision.allowed {
                        debug!("Skipping {} (blocked by robots.txt)", url);
                        stats.robots_skipped += 1;
                        self.store
                            .append_log(
                                scan.id,
                                LogLevel::Info,
                                &ScannerError::RobotsDisallowed { url: url.clone() }.to_string(),
                            )
                            .await?;
                        continue;
                    }
                    crawl_delay = decision.crawl_delay;
                }

                dispatched += 1;
                let worker = Arc::clone(&worker);
                in_flight.spawn(worker.process(url, depth, crawl_delay));
            }

            if dispatched > dispatched_before {
                let mut sm = state.lock().await;
                if sm.current_action() != CRAWLING_ACTION {
                    let update = sm.set_action(CRAWLING_ACTION)?;
                    self.store.update_scan_status(scan.id, update).await?;
                }
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };

            let outcome = match joined {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    in_flight.shutdown().await;
                    return Err(e);
                }
                Err(join_error) => {
                    // A panicking page task costs one page, not the scan
                    error!("[Crawler] Page task aborted: {}", join_error);
                    stats.pages_visited += 1;
                    stats.fetch_failures += 1;
                    continue;
                }
            };

            stats.pages_visited += 1;
            if let Some(e) = outcome.transport_error {
                if outcome.url == seed {
                    in_flight.shutdown().await;
                    return Err(ScannerError::FatalCrawler(format!(
                        "target unreachable: {}",
                        e
                    )));
                }
                stats.fetch_failures += 1;
            }
            stats.findings += outcome.findings;
            stats.analyzer_errors += outcome.analyzer_errors;
            stats.technologies.extend(outcome.technologies);

            let next_depth = outcome.depth + 1;
            if next_depth <= config.max_depth {
                for link in outcome.links {
                    if seen.insert(link.clone()) {
                        frontier.push_back((link, next_depth));
                    }
                }
            }

            let progress = crawl_progress(
                stats.pages_visited,
                frontier.len(),
                in_flight.len(),
                max_pages,
            );
            let mut sm = state.lock().await;
            if let Some(update) = sm.set_progress(progress)? {
                self.store.update_scan_status(scan.id, update).await?;
            }
        }

        if dispatched >= max_pages && !frontier.is_empty() {
            info!(
                "[Crawler] Reached max pages limit ({}), {} URLs left in frontier",
                max_pages,
                frontier.len()
            );
        }

        Ok(stats)
    }

    async fn finish(
        &self,
        scan: &Scan,
        state: &Arc<Mutex<ScanStateMachine>>,
        stats: CrawlStats,
        started: Instant,
    ) -> ScannerResult<CrawlSummary> {
        let mut sm = state.lock().await;

        let processing = sm.transition(ScanStatus::Processing, "Aggregating results")?;
        self.store.update_scan_status(scan.id, processing).await?;

        let summary = CrawlSummary {
            scan_id: scan.id,
            status: ScanStatus::Completed,
            pages_visited: stats.pages_visited,
            fetch_failures: stats.fetch_failures,
            robots_skipped: stats.robots_skipped,
            findings: stats.findings,
            analyzer_errors: stats.analyzer_errors,
            technologies: stats.technologies.into_iter().collect(),
            duration_ms: started.elapsed().as_millis() as u64,
        };

        let message = format!(
            "Scan completed: {} pages crawled, {} fetch failures, {} findings, {} technologies in {}ms",
            summary.pages_visited,
            summary.fetch_failures,
            summary.findings,
            summary.technologies.len(),
            summary.duration_ms
        );

        let completed = sm.complete("Completed")?;
        self.store.update_scan_status(scan.id, completed).await?;
        self.store.append_log(scan.id, LogLevel::Info, &message).await?;
        self.metrics.record_scan_completed();

        info!("[SUCCESS] {}", message);
        Ok(summary)
    }

    async fn fail(
        &self,
        scan_id: Uuid,
        state: &Arc<Mutex<ScanStateMachine>>,
        reason: &str,
        log_message: &str,
    ) -> ScannerResult<()> {
        let update: ScanStatusUpdate = {
            let mut sm = state.lock().await;
            match sm.fail(reason) {
                Ok(update) => update,
                Err(StateError::Terminal { .. }) => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        };

        self.store.update_scan_status(scan_id, update).await?;
        self.store.append_log(scan_id, LogLevel::Error, log_message).await?;
        self.metrics.record_scan_failed();
        Ok(())
    }
}

/// `min(99, round(100 * visited / estimated))` with
/// `estimated = min(max_pages, visited + frontier + in_flight)`, never below 1
pub fn crawl_progress(visited: usize, frontier: usize, in_flight: usize, max_pages: usize) -> u8 {
    let estimated = (visited + frontier + in_flight).min(max_pages).max(1);
    let pct = (100.0 * visited as f64 / estimated as f64).round();
    pct.min(99.0) as u8
}

fn origin_of(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.origin().ascii_serialization())
        .unwrap_or_else(|_| url.to_string())
}

/// Same-origin, crawlable, normalized links in first-seen order
pub fn extract_links(html: &str, page_url: &str, seed: &str) -> Vec<String> {
    let mut raw = Vec::new();
    {
        let document = Html::parse_document(html);
        for (selector, attr) in LINK_SOURCES {
            let Ok(selector) = Selector::parse(selector) else {
                continue;
            };
            for element in document.select(&selector) {
                let Some(value) = element.value().attr(attr) else {
                    continue;
                };
                let value = value.trim();
                let lower = value.to_lowercase();
                if value.is_empty() || SKIPPED_LINK_PREFIXES.iter().any(|p| lower.starts_with(p)) {
                    continue;
                }
                raw.push(resolve_url(page_url, value));
            }
        }
    }

    url_normalizer::dedupe(raw)
        .into_iter()
        .filter(|link| url_normalizer::same_origin(link, seed))
        .collect()
}

/// Resolve relative URL to absolute
pub fn resolve_url(base: &str, relative: &str) -> String {
    if relative.starts_with("http://") || relative.starts_with("https://") {
        return relative.to_string();
    }

    if let Ok(base_url) = Url::parse(base) {
        if let Ok(resolved) = base_url.join(relative) {
            return resolved.to_string();
        }
    }

    relative.to_string()
}

/// Validate a scan target against SSRF-style abuse
pub fn is_safe_url(url_str: &str, allow_private: bool) -> ScannerResult<Url> {
    let url = Url::parse(url_str)
        .map_err(|e| ScannerError::Configuration(format!("invalid target URL {}: {}", url_str, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ScannerError::Configuration(format!(
            "Invalid scheme: {}",
            url.scheme()
        )));
    }

    if allow_private {
        return Ok(url);
    }

    if let Some(host) = url.host_str() {
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.eq_ignore_ascii_case("localhost") || host.ends_with(".localhost") {
            return Err(ScannerError::Configuration("Cannot crawl localhost".to_string()));
        }

        if let Ok(ip) = host.parse::<IpAddr>() {
            if is_private_ip(&ip) {
                return Err(ScannerError::Configuration(format!(
                    "Cannot crawl private IP: {}",
                    ip
                )));
            }
        }
    }

    Ok(url)
}

/// Check if IP address is private/internal
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private()
                || ipv4.is_loopback()
                || ipv4.is_link_local()
                || ipv4.is_unspecified()
                || ipv4.octets()[0] == 100 && (64..=127).contains(&ipv4.octets()[1]) // CGNAT
        }
        IpAddr::V6(ipv6) => {
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                || (ipv6.segments()[0] & 0xfe00) == 0xfc00 // unique local
                || (ipv6.segments()[0] & 0xffc0) == 0xfe80 // link local
        }
    }
}
