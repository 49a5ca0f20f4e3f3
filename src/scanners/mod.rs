// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Vulnerability Analyzers
 * Per-page analyzers and the pipeline that runs them
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::errors::{ScannerError, ScannerResult};
use crate::http_client::{HttpClient, HttpResponse};
use crate::rate_limiter::ScanRateLimiter;
use crate::types::{Finding, ScanConfig};

pub mod misconfig;
pub mod mixed_content;
pub mod security_headers;
pub mod sqli;
pub mod ssrf;
pub mod xss;

pub use misconfig::MisconfigAnalyzer;
pub use mixed_content::MixedContentAnalyzer;
pub use security_headers::SecurityHeadersAnalyzer;
pub use sqli::SqlInjectionAnalyzer;
pub use ssrf::SsrfAnalyzer;
pub use xss::XssAnalyzer;

/// Everything an analyzer may look at for one fetched page
#[derive(Clone)]
pub struct PageContext {
    pub scan_id: Uuid,
    /// Normalized page URL
    pub url: String,
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub config: Arc<ScanConfig>,
    pub http_client: Arc<HttpClient>,
    pub rate_limiter: Arc<ScanRateLimiter>,
}

impl PageContext {
    pub fn new(
        scan_id: Uuid,
        url: &str,
        response: &HttpResponse,
        config: Arc<ScanConfig>,
        http_client: Arc<HttpClient>,
        rate_limiter: Arc<ScanRateLimiter>,
    ) -> Self {
        Self {
            scan_id,
            url: url.to_string(),
            status_code: response.status_code,
            headers: response.headers.clone(),
            body: response.body.clone(),
            config,
            http_client,
            rate_limiter,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn is_https(&self) -> bool {
        self.url.starts_with("https://")
    }

    pub fn is_html(&self) -> bool {
        match self.header("content-type") {
            Some(ct) => ct.to_lowercase().contains("text/html"),
            None => {
                let head = self.body.trim_start();
                head.starts_with('<') && !head.starts_with("<?xml")
            }
        }
    }

    pub fn path(&self) -> String {
        Url::parse(&self.url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| self.url.clone())
    }

    /// Decoded query parameters in order
    pub fn query_params(&self) -> Vec<(String, String)> {
        Url::parse(&self.url)
            .map(|u| {
                u.query_pairs()
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The page URL with one query parameter's value replaced
    pub fn url_with_param(&self, name: &str, value: &str) -> Option<String> {
        let mut url = Url::parse(&self.url).ok()?;
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| {
                let v = if k == name { value.to_string() } else { v.into_owned() };
                (k.into_owned(), v)
            })
            .collect();
        url.query_pairs_mut().clear().extend_pairs(pairs);
        Some(url.to_string())
    }

    /// Send an active probe through the scan's rate limiter
    pub async fn probe(&self, url: &str) -> ScannerResult<HttpResponse> {
        self.rate_limiter.wait_for_slot().await;
        let response = self.http_client.get(url).await?;
        if response.status_code == 429 || response.status_code == 503 {
            self.rate_limiter.record_rate_limit(response.status_code).await;
        }
        Ok(response)
    }
}

/// A pluggable per-page check
#[async_trait]
pub trait VulnerabilityAnalyzer: Send + Sync {
    fn name(&self) -> &'static str;

    fn enabled(&self, config: &ScanConfig) -> bool;

    /// Findings that describe the whole site rather than the page; the crawler
    /// records each of them once per origin.
    fn is_site_wide(&self, _finding: &Finding) -> bool {
        false
    }

    async fn analyze(&self, ctx: &PageContext) -> ScannerResult<Vec<Finding>>;
}

/// What the pipeline produced for one page
#[derive(Debug, Default)]
pub struct PipelineOutcome {
    pub page_findings: Vec<Finding>,
    pub site_findings: Vec<Finding>,
    pub errors: Vec<ScannerError>,
}

impl PipelineOutcome {
    pub fn finding_count(&self) -> usize {
        self.page_findings.len() + self.site_findings.len()
    }
}

/// Runs every enabled analyzer against a page
#[derive(Clone)]
pub struct AnalyzerPipeline {
    analyzers: Vec<Arc<dyn VulnerabilityAnalyzer>>,
}

impl Default for AnalyzerPipeline {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl AnalyzerPipeline {
    pub fn new(analyzers: Vec<Arc<dyn VulnerabilityAnalyzer>>) -> Self {
        Self { analyzers }
    }

    /// The built-in analyzer set
    pub fn with_defaults() -> Self {
        Self::new(vec![
            Arc::new(SecurityHeadersAnalyzer::new()),
            Arc::new(MixedContentAnalyzer::new()),
            Arc::new(SqlInjectionAnalyzer::new()),
            Arc::new(XssAnalyzer::new()),
            Arc::new(SsrfAnalyzer::new()),
            Arc::new(MisconfigAnalyzer::new()),
        ])
    }

    pub fn push(&mut self, analyzer: Arc<dyn VulnerabilityAnalyzer>) {
        self.analyzers.push(analyzer);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.analyzers.iter().map(|a| a.name()).collect()
    }

    /// A failing analyzer is recorded and the remaining ones still run.
    ///
    /// Each analyzer runs on its own task, so a panic is reported as an
    /// analyzer error instead of unwinding through the page.
    pub async fn run(&self, ctx: &PageContext) -> PipelineOutcome {
        let mut outcome = PipelineOutcome::default();
        let shared = Arc::new(ctx.clone());

        for analyzer in &self.analyzers {
            if !analyzer.enabled(&ctx.config) {
                continue;
            }

            let started = Instant::now();
            match run_isolated(Arc::clone(analyzer), Arc::clone(&shared)).await {
                Ok(findings) => {
                    debug!(
                        "[{}] {} finding(s) on {} in {:?}",
                        analyzer.name(),
                        findings.len(),
                        ctx.url,
                        started.elapsed()
                    );
                    for finding in findings {
                        if analyzer.is_site_wide(&finding) {
                            outcome.site_findings.push(finding);
                        } else {
                            outcome.page_findings.push(finding);
                        }
                    }
                }
                Err(reason) => {
                    warn!("[{}] Analyzer failed on {}: {}", analyzer.name(), ctx.url, reason);
                    outcome.errors.push(ScannerError::Analyzer {
                        analyzer: analyzer.name().to_string(),
                        url: ctx.url.clone(),
                        reason,
                    });
                }
            }
        }

        outcome
    }
}

/// Dropping the returned future aborts the analyzer task
async fn run_isolated(
    analyzer: Arc<dyn VulnerabilityAnalyzer>,
    ctx: Arc<PageContext>,
) -> Result<Vec<Finding>, String> {
    let mut task = JoinSet::new();
    task.spawn(async move { analyzer.analyze(&ctx).await });

    match task.join_next().await {
        Some(Ok(result)) => result.map_err(|e| e.to_string()),
        Some(Err(join_error)) if join_error.is_panic() => Err("analyzer panicked".to_string()),
        Some(Err(join_error)) => Err(join_error.to_string()),
        None => Err("analyzer task missing".to_string()),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::rate_limiter::RateLimiterConfig;

    pub fn context(url: &str, headers: &[(&str, &str)], body: &str, config: ScanConfig) -> PageContext {
        PageContext {
            scan_id: Uuid::new_v4(),
            url: url.to_string(),
            status_code: 200,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.to_string()))
                .collect(),
            body: body.to_string(),
            config: Arc::new(config),
            http_client: Arc::new(HttpClient::new(5, 0).unwrap()),
            rate_limiter: Arc::new(ScanRateLimiter::new(RateLimiterConfig::default())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::context;
    use super::*;
    use crate::types::Severity;

    struct Failing;

    #[async_trait]
    impl VulnerabilityAnalyzer for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn enabled(&self, _config: &ScanConfig) -> bool {
            true
        }
        async fn analyze(&self, _ctx: &PageContext) -> ScannerResult<Vec<Finding>> {
            Err(ScannerError::General("boom".to_string()))
        }
    }

    struct Constant;

    #[async_trait]
    impl VulnerabilityAnalyzer for Constant {
        fn name(&self) -> &'static str {
            "constant"
        }
        fn enabled(&self, _config: &ScanConfig) -> bool {
            true
        }
        async fn analyze(&self, ctx: &PageContext) -> ScannerResult<Vec<Finding>> {
            Ok(vec![Finding::new(ctx.scan_id, "constant", "Test", Severity::Info, &ctx.url)])
        }
    }

    struct Panicking;

    #[async_trait]
    impl VulnerabilityAnalyzer for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }
        fn enabled(&self, _config: &ScanConfig) -> bool {
            true
        }
        async fn analyze(&self, ctx: &PageContext) -> ScannerResult<Vec<Finding>> {
            if ctx.path() == "/" {
                panic!("unexpected page shape");
            }
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_panicking_analyzer_keeps_other_findings() {
        let pipeline = AnalyzerPipeline::new(vec![
            Arc::new(Constant),
            Arc::new(Panicking),
            Arc::new(Constant),
        ]);
        let ctx = context("https://example.com/", &[], "", ScanConfig::default());

        let outcome = pipeline.run(&ctx).await;
        assert_eq!(outcome.page_findings.len(), 2);
        assert_eq!(outcome.errors.len(), 1);
        assert!(matches!(
            &outcome.errors[0],
            ScannerError::Analyzer { analyzer, reason, .. }
                if analyzer == "panicking" && reason == "analyzer panicked"
        ));
    }

    #[tokio::test]
    async fn test_failing_analyzer_does_not_stop_pipeline() {
        let pipeline = AnalyzerPipeline::new(vec![Arc::new(Failing), Arc::new(Constant)]);
        let ctx = context("https://example.com/", &[], "", ScanConfig::default());

        let outcome = pipeline.run(&ctx).await;
        assert_eq!(outcome.page_findings.len(), 1);
        assert_eq!(outcome.errors.len(), 1);
        assert!(matches!(
            &outcome.errors[0],
            ScannerError::Analyzer { analyzer, .. } if analyzer == "failing"
        ));
    }

    #[test]
    fn test_url_with_param() {
        let ctx = context("https://example.com/p?a=1&b=2", &[], "", ScanConfig::default());
        assert_eq!(
            ctx.url_with_param("b", "x'").as_deref(),
            Some("https://example.com/p?a=1&b=x%27")
        );
        assert_eq!(ctx.query_params().len(), 2);
    }

    #[test]
    fn test_default_pipeline_names() {
        let names = AnalyzerPipeline::with_defaults().names();
        assert_eq!(
            names,
            vec!["security_headers", "mixed_content", "sqli", "xss", "ssrf", "misconfig"]
        );
    }
}
