// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use async_trait::async_trait;
use scraper::{Html, Selector};

use super::{PageContext, VulnerabilityAnalyzer};
use crate::errors::ScannerResult;
use crate::types::{Finding, ScanConfig, Severity};

const NAME: &str = "mixed_content";

/// Evidence is capped to keep findings readable
const MAX_EVIDENCE_URLS: usize = 5;

/// (selector, attribute) pairs that load code or documents
const ACTIVE_SOURCES: &[(&str, &str)] = &[
    ("script[src]", "src"),
    ("iframe[src]", "src"),
    ("link[rel='stylesheet'][href]", "href"),
    ("object[data]", "data"),
    ("embed[src]", "src"),
];

const PASSIVE_SOURCES: &[(&str, &str)] = &[
    ("img[src]", "src"),
    ("audio[src]", "src"),
    ("video[src]", "src"),
    ("source[src]", "src"),
];

/// HTTPS pages pulling sub-resources over plain HTTP
pub struct MixedContentAnalyzer;

impl Default for MixedContentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl MixedContentAnalyzer {
    pub fn new() -> Self {
        Self
    }

    fn collect_insecure(document: &Html, sources: &[(&str, &str)]) -> Vec<String> {
        let mut found = Vec::new();
        for (selector, attr) in sources {
            let Ok(selector) = Selector::parse(selector) else {
                continue;
            };
            for element in document.select(&selector) {
                if let Some(value) = element.value().attr(attr) {
                    let value = value.trim();
                    let insecure = value
                        .get(..7)
                        .map(|scheme| scheme.eq_ignore_ascii_case("http://"))
                        .unwrap_or(false);
                    if insecure && value.len() > 7 {
                        found.push(value.to_string());
                    }
                }
            }
        }
        found.dedup();
        found
    }

    fn finding(ctx: &PageContext, active: bool, urls: &[String]) -> Finding {
        let (title, severity, cvss) = if active {
            ("Mixed Content: Active Resources", Severity::High, 7.4)
        } else {
            ("Mixed Content: Passive Resources", Severity::Low, 3.1)
        };

        let evidence = urls
            .iter()
            .take(MAX_EVIDENCE_URLS)
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");

        Finding::new(ctx.scan_id, NAME, title, severity, &ctx.url)
            .with_description(format!(
                "HTTPS page loads {} resource(s) over plain HTTP",
                urls.len()
            ))
            .with_evidence(evidence)
            .with_cwe("CWE-319")
            .with_cvss(cvss)
            .with_remediation(
                "Serve every sub-resource over HTTPS or use Content-Security-Policy: upgrade-insecure-requests.",
            )
    }
}

#[async_trait]
impl VulnerabilityAnalyzer for MixedContentAnalyzer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn enabled(&self, config: &ScanConfig) -> bool {
        config.check_mixed_content
    }

    async fn analyze(&self, ctx: &PageContext) -> ScannerResult<Vec<Finding>> {
        if !ctx.is_https() || !ctx.is_html() {
            return Ok(Vec::new());
        }

        let (active, passive) = {
            let document = Html::parse_document(&ctx.body);
            (
                Self::collect_insecure(&document, ACTIVE_SOURCES),
                Self::collect_insecure(&document, PASSIVE_SOURCES),
            )
        };

        let mut findings = Vec::new();
        if !active.is_empty() {
            findings.push(Self::finding(ctx, true, &active));
        }
        if !passive.is_empty() {
            findings.push(Self::finding(ctx, false, &passive));
        }
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanners::test_support::context;

    const PAGE: &str = r#"
        <html><head>
          <script src="http://cdn.example.net/app.js"></script>
          <link rel="stylesheet" href="https://cdn.example.net/site.css">
        </head><body>
          <img src="http://img.example.net/logo.png">
          <img src="/local.png">
        </body></html>
    "#;

    #[tokio::test]
    async fn test_active_and_passive() {
        let ctx = context("https://example.com/", &[("content-type", "text/html")], PAGE, ScanConfig::default());
        let findings = MixedContentAnalyzer::new().analyze(&ctx).await.unwrap();

        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].evidence.as_deref(), Some("http://cdn.example.net/app.js"));
        assert_eq!(findings[1].severity, Severity::Low);
    }

    #[tokio::test]
    async fn test_http_page_ignored() {
        let ctx = context("http://example.com/", &[("content-type", "text/html")], PAGE, ScanConfig::default());
        assert!(MixedContentAnalyzer::new().analyze(&ctx).await.unwrap().is_empty());
    }
}
