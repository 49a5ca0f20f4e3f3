// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - SSRF Analyzer
 * Flags URL-carrying parameters; deep scans probe the cloud metadata endpoint
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use async_trait::async_trait;
use tracing::{debug, info};

use super::{PageContext, VulnerabilityAnalyzer};
use crate::errors::ScannerResult;
use crate::types::{Finding, ScanConfig, ScanType, Severity};

const NAME: &str = "ssrf";

const URL_PARAM_NAMES: &[&str] = &[
    "url", "uri", "u", "dest", "destination", "redirect", "redirect_uri", "redirect_url",
    "return", "return_url", "returnto", "next", "target", "link", "src", "source", "callback",
    "feed", "host", "site", "domain", "proxy", "image", "image_url", "fetch", "load", "webhook",
];

const METADATA_PROBE: &str = "http://169.254.169.254/latest/meta-data/";

const METADATA_MARKERS: &[&str] = &[
    "ami-id",
    "instance-id",
    "local-ipv4",
    "security-credentials",
    "computemetadata",
    "iam/",
];

fn is_url_like_param(name: &str, value: &str) -> bool {
    let name = name.to_lowercase();
    let value = value.to_lowercase();
    URL_PARAM_NAMES.contains(&name.as_str())
        || value.starts_with("http://")
        || value.starts_with("https://")
        || value.starts_with("//")
}

fn find_metadata_marker(body: &str) -> Option<&'static str> {
    let lower = body.to_lowercase();
    METADATA_MARKERS.iter().copied().find(|m| lower.contains(m))
}

pub struct SsrfAnalyzer;

impl Default for SsrfAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SsrfAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VulnerabilityAnalyzer for SsrfAnalyzer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn enabled(&self, config: &ScanConfig) -> bool {
        config.vector_ssrf
    }

    async fn analyze(&self, ctx: &PageContext) -> ScannerResult<Vec<Finding>> {
        let mut findings = Vec::new();
        let deep = ctx.config.scan_type == ScanType::Deep;

        for (name, value) in ctx.query_params() {
            if !is_url_like_param(&name, &value) {
                continue;
            }

            if deep {
                if let Some(test_url) = ctx.url_with_param(&name, METADATA_PROBE) {
                    debug!("[SSRF] Probing '{}' with metadata address on {}", name, ctx.url);
                    let response = ctx.probe(&test_url).await?;
                    let baseline_has_marker = find_metadata_marker(&ctx.body).is_some();
                    if let (Some(marker), false) = (find_metadata_marker(&response.body), baseline_has_marker) {
                        info!("[SSRF] Metadata endpoint reachable through '{}' on {}", name, ctx.url);
                        findings.push(
                            Finding::new(
                                ctx.scan_id,
                                NAME,
                                "Server-Side Request Forgery",
                                Severity::Critical,
                                &ctx.url,
                            )
                            .with_description(format!(
                                "Parameter '{}' makes the server fetch attacker-chosen URLs, including cloud metadata",
                                name
                            ))
                            .with_parameter(name)
                            .with_evidence(format!("Metadata marker '{}' in response to {}", marker, METADATA_PROBE))
                            .with_cwe("CWE-918")
                            .with_cvss(9.1)
                            .with_remediation(
                                "Validate outbound URLs against an allowlist and block link-local and private ranges.",
                            ),
                        );
                        continue;
                    }
                }
            }

            findings.push(
                Finding::new(ctx.scan_id, NAME, "Potential SSRF Parameter", Severity::Info, &ctx.url)
                    .with_description(format!(
                        "Parameter '{}' appears to carry a URL and may be fetched server side",
                        name
                    ))
                    .with_parameter(name)
                    .with_evidence(format!("Value: {}", value))
                    .with_cwe("CWE-918")
                    .with_remediation("Confirm the server never fetches this URL, or restrict it to an allowlist."),
            );
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanners::test_support::context;

    #[test]
    fn test_url_like_params() {
        assert!(is_url_like_param("redirect_uri", "x"));
        assert!(is_url_like_param("q", "https://other.example"));
        assert!(is_url_like_param("URL", ""));
        assert!(!is_url_like_param("page", "2"));
    }

    #[tokio::test]
    async fn test_flags_url_parameter_without_probing() {
        let ctx = context(
            "https://example.com/proxy?url=https%3A%2F%2Fimg.example.net%2Fa.png&page=2",
            &[],
            "",
            ScanConfig::default(),
        );
        let findings = SsrfAnalyzer::new().analyze(&ctx).await.unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].parameter.as_deref(), Some("url"));
        assert_eq!(findings[0].severity, Severity::Info);
    }

    #[test]
    fn test_metadata_markers() {
        assert_eq!(find_metadata_marker("ami-id\nhostname\n"), Some("ami-id"));
        assert!(find_metadata_marker("<html>hello</html>").is_none());
    }
}
