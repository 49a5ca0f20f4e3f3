// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Security Headers Analyzer
 * Flags missing or misconfigured HTTP security headers
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */
use async_trait::async_trait;
use tracing::debug;

use super::{PageContext, VulnerabilityAnalyzer};
use crate::errors::ScannerResult;
use crate::types::{Finding, ScanConfig, Severity};

const NAME: &str = "security_headers";

pub struct SecurityHeadersAnalyzer;

impl Default for SecurityHeadersAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityHeadersAnalyzer {
    pub fn new() -> Self {
        Self
    }

    fn finding(
        &self,
        ctx: &PageContext,
        title: &str,
        severity: Severity,
        header: &str,
        description: &str,
        evidence: String,
        cvss: f32,
    ) -> Finding {
        Finding::new(ctx.scan_id, NAME, title, severity, &ctx.url)
            .with_description(description)
            .with_parameter(header)
            .with_evidence(evidence)
            .with_cwe("CWE-693")
            .with_cvss(cvss)
            .with_remediation(format!(
                "Configure the {} response header on every page served by this origin.",
                header
            ))
    }

    fn check_hsts(&self, ctx: &PageContext, findings: &mut Vec<Finding>) {
        if !ctx.is_https() {
            return;
        }

        match ctx.header("strict-transport-security") {
            Some(hsts) => {
                let max_age = hsts
                    .split(';')
                    .filter_map(|d| d.trim().strip_prefix("max-age="))
                    .find_map(|v| v.trim_matches('"').parse::<u64>().ok());
                if max_age == Some(0) {
                    findings.push(self.finding(
                        ctx,
                        "Weak HSTS Configuration",
                        Severity::Low,
                        "Strict-Transport-Security",
                        "HSTS max-age is 0, which disables the policy",
                        format!("Strict-Transport-Security: {}", hsts),
                        3.7,
                    ));
                }
            }
            None => findings.push(self.finding(
                ctx,
                "Missing HSTS Header",
                Severity::Medium,
                "Strict-Transport-Security",
                "HTTP Strict Transport Security (HSTS) header is missing",
                "HTTPS site without HSTS is vulnerable to SSL stripping attacks".to_string(),
                5.3,
            )),
        }
    }

    fn check_csp(&self, ctx: &PageContext, findings: &mut Vec<Finding>) {
        match ctx.header("content-security-policy") {
            Some(csp) => {
                if csp.contains("unsafe-inline") || csp.contains("unsafe-eval") {
                    findings.push(self.finding(
                        ctx,
                        "Weak CSP Configuration",
                        Severity::Low,
                        "Content-Security-Policy",
                        "Content Security Policy allows unsafe-inline or unsafe-eval",
                        format!("CSP: {}", csp),
                        3.1,
                    ));
                }
            }
            None => findings.push(self.finding(
                ctx,
                "Missing CSP Header",
                Severity::Medium,
                "Content-Security-Policy",
                "Content Security Policy (CSP) header is missing",
                "No CSP protection against XSS and data injection attacks".to_string(),
                5.3,
            )),
        }
    }

    fn check_frame_options(&self, ctx: &PageContext, findings: &mut Vec<Finding>) {
        let has_frame_ancestors = ctx
            .header("content-security-policy")
            .map(|csp| csp.to_lowercase().contains("frame-ancestors"))
            .unwrap_or(false);

        if ctx.header("x-frame-options").is_none() && !has_frame_ancestors {
            findings.push(
                self.finding(
                    ctx,
                    "Missing X-Frame-Options Header",
                    Severity::Medium,
                    "X-Frame-Options",
                    "Page can be framed by any origin (no X-Frame-Options or CSP frame-ancestors)",
                    "Neither X-Frame-Options nor frame-ancestors present".to_string(),
                    4.3,
                )
                .with_cwe("CWE-1021"),
            );
        }
    }

    fn check_content_type_options(&self, ctx: &PageContext, findings: &mut Vec<Finding>) {
        let ok = ctx
            .header("x-content-type-options")
            .map(|v| v.eq_ignore_ascii_case("nosniff"))
            .unwrap_or(false);
        if !ok {
            findings.push(self.finding(
                ctx,
                "Missing X-Content-Type-Options",
                Severity::Low,
                "X-Content-Type-Options",
                "X-Content-Type-Options header is missing",
                "Browsers may MIME-sniff content, leading to security issues".to_string(),
                3.1,
            ));
        }
    }

    fn check_version_disclosure(&self, ctx: &PageContext, findings: &mut Vec<Finding>) {
        for header in ["server", "x-powered-by"] {
            let Some(value) = ctx.header(header) else {
                continue;
            };
            if value.chars().any(|c| c.is_ascii_digit()) {
                findings.push(
                    self.finding(
                        ctx,
                        "Server Version Disclosure",
                        Severity::Info,
                        header,
                        "Response header discloses software version information",
                        format!("{}: {}", header, value),
                        0.0,
                    )
                    .with_cwe("CWE-200")
                    .with_remediation(format!("Remove version details from the {} header.", header)),
                );
            }
        }
    }
}

#[async_trait]
impl VulnerabilityAnalyzer for SecurityHeadersAnalyzer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn enabled(&self, config: &ScanConfig) -> bool {
        config.check_headers
    }

    fn is_site_wide(&self, _finding: &Finding) -> bool {
        true
    }

    async fn analyze(&self, ctx: &PageContext) -> ScannerResult<Vec<Finding>> {
        let mut findings = Vec::new();

        // Error pages often carry a different header set
        if ctx.status_code == 404 || ctx.status_code >= 500 {
            debug!("[Security Headers] Skipping HTTP {} response: {}", ctx.status_code, ctx.url);
            return Ok(findings);
        }

        self.check_hsts(ctx, &mut findings);
        self.check_version_disclosure(ctx, &mut findings);

        // Browser rendering headers only matter for HTML
        if ctx.is_html() {
            self.check_csp(ctx, &mut findings);
            self.check_frame_options(ctx, &mut findings);
            self.check_content_type_options(ctx, &mut findings);
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanners::test_support::context;

    fn titles(findings: &[Finding]) -> Vec<&str> {
        findings.iter().map(|f| f.title.as_str()).collect()
    }

    #[tokio::test]
    async fn test_bare_https_page() {
        let ctx = context(
            "https://example.com/",
            &[("Content-Type", "text/html"), ("Server", "nginx/1.18.0")],
            "<html></html>",
            ScanConfig::default(),
        );
        let findings = SecurityHeadersAnalyzer::new().analyze(&ctx).await.unwrap();
        let titles = titles(&findings);

        assert!(titles.contains(&"Missing HSTS Header"));
        assert!(titles.contains(&"Missing CSP Header"));
        assert!(titles.contains(&"Missing X-Frame-Options Header"));
        assert!(titles.contains(&"Missing X-Content-Type-Options"));
        assert!(titles.contains(&"Server Version Disclosure"));
    }

    #[tokio::test]
    async fn test_hardened_page() {
        let ctx = context(
            "https://example.com/",
            &[
                ("Content-Type", "text/html"),
                ("Strict-Transport-Security", "max-age=31536000"),
                ("Content-Security-Policy", "default-src 'self'; frame-ancestors 'none'"),
                ("X-Content-Type-Options", "nosniff"),
                ("Server", "nginx"),
            ],
            "<html></html>",
            ScanConfig::default(),
        );
        let findings = SecurityHeadersAnalyzer::new().analyze(&ctx).await.unwrap();
        assert!(findings.is_empty(), "unexpected: {:?}", titles(&findings));
    }

    #[tokio::test]
    async fn test_unsafe_inline_csp() {
        let ctx = context(
            "http://example.com/",
            &[
                ("Content-Type", "text/html"),
                ("Content-Security-Policy", "script-src 'self' 'unsafe-inline'"),
                ("X-Frame-Options", "DENY"),
                ("X-Content-Type-Options", "nosniff"),
            ],
            "<html></html>",
            ScanConfig::default(),
        );
        let findings = SecurityHeadersAnalyzer::new().analyze(&ctx).await.unwrap();
        // No HSTS finding on plain http
        assert_eq!(titles(&findings), vec!["Weak CSP Configuration"]);
        assert_eq!(findings[0].severity, Severity::Low);
    }

    #[tokio::test]
    async fn test_json_only_checks_hsts() {
        let ctx = context(
            "https://example.com/api",
            &[("Content-Type", "application/json")],
            "{}",
            ScanConfig::default(),
        );
        let findings = SecurityHeadersAnalyzer::new().analyze(&ctx).await.unwrap();
        assert_eq!(titles(&findings), vec!["Missing HSTS Header"]);
    }
}
