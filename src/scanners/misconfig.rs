// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Misconfiguration Analyzer
 * Detects:
 * - Directory listing exposure
 * - Stack traces and debug pages
 * - Permissive CORS with credentials
 * - Cookies without Secure/HttpOnly
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{PageContext, VulnerabilityAnalyzer};
use crate::errors::ScannerResult;
use crate::types::{Finding, ScanConfig, Severity};

const NAME: &str = "misconfig";

const TITLE_CORS: &str = "Permissive CORS Policy";
const TITLE_COOKIE: &str = "Insecure Cookie Attributes";

static STACK_TRACE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Python
        r"Traceback \(most recent call last\)",
        // Java / JVM
        r"(?m)^\s*at [\w$.]+\([\w$]+\.(?:java|kt|scala):\d+\)",
        // .NET
        r"(?m)^\s*at [\w.`<>]+\(.*\) in .+:line \d+",
        // PHP
        r"(?i)(?:fatal error|warning|parse error)</b>:.+ on line <b>\d+",
        r"(?i)PHP (?:Fatal error|Warning|Parse error):.+ on line \d+",
        // Ruby / Rails
        r"(?m)^\s*[\w/.-]+\.rb:\d+:in `",
        // Node.js
        r"(?m)^\s*at .+ \((?:/|[A-Z]:\\)[^)]+\.js:\d+:\d+\)",
        // Framework debug pages
        r"(?i)Whitelabel Error Page|Werkzeug Debugger|DEBUG = True|Server Error in '/' Application",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

fn is_directory_listing(body: &str) -> bool {
    let lower = body.to_lowercase();
    let title = lower.contains("<title>index of /") || lower.contains("<h1>index of /");
    let listing = lower.contains("parent directory")
        || lower.contains("[dir]")
        || lower.contains("<a href=\"../\">");
    title && listing
}

fn find_stack_trace(body: &str) -> Option<String> {
    STACK_TRACE_PATTERNS
        .iter()
        .find_map(|re| re.find(body))
        .map(|m| m.as_str().trim().chars().take(200).collect())
}

/// Cookies missing Secure (on https) or HttpOnly: (name, missing attributes)
fn insecure_cookies(set_cookie: &str, https: bool) -> Vec<(String, Vec<&'static str>)> {
    let mut result = Vec::new();

    for line in set_cookie.lines() {
        let mut parts = line.split(';');
        let Some((name, _)) = parts.next().and_then(|p| p.split_once('=')) else {
            continue;
        };
        let attributes: Vec<String> = parts.map(|a| a.trim().to_lowercase()).collect();
        let has = |attr: &str| attributes.iter().any(|a| a == attr || a.starts_with(&format!("{}=", attr)));

        let mut missing = Vec::new();
        if https && !has("secure") {
            missing.push("Secure");
        }
        if !has("httponly") {
            missing.push("HttpOnly");
        }
        if !missing.is_empty() {
            result.push((name.trim().to_string(), missing));
        }
    }

    result
}

pub struct MisconfigAnalyzer;

impl Default for MisconfigAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl MisconfigAnalyzer {
    pub fn new() -> Self {
        Self
    }

    fn check_cors(&self, ctx: &PageContext, findings: &mut Vec<Finding>) {
        let origin = ctx.header("access-control-allow-origin").unwrap_or_default().trim();
        let credentials = ctx
            .header("access-control-allow-credentials")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        if origin == "*" && credentials {
            findings.push(
                Finding::new(ctx.scan_id, NAME, TITLE_CORS, Severity::Medium, &ctx.url)
                    .with_description("Any origin is allowed and credentials are enabled")
                    .with_parameter("Access-Control-Allow-Origin")
                    .with_evidence("Access-Control-Allow-Origin: *\nAccess-Control-Allow-Credentials: true")
                    .with_cwe("CWE-942")
                    .with_cvss(5.3)
                    .with_remediation("Reflect only trusted origins and never combine a wildcard with credentials."),
            );
        }
    }

    fn check_cookies(&self, ctx: &PageContext, findings: &mut Vec<Finding>) {
        let Some(set_cookie) = ctx.header("set-cookie") else {
            return;
        };

        for (name, missing) in insecure_cookies(set_cookie, ctx.is_https()) {
            findings.push(
                Finding::new(ctx.scan_id, NAME, TITLE_COOKIE, Severity::Low, &ctx.url)
                    .with_description(format!("Cookie '{}' is set without {}", name, missing.join(" and ")))
                    .with_parameter(name)
                    .with_evidence(format!("Missing attributes: {}", missing.join(", ")))
                    .with_cwe("CWE-614")
                    .with_cvss(3.1)
                    .with_remediation("Set the Secure and HttpOnly attributes on session cookies."),
            );
        }
    }
}

#[async_trait]
impl VulnerabilityAnalyzer for MisconfigAnalyzer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn enabled(&self, config: &ScanConfig) -> bool {
        config.vector_misconfig
    }

    fn is_site_wide(&self, finding: &Finding) -> bool {
        finding.title == TITLE_CORS || finding.title == TITLE_COOKIE
    }

    async fn analyze(&self, ctx: &PageContext) -> ScannerResult<Vec<Finding>> {
        let mut findings = Vec::new();

        if is_directory_listing(&ctx.body) {
            findings.push(
                Finding::new(ctx.scan_id, NAME, "Directory Listing Enabled", Severity::Medium, &ctx.url)
                    .with_description(format!("Directory listing is enabled for {}", ctx.path()))
                    .with_cwe("CWE-548")
                    .with_cvss(5.3)
                    .with_remediation("Disable automatic directory indexes in the web server configuration."),
            );
        }

        if let Some(trace) = find_stack_trace(&ctx.body) {
            findings.push(
                Finding::new(ctx.scan_id, NAME, "Stack Trace Disclosure", Severity::Medium, &ctx.url)
                    .with_description("Application exposes stack traces or a debug page")
                    .with_evidence(trace)
                    .with_cwe("CWE-209")
                    .with_cvss(5.3)
                    .with_remediation("Disable debug mode in production and return generic error pages."),
            );
        }

        self.check_cors(ctx, &mut findings);
        self.check_cookies(ctx, &mut findings);

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanners::test_support::context;

    #[test]
    fn test_directory_listing() {
        let body = r#"<html><head><title>Index of /backup</title></head>
            <body><h1>Index of /backup</h1><a href="../">Parent Directory</a></body></html>"#;
        assert!(is_directory_listing(body));
        assert!(!is_directory_listing("<title>Index of products</title>"));
    }

    #[test]
    fn test_stack_traces() {
        assert!(find_stack_trace("Traceback (most recent call last):\n  File \"app.py\"").is_some());
        assert!(find_stack_trace("java.lang.NullPointerException\n\tat com.acme.Foo.bar(Foo.java:42)").is_some());
        assert!(find_stack_trace("<b>Fatal error</b>: Uncaught Error in /var/www/x.php on line <b>7</b>").is_some());
        assert!(find_stack_trace("Please look at our catalog").is_none());
    }

    #[test]
    fn test_insecure_cookies() {
        let header = "session=abc; Path=/; HttpOnly\ntheme=dark; Path=/\nid=1; Secure; HttpOnly";
        let result = insecure_cookies(header, true);
        assert_eq!(
            result,
            vec![
                ("session".to_string(), vec!["Secure"]),
                ("theme".to_string(), vec!["Secure", "HttpOnly"]),
            ]
        );
        // Secure is not expected on plain http
        assert!(insecure_cookies("a=1; HttpOnly", false).is_empty());
    }

    #[tokio::test]
    async fn test_cors_with_credentials() {
        let ctx = context(
            "https://example.com/api",
            &[
                ("Access-Control-Allow-Origin", "*"),
                ("Access-Control-Allow-Credentials", "true"),
            ],
            "{}",
            ScanConfig::default(),
        );
        let analyzer = MisconfigAnalyzer::new();
        let findings = analyzer.analyze(&ctx).await.unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].title, TITLE_CORS);
        assert!(analyzer.is_site_wide(&findings[0]));
    }
}
