// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - SQL Injection Analyzer
 * Passive database error detection plus an error-based probe per parameter
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use async_trait::async_trait;
use tracing::{debug, info};

use super::{PageContext, VulnerabilityAnalyzer};
use crate::errors::ScannerResult;
use crate::types::{Finding, ScanConfig, Severity};

const NAME: &str = "sqli";

/// Lowercased database error signatures
const SQL_ERROR_PATTERNS: &[&str] = &[
    "you have an error in your sql syntax",
    "warning: mysql",
    "mysql_fetch",
    "mysqli_",
    "pg_query",
    "org.postgresql",
    "unterminated quoted string",
    "ora-00933",
    "ora-01756",
    "oracle.jdbc",
    "microsoft ole db provider for sql server",
    "unclosed quotation mark after the character string",
    "quoted string not properly terminated",
    "sqlstate[",
    "sqlite3::",
    "sqlite_error",
    "sqlexception",
    "oledbexception",
    "pdoexception",
    "odbc driver",
];

/// First signature found in `body`
pub fn find_sql_error(body: &str) -> Option<&'static str> {
    let lower = body.to_lowercase();
    SQL_ERROR_PATTERNS
        .iter()
        .copied()
        .find(|pattern| lower.contains(pattern))
}

pub struct SqlInjectionAnalyzer;

impl Default for SqlInjectionAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlInjectionAnalyzer {
    pub fn new() -> Self {
        Self
    }

    async fn probe_parameter(
        &self,
        ctx: &PageContext,
        name: &str,
        value: &str,
    ) -> ScannerResult<Option<Finding>> {
        let payload = format!("{}'", value);
        let Some(test_url) = ctx.url_with_param(name, &payload) else {
            return Ok(None);
        };

        let response = ctx.probe(&test_url).await?;
        let Some(signature) = find_sql_error(&response.body) else {
            return Ok(None);
        };

        info!("[SQLi] Error-based SQL injection in '{}' on {}", name, ctx.url);
        Ok(Some(
            Finding::new(ctx.scan_id, NAME, "SQL Injection", Severity::High, &ctx.url)
                .with_description(format!(
                    "Parameter '{}' breaks the SQL query when a single quote is appended",
                    name
                ))
                .with_parameter(name)
                .with_evidence(format!("Payload {:?} produced database error: {}", payload, signature))
                .with_cwe("CWE-89")
                .with_cvss(8.6)
                .with_remediation(
                    "Use parameterized queries or prepared statements; never build SQL from request input.",
                ),
        ))
    }
}

#[async_trait]
impl VulnerabilityAnalyzer for SqlInjectionAnalyzer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn enabled(&self, config: &ScanConfig) -> bool {
        config.vector_sqli
    }

    async fn analyze(&self, ctx: &PageContext) -> ScannerResult<Vec<Finding>> {
        let mut findings = Vec::new();

        let baseline_error = find_sql_error(&ctx.body);
        if let Some(signature) = baseline_error {
            findings.push(
                Finding::new(
                    ctx.scan_id,
                    NAME,
                    "Database Error Disclosure",
                    Severity::Medium,
                    &ctx.url,
                )
                .with_description("Page exposes a raw database error message")
                .with_evidence(format!("Matched signature: {}", signature))
                .with_cwe("CWE-209")
                .with_cvss(5.3)
                .with_remediation("Handle database errors server side and return a generic error page."),
            );
        }

        // Probing a page that already errors would only rediscover the same message
        if !ctx.config.allows_active_probes() || baseline_error.is_some() {
            return Ok(findings);
        }

        for (name, value) in ctx.query_params() {
            debug!("[SQLi] Probing parameter '{}' on {}", name, ctx.url);
            if let Some(finding) = self.probe_parameter(ctx, &name, &value).await? {
                findings.push(finding);
            }
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanners::test_support::context;
    use crate::types::ScanType;

    #[test]
    fn test_find_sql_error() {
        assert!(find_sql_error("You have an error in your SQL syntax near ''1''").is_some());
        assert!(find_sql_error("Warning: mysql_fetch_array() expects").is_some());
        assert!(find_sql_error("ORA-00933: SQL command not properly ended").is_some());
        assert!(find_sql_error("This is a normal response").is_none());
    }

    #[tokio::test]
    async fn test_passive_detection_in_quick_scan() {
        let config = ScanConfig {
            scan_type: ScanType::Quick,
            ..ScanConfig::default()
        };
        let ctx = context(
            "https://example.com/item?id=1",
            &[],
            "<p>SQLSTATE[42000]: Syntax error</p>",
            config,
        );
        let findings = SqlInjectionAnalyzer::new().analyze(&ctx).await.unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].title, "Database Error Disclosure");
    }

    #[tokio::test]
    async fn test_quick_scan_does_not_probe() {
        let config = ScanConfig {
            scan_type: ScanType::Quick,
            ..ScanConfig::default()
        };
        // Unroutable host: any probe would surface as an error
        let ctx = context("http://127.0.0.1:9/item?id=1", &[], "ok", config);
        let findings = SqlInjectionAnalyzer::new().analyze(&ctx).await.unwrap();
        assert!(findings.is_empty());
    }
}
