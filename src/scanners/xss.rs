// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Reflected XSS Analyzer
 * Marker reflection probe per parameter plus passive script-context reflection
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, info};
use uuid::Uuid;

use super::{PageContext, VulnerabilityAnalyzer};
use crate::errors::ScannerResult;
use crate::types::{Finding, ScanConfig, Severity};

const NAME: &str = "xss";

/// Values shorter than this reflect by accident too often
const MIN_REFLECTED_VALUE_LEN: usize = 4;

pub struct XssAnalyzer;

impl Default for XssAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl XssAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Unique payload whose unescaped reflection proves HTML injection
    fn marker_payload() -> String {
        let id = Uuid::new_v4().simple().to_string();
        format!("<sw{}>", &id[..8])
    }

    /// Inline script bodies on the page
    fn script_blocks(body: &str) -> Vec<String> {
        let document = Html::parse_document(body);
        let Ok(selector) = Selector::parse("script:not([src])") else {
            return Vec::new();
        };
        document
            .select(&selector)
            .map(|script| script.text().collect::<String>())
            .collect()
    }

    fn passive_findings(&self, ctx: &PageContext) -> Vec<Finding> {
        let params: Vec<(String, String)> = ctx
            .query_params()
            .into_iter()
            .filter(|(_, v)| {
                v.len() >= MIN_REFLECTED_VALUE_LEN && !v.chars().all(|c| c.is_ascii_digit())
            })
            .collect();
        if params.is_empty() || !ctx.is_html() {
            return Vec::new();
        }

        let scripts = Self::script_blocks(&ctx.body);
        params
            .into_iter()
            .filter(|(_, value)| scripts.iter().any(|script| script.contains(value.as_str())))
            .map(|(name, value)| {
                Finding::new(
                    ctx.scan_id,
                    NAME,
                    "Parameter Reflected in Script Context",
                    Severity::Medium,
                    &ctx.url,
                )
                .with_description(format!(
                    "Value of parameter '{}' is echoed inside an inline <script> block",
                    name
                ))
                .with_parameter(name)
                .with_evidence(format!("Reflected value: {}", value))
                .with_cwe("CWE-79")
                .with_cvss(6.1)
                .with_remediation("Encode untrusted data for the JavaScript context before embedding it.")
            })
            .collect()
    }
}

#[async_trait]
impl VulnerabilityAnalyzer for XssAnalyzer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn enabled(&self, config: &ScanConfig) -> bool {
        config.vector_xss
    }

    async fn analyze(&self, ctx: &PageContext) -> ScannerResult<Vec<Finding>> {
        let mut findings = self.passive_findings(ctx);

        if !ctx.config.allows_active_probes() {
            return Ok(findings);
        }

        for (name, _) in ctx.query_params() {
            let payload = Self::marker_payload();
            let Some(test_url) = ctx.url_with_param(&name, &payload) else {
                continue;
            };

            debug!("[XSS] Probing parameter '{}' on {}", name, ctx.url);
            let response = ctx.probe(&test_url).await?;
            if response.body.contains(&payload) {
                info!("[XSS] Reflected XSS in '{}' on {}", name, ctx.url);
                findings.retain(|f| f.parameter.as_deref() != Some(name.as_str()));
                findings.push(
                    Finding::new(ctx.scan_id, NAME, "Reflected Cross-Site Scripting", Severity::High, &ctx.url)
                        .with_description(format!(
                            "Parameter '{}' is reflected into the HTML response without encoding",
                            name
                        ))
                        .with_parameter(name)
                        .with_evidence(format!("Payload {} reflected verbatim", payload))
                        .with_cwe("CWE-79")
                        .with_cvss(7.1)
                        .with_remediation("HTML-encode untrusted input on output and deploy a strict CSP."),
                );
            }
        }

        Ok(findings)
    }
}
