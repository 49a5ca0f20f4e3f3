// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use anyhow::{Context, Result};
use url::Url;
use validator::Validate;

use super::core::AppConfig;
use crate::errors::{ScannerError, ScannerResult};
use crate::types::ScanConfig;

const MAX_DEPTH_LIMIT: u32 = 50;
const MAX_PAGES_LIMIT: u32 = 100_000;
const MAX_CONCURRENCY_LIMIT: u32 = 100;

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate_app_config(config: &AppConfig) -> Result<()> {
        config.validate()
            .context("Configuration validation failed")?;

        Self::validate_database_config(config)?;
        Self::validate_observability_config(config)?;

        Ok(())
    }

    fn validate_database_config(config: &AppConfig) -> Result<()> {
        if !config.database.enabled {
            return Ok(());
        }

        if config.database.url.is_empty() {
            return Err(anyhow::anyhow!("Database URL cannot be empty when database is enabled"));
        }

        if !config.database.url.starts_with("postgresql://")
            && !config.database.url.starts_with("postgres://") {
            return Err(anyhow::anyhow!(
                "Database URL must start with postgresql:// or postgres://"
            ));
        }

        Ok(())
    }

    fn validate_observability_config(config: &AppConfig) -> Result<()> {
        tracing_subscriber::EnvFilter::try_new(&config.observability.log_level)
            .map_err(|e| anyhow::anyhow!("Invalid log level '{}': {}", config.observability.log_level, e))?;
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ScannerError {
    ScannerError::Configuration(message.into())
}

/// Check a scan's target and settings before any crawling starts
pub fn validate_scan_config(target_url: &str, config: &ScanConfig) -> ScannerResult<()> {
    let url = Url::parse(target_url)
        .map_err(|e| invalid(format!("Invalid target URL '{}': {}", target_url, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid(format!("Unsupported target scheme: {}", url.scheme())));
    }

    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(invalid("Target URL has no host"));
    }

    if !crate::url_normalizer::is_crawlable(target_url) {
        return Err(invalid(format!(
            "Target URL is not crawlable (excluded file type or longer than {} characters)",
            crate::url_normalizer::MAX_URL_LENGTH
        )));
    }

    if config.max_depth > MAX_DEPTH_LIMIT {
        return Err(invalid(format!("maxDepth must be at most {}", MAX_DEPTH_LIMIT)));
    }

    if config.max_pages == 0 || config.max_pages > MAX_PAGES_LIMIT {
        return Err(invalid(format!("maxPages must be between 1 and {}", MAX_PAGES_LIMIT)));
    }

    if config.concurrency == 0 || config.concurrency > MAX_CONCURRENCY_LIMIT {
        return Err(invalid(format!("concurrency must be between 1 and {}", MAX_CONCURRENCY_LIMIT)));
    }

    if config.rate_limit == 0 || config.rate_limit_interval_ms == 0 {
        return Err(invalid("rateLimit and rateLimitIntervalMs must be greater than 0"));
    }

    if config.request_timeout_secs == 0 || config.scan_timeout_secs == 0 {
        return Err(invalid("Timeouts must be greater than 0"));
    }

    if config.user_agent.trim().is_empty() {
        return Err(invalid("userAgent cannot be empty"));
    }

    if config.auth_enabled {
        let has = |v: &Option<String>| v.as_deref().map(|s| !s.is_empty()).unwrap_or(false);
        if !has(&config.auth_username) || !has(&config.auth_password) {
            return Err(invalid("authEnabled requires authUsername and authPassword"));
        }

        if let Some(login_url) = config.auth_login_url.as_deref().filter(|u| !u.is_empty()) {
            let login = Url::parse(login_url)
                .map_err(|e| invalid(format!("Invalid authLoginUrl '{}': {}", login_url, e)))?;
            if login.scheme() != "http" && login.scheme() != "https" {
                return Err(invalid("authLoginUrl must be http or https"));
            }
        }
    }

    if !config.is_scheduled && config.schedule_cron.is_some() {
        return Err(invalid("scheduleCron is set but isScheduled is false"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_app_config_is_valid() {
        assert!(ConfigValidator::validate_app_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_database_url_scheme() {
        let mut config = AppConfig::default();
        config.database.enabled = true;
        config.database.url = "mysql://localhost/db".to_string();
        assert!(ConfigValidator::validate_app_config(&config).is_err());
    }

    #[test]
    fn test_range_validation() {
        let mut config = AppConfig::default();
        config.scheduler.tick_interval_secs = 0;
        assert!(ConfigValidator::validate_app_config(&config).is_err());

        let mut config = AppConfig::default();
        config.scanner.max_concurrent_scans = 0;
        assert!(ConfigValidator::validate_app_config(&config).is_err());
    }

    #[test]
    fn test_valid_scan_config() {
        assert!(validate_scan_config("https://example.com", &ScanConfig::default()).is_ok());
    }

    #[test]
    fn test_rejects_bad_targets() {
        let config = ScanConfig::default();
        for target in ["not a url", "ftp://example.com", "file:///etc/passwd", "example.com"] {
            assert!(
                matches!(validate_scan_config(target, &config), Err(ScannerError::Configuration(_))),
                "{} should be rejected",
                target
            );
        }
    }

    #[test]
    fn test_rejects_uncrawlable_targets() {
        let config = ScanConfig::default();
        let long = format!("https://example.com/{}", "a".repeat(crate::url_normalizer::MAX_URL_LENGTH));
        for target in ["https://example.com/report.pdf", "https://example.com/app.zip", long.as_str()] {
            assert!(
                matches!(validate_scan_config(target, &config), Err(ScannerError::Configuration(_))),
                "{} should be rejected",
                &target[..40.min(target.len())]
            );
        }
        assert!(validate_scan_config("https://example.com/docs/index.html", &config).is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_settings() {
        let cases = [
            ScanConfig { max_pages: 0, ..ScanConfig::default() },
            ScanConfig { concurrency: 0, ..ScanConfig::default() },
            ScanConfig { max_depth: 500, ..ScanConfig::default() },
            ScanConfig { rate_limit: 0, ..ScanConfig::default() },
        ];
        for config in cases {
            assert!(validate_scan_config("https://example.com", &config).is_err());
        }
    }

    #[test]
    fn test_auth_requires_credentials() {
        let mut config = ScanConfig {
            auth_enabled: true,
            auth_username: Some("admin".to_string()),
            ..ScanConfig::default()
        };
        assert!(validate_scan_config("https://example.com", &config).is_err());

        config.auth_password = Some("secret".to_string());
        assert!(validate_scan_config("https://example.com", &config).is_ok());

        config.auth_login_url = Some("javascript:alert(1)".to_string());
        assert!(validate_scan_config("https://example.com", &config).is_err());
    }

    #[test]
    fn test_cron_without_schedule_conflicts() {
        let config = ScanConfig {
            schedule_cron: Some("0 3 * * *".to_string()),
            ..ScanConfig::default()
        };
        assert!(validate_scan_config("https://example.com", &config).is_err());
    }
}
