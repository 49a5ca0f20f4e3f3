// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Scan Engine Error Types
 * Error taxonomy for crawling, analysis, scheduling and persistence
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::types::ScanStatus;

/// Main scanner error type
#[derive(Error, Debug)]
pub enum ScannerError {
    /// Invalid target or conflicting scan settings. Fatal before crawling starts.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A single URL could not be fetched. Recovered locally by the crawler.
    #[error("Failed to fetch {url}: {reason}")]
    PageFetch {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    /// Not an error condition; the URL is skipped.
    #[error("Disallowed by robots.txt: {url}")]
    RobotsDisallowed {
        url: String,
    },

    /// A vulnerability check failed on one page
    #[error("Analyzer {analyzer} failed on {url}: {reason}")]
    Analyzer {
        analyzer: String,
        url: String,
        reason: String,
    },

    /// Store unreachable while the scheduler was looking for due templates
    #[error("Scheduler tick failed: {0}")]
    SchedulerTick(String),

    /// Target unreachable or authentication setup failed
    #[error("Fatal crawler error: {0}")]
    FatalCrawler(String),

    /// Templates only spawn children, they never run themselves
    #[error("Scan {0} is a recurring template and cannot be executed directly")]
    TemplateExecution(Uuid),

    #[error("Scan {0} not found")]
    ScanNotFound(Uuid),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Operation timed out after {duration:?}")]
    Timeout {
        duration: Duration,
    },

    #[error("Scan cancelled: {0}")]
    Cancelled(String),

    #[error("Scanner error: {0}")]
    General(String),
}

/// Network-level failures with enough detail to decide on retries
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection timeout after {timeout:?} to {url}")]
    ConnectionTimeout {
        url: String,
        timeout: Duration,
    },

    #[error("Connection refused for {url}")]
    ConnectionRefused {
        url: String,
    },

    #[error("Too many redirects for {url}")]
    TooManyRedirects {
        url: String,
    },

    #[error("Invalid URL: {url}")]
    InvalidUrl {
        url: String,
    },

    #[error("Network error: {0}")]
    Other(String),
}

/// Scan lifecycle violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("scan is already {status} and cannot be modified")]
    Terminal {
        status: ScanStatus,
    },

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: ScanStatus,
        to: ScanStatus,
    },
}

/// Persistence errors raised by a `ScanStore`
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store connection failed: {reason}")]
    ConnectionFailed {
        reason: String,
    },

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),
}

impl NetworkError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::ConnectionTimeout { .. } => true,
            NetworkError::ConnectionRefused { .. } => false,
            NetworkError::TooManyRedirects { .. } => false,
            NetworkError::InvalidUrl { .. } => false,
            NetworkError::Other(_) => false,
        }
    }
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::ConnectionFailed { .. })
    }
}

impl ScannerError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            ScannerError::Network(e) => e.is_retryable(),
            ScannerError::Store(e) => e.is_retryable(),
            ScannerError::SchedulerTick(_) => true,
            ScannerError::Timeout { .. } => true,
            ScannerError::PageFetch { status, .. } => {
                matches!(status, Some(408 | 429 | 500 | 502 | 503 | 504))
            }
            _ => false,
        }
    }

    /// Errors that must move a running scan to `failed`
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScannerError::Configuration(_)
                | ScannerError::FatalCrawler(_)
                | ScannerError::Timeout { .. }
                | ScannerError::Cancelled(_)
        )
    }

    /// Short machine-friendly classification used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ScannerError::Configuration(_) => "configuration",
            ScannerError::PageFetch { .. } => "page_fetch",
            ScannerError::RobotsDisallowed { .. } => "robots_disallowed",
            ScannerError::Analyzer { .. } => "analyzer",
            ScannerError::SchedulerTick(_) => "scheduler_tick",
            ScannerError::FatalCrawler(_) => "fatal_crawler",
            ScannerError::TemplateExecution(_) => "template_execution",
            ScannerError::ScanNotFound(_) => "scan_not_found",
            ScannerError::State(_) => "state",
            ScannerError::Store(_) => "store",
            ScannerError::Network(_) => "network",
            ScannerError::Timeout { .. } => "timeout",
            ScannerError::Cancelled(_) => "cancelled",
            ScannerError::General(_) => "general",
        }
    }
}

/// Convert reqwest errors to our error types
impl From<reqwest::Error> for ScannerError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();

        if err.is_timeout() {
            ScannerError::Network(NetworkError::ConnectionTimeout {
                url,
                timeout: Duration::from_secs(30),
            })
        } else if err.is_connect() {
            ScannerError::Network(NetworkError::ConnectionRefused { url })
        } else if err.is_redirect() {
            ScannerError::Network(NetworkError::TooManyRedirects { url })
        } else if let Some(status) = err.status() {
            ScannerError::PageFetch {
                url,
                status: Some(status.as_u16()),
                reason: err.to_string(),
            }
        } else {
            ScannerError::Network(NetworkError::Other(err.to_string()))
        }
    }
}

/// Convert tokio-postgres errors to store errors
impl From<tokio_postgres::Error> for StoreError {
    fn from(err: tokio_postgres::Error) -> Self {
        StoreError::Query(err.to_string())
    }
}

/// Convert deadpool errors to store errors
impl From<deadpool_postgres::PoolError> for StoreError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        StoreError::ConnectionFailed {
            reason: err.to_string(),
        }
    }
}

/// Result type for scanner operations
pub type ScannerResult<T> = Result<T, ScannerError>;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_fetch_retryable_by_status() {
        let err = ScannerError::PageFetch {
            url: "https://example.com".to_string(),
            status: Some(503),
            reason: "unavailable".to_string(),
        };
        assert!(err.is_retryable());

        let err = ScannerError::PageFetch {
            url: "https://example.com".to_string(),
            status: Some(404),
            reason: "not found".to_string(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(ScannerError::Configuration("bad target".to_string()).is_fatal());
        assert!(ScannerError::FatalCrawler("unreachable".to_string()).is_fatal());
        assert!(!ScannerError::RobotsDisallowed { url: "/x".to_string() }.is_fatal());
        assert!(!ScannerError::Analyzer {
            analyzer: "xss".to_string(),
            url: "/".to_string(),
            reason: "boom".to_string(),
        }
        .is_fatal());
    }

    #[test]
    fn test_state_error_display() {
        let err = StateError::Terminal { status: ScanStatus::Completed };
        assert_eq!(err.to_string(), "scan is already completed and cannot be modified");
    }
}
