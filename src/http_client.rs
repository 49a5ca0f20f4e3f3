// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::errors::{NetworkError, ScannerError, ScannerResult};

/// Maximum response body size (10MB) to prevent memory exhaustion
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

const DEFAULT_POOL_IDLE_PER_HOST: usize = 16;
const DEFAULT_POOL_MAX_IDLE_TIMEOUT: u64 = 90;
const MAX_REDIRECTS: usize = 5;

/// HTTP client settings for one scan
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub user_agent: String,
    /// Keep cookies between requests (authenticated sessions)
    pub cookie_store: bool,
    pub accept_invalid_certs: bool,
    pub max_body_size: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 2,
            user_agent: format!("ScanwardBot/{}", env!("CARGO_PKG_VERSION")),
            cookie_store: true,
            accept_invalid_certs: false,
            max_body_size: MAX_BODY_SIZE,
        }
    }
}

#[derive(Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    timeout: Duration,
    max_retries: u32,
    max_body_size: usize,
}

impl HttpClient {
    pub fn new(timeout_secs: u64, max_retries: u32) -> Result<Self> {
        Self::with_config(HttpClientConfig {
            timeout: Duration::from_secs(timeout_secs),
            max_retries,
            ..Default::default()
        })
    }

    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        if config.accept_invalid_certs {
            tracing::warn!(
                "[WARNING] Certificate validation is DISABLED. Only use this against lab targets."
            );
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(config.user_agent.as_str())
            .cookie_store(config.cookie_store)
            .pool_max_idle_per_host(DEFAULT_POOL_IDLE_PER_HOST)
            .pool_idle_timeout(Duration::from_secs(DEFAULT_POOL_MAX_IDLE_TIMEOUT))
            .tcp_nodelay(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client: Arc::new(client),
            timeout: config.timeout,
            max_retries: config.max_retries,
            max_body_size: config.max_body_size,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send GET request
    pub async fn get(&self, url: &str) -> ScannerResult<HttpResponse> {
        self.send_with_retries(url, || self.client.get(url)).await
    }

    /// Send an `application/x-www-form-urlencoded` POST
    pub async fn post_form(&self, url: &str, fields: &[(String, String)]) -> ScannerResult<HttpResponse> {
        let body = fields
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        self.send_with_retries(url, || {
            self.client
                .post(url)
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(body.clone())
        })
        .await
    }

    /// Transport errors are retried with a growing delay. Any HTTP status,
    /// including 4xx/5xx, is a successful exchange and returned as is.
    async fn send_with_retries<F>(&self, url: &str, build: F) -> ScannerResult<HttpResponse>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempts = 0;

        loop {
            let started = Instant::now();
            match build().send().await {
                Ok(response) => return self.read_response(response, started).await,
                Err(e) => {
                    let err = ScannerError::from(e);
                    attempts += 1;
                    if attempts > self.max_retries || !err.is_retryable() {
                        debug!("Request to {} failed after {} attempt(s): {}", url, attempts, err);
                        return Err(err);
                    }
                    tokio::time::sleep(Duration::from_millis(100 * attempts as u64)).await;
                }
            }
        }
    }

    async fn read_response(
        &self,
        response: reqwest::Response,
        started: Instant,
    ) -> ScannerResult<HttpResponse> {
        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();

        let mut headers: HashMap<String, String> = HashMap::with_capacity(response.headers().len());
        for (name, value) in response.headers() {
            let Ok(value) = value.to_str() else {
                continue;
            };
            let separator = if name.as_str() == "set-cookie" { "\n" } else { ", " };
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing: &mut String| {
                    existing.push_str(separator);
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }

        let body_bytes = response.bytes().await.map_err(|e| {
            ScannerError::Network(NetworkError::Other(format!(
                "failed reading body from {}: {}",
                final_url, e
            )))
        })?;

        let body = if body_bytes.len() > self.max_body_size {
            String::from_utf8_lossy(&body_bytes[..self.max_body_size]).to_string()
        } else {
            String::from_utf8_lossy(&body_bytes).to_string()
        };

        Ok(HttpResponse {
            status_code,
            body,
            headers,
            duration_ms: started.elapsed().as_millis() as u64,
            final_url,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status_code: u16,
    pub body: String,
    /// Lowercased header names. Repeated `set-cookie` values are newline separated.
    pub headers: HashMap<String, String>,
    pub duration_ms: u64,
    /// URL after redirects
    pub final_url: String,
}

impl HttpResponse {
    pub fn contains(&self, pattern: &str) -> bool {
        self.body.contains(pattern)
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.headers.get(&name.to_lowercase()).cloned()
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

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}
