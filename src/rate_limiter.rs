// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Per-Scan Rate Limiter
 * Token bucket over a configurable interval with automatic backoff.
 * Every scan run owns its own limiter, so concurrent scans never
 * throttle each other.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use nonzero_ext::*;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::types::ScanConfig;

type DirectLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Requests allowed per `interval`
    pub requests: u32,

    pub interval: Duration,

    /// Floor for the backed-off rate (requests per interval)
    pub min_requests: u32,

    /// Backoff multiplier when rate limited
    pub backoff_multiplier: f64,

    /// Recovery multiplier when successful
    pub recovery_multiplier: f64,

    /// Consecutive successes before trying a faster rate
    pub recovery_after: u32,

    /// Extra pause for the task that hit a 429/503
    pub backoff_pause: Duration,

    /// Enable adaptive rate limiting
    pub adaptive: bool,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests: 10,
            interval: Duration::from_secs(1),
            min_requests: 1,
            backoff_multiplier: 0.5,
            recovery_multiplier: 1.1,
            recovery_after: 50,
            backoff_pause: Duration::from_secs(2),
            adaptive: true,
        }
    }
}

impl RateLimiterConfig {
    /// Limiter settings for one scan run
    pub fn for_scan(config: &ScanConfig) -> Self {
        Self {
            requests: config.rate_limit.max(1),
            interval: Duration::from_millis(config.rate_limit_interval_ms.max(1)),
            ..Default::default()
        }
    }
}

struct LimiterState {
    current_requests: u32,
    limiter: Arc<DirectLimiter>,
    success_count: u32,
    rate_limit_count: u32,
}

fn build_limiter(requests: u32, interval: Duration) -> Arc<DirectLimiter> {
    let burst = NonZeroU32::new(requests).unwrap_or(nonzero!(1u32));
    let period = interval / burst.get();
    let quota = Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst);
    Arc::new(GovernorRateLimiter::direct(quota))
}

/// Adaptive token-bucket limiter for a single scan
pub struct ScanRateLimiter {
    config: RateLimiterConfig,
    state: RwLock<LimiterState>,
}

impl ScanRateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        let requests = config.requests.max(1);
        debug!(
            "Initialized scan rate limiter: {} req per {:?}, adaptive={}",
            requests, config.interval, config.adaptive
        );

        Self {
            state: RwLock::new(LimiterState {
                current_requests: requests,
                limiter: build_limiter(requests, config.interval),
                success_count: 0,
                rate_limit_count: 0,
            }),
            config,
        }
    }

    /// Wait until the next request is allowed
    pub async fn wait_for_slot(&self) {
        let limiter = Arc::clone(&self.state.read().await.limiter);
        limiter.until_ready().await;
    }

    /// Record successful request (may increase the rate again)
    pub async fn record_success(&self) {
        if !self.config.adaptive {
            return;
        }

        let mut state = self.state.write().await;
        if state.current_requests >= self.config.requests {
            return;
        }

        state.success_count += 1;
        if state.success_count >= self.config.recovery_after {
            let raised = ((state.current_requests as f64 * self.config.recovery_multiplier).ceil()
                as u32)
                .min(self.config.requests);

            if raised > state.current_requests {
                info!(
                    "[RateLimit] Recovering: {} -> {} req per {:?}",
                    state.current_requests, raised, self.config.interval
                );
                state.current_requests = raised;
                state.limiter = build_limiter(raised, self.config.interval);
            }
            state.success_count = 0;
        }
    }

    /// Record a 429/503 from the target; slows the whole scan down
    pub async fn record_rate_limit(&self, status_code: u16) {
        {
            let mut state = self.state.write().await;
            state.rate_limit_count += 1;
            state.success_count = 0;

            if self.config.adaptive {
                let lowered = ((state.current_requests as f64 * self.config.backoff_multiplier)
                    as u32)
                    .max(self.config.min_requests.max(1));

                if lowered < state.current_requests {
                    warn!(
                        "[WARNING]  Rate limited by target (HTTP {}): {} -> {} req per {:?}",
                        status_code, state.current_requests, lowered, self.config.interval
                    );
                    state.current_requests = lowered;
                    state.limiter = build_limiter(lowered, self.config.interval);
                }
            }
        }

        if !self.config.backoff_pause.is_zero() {
            tokio::time::sleep(self.config.backoff_pause).await;
        }
    }

    /// Current allowance (requests per interval)
    pub async fn current_rate(&self) -> u32 {
        self.state.read().await.current_requests
    }

    pub async fn rate_limit_count(&self) -> u32 {
        self.state.read().await.rate_limit_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn config(requests: u32, interval_ms: u64) -> RateLimiterConfig {
        RateLimiterConfig {
            requests,
            interval: Duration::from_millis(interval_ms),
            backoff_pause: Duration::ZERO,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_burst_is_immediate() {
        let limiter = ScanRateLimiter::new(config(5, 1000));
        let start = Instant::now();
        for _ in 0..5 {
            limiter.wait_for_slot().await;
        }
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_requests_beyond_burst_wait() {
        let limiter = ScanRateLimiter::new(config(2, 400));
        let start = Instant::now();
        for _ in 0..3 {
            limiter.wait_for_slot().await;
        }
        // Third request needs one replenished cell (400ms / 2)
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_adaptive_backoff() {
        let limiter = ScanRateLimiter::new(config(20, 1000));
        limiter.record_rate_limit(429).await;
        assert_eq!(limiter.current_rate().await, 10);
        assert_eq!(limiter.rate_limit_count().await, 1);
    }

    #[tokio::test]
    async fn test_backoff_respects_floor() {
        let limiter = ScanRateLimiter::new(RateLimiterConfig {
            min_requests: 4,
            ..config(5, 1000)
        });
        limiter.record_rate_limit(503).await;
        limiter.record_rate_limit(503).await;
        assert_eq!(limiter.current_rate().await, 4);
    }

    #[tokio::test]
    async fn test_recovery_capped_at_configured_rate() {
        let limiter = ScanRateLimiter::new(RateLimiterConfig {
            recovery_after: 3,
            recovery_multiplier: 2.0,
            ..config(8, 1000)
        });
        limiter.record_rate_limit(429).await;
        assert_eq!(limiter.current_rate().await, 4);

        for _ in 0..3 {
            limiter.record_success().await;
        }
        assert_eq!(limiter.current_rate().await, 8);

        for _ in 0..10 {
            limiter.record_success().await;
        }
        assert_eq!(limiter.current_rate().await, 8);
    }

    #[test]
    fn test_config_from_scan() {
        let scan = ScanConfig {
            rate_limit: 0,
            rate_limit_interval_ms: 500,
            ..ScanConfig::default()
        };
        let config = RateLimiterConfig::for_scan(&scan);
        assert_eq!(config.requests, 1);
        assert_eq!(config.interval, Duration::from_millis(500));
    }
}
