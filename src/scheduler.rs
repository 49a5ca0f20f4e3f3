// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Recurring Scan Scheduler
 * Periodic tick that turns due templates into child scans
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use cron::Schedule;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::{ScannerError, ScannerResult};
use crate::metrics::MetricsCollector;
use crate::scan_state::ScanStateMachine;
use crate::store::ScanStore;
use crate::types::{LogLevel, NewScan, Scan};

/// Used when a template has no usable cron expression
pub const DEFAULT_RECURRENCE_HOURS: i64 = 24;

fn default_recurrence() -> ChronoDuration {
    ChronoDuration::hours(DEFAULT_RECURRENCE_HOURS)
}

/// Hands a freshly created scan to whatever executes it.
///
/// Implementations must not wait for the scan to finish.
#[async_trait]
pub trait ScanLauncher: Send + Sync {
    async fn launch(&self, scan: Scan) -> ScannerResult<()>;
}

/// Result of one scheduler tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another tick was still running
    Skipped,
    /// Due templates were processed; `launched` children were started
    Completed { launched: usize },
    /// The due-template query failed
    Aborted,
}

/// Clears the in-flight flag when the tick ends, however it ends
struct TickGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> TickGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct SchedulerService {
    store: Arc<dyn ScanStore>,
    launcher: Arc<dyn ScanLauncher>,
    tick_interval: Duration,
    tick_in_flight: AtomicBool,
    metrics: Arc<MetricsCollector>,
}

impl SchedulerService {
    pub fn new(store: Arc<dyn ScanStore>, launcher: Arc<dyn ScanLauncher>, tick_interval: Duration) -> Self {
        Self {
            store,
            launcher,
            tick_interval,
            tick_in_flight: AtomicBool::new(false),
            metrics: Arc::new(MetricsCollector::default()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Tick on `tick_interval` until `shutdown` fires.
    ///
    /// Each tick runs on its own task so a slow tick never delays the timer;
    /// a tick that fires while the previous one is still running is skipped.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!("[Scheduler] Started with {}s tick interval", self.tick_interval.as_secs());

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    while ticks.try_join_next().is_some() {}

                    let scheduler = Arc::clone(&self);
                    ticks.spawn(async move {
                        scheduler.tick(Utc::now()).await;
                    });
                }
            }
        }

        // Let an in-flight tick finish its current template bookkeeping
        while let Some(result) = ticks.join_next().await {
            if let Err(e) = result {
                error!("[Scheduler] Tick task panicked: {}", e);
            }
        }
        info!("[Scheduler] Stopped");
    }

    /// Run one tick at `now`
    pub async fn tick(&self, now: DateTime<Utc>) -> TickOutcome {
        let Some(_guard) = TickGuard::try_acquire(&self.tick_in_flight) else {
            warn!("[Scheduler] Previous tick still running, skipping this one");
            self.metrics.record_tick(true);
            return TickOutcome::Skipped;
        };
        self.metrics.record_tick(false);

        let templates = match self.store.list_due_templates(now).await {
            Ok(templates) => templates,
            Err(e) => {
                let e = ScannerError::SchedulerTick(e.to_string());
                error!("[Scheduler] {}", e);
                return TickOutcome::Aborted;
            }
        };

        if templates.is_empty() {
            debug!("[Scheduler] No due templates");
            return TickOutcome::Completed { launched: 0 };
        }

        info!("[Scheduler] {} template(s) due", templates.len());

        let mut launched = 0;
        for template in &templates {
            match self.run_template(template, now).await {
                Ok(()) => launched += 1,
                Err(e) => error!("[Scheduler] Template {} failed: {}", template.id, e),
            }
        }

        TickOutcome::Completed { launched }
    }

    /// Spawn one child of `template` and advance its schedule
    async fn run_template(&self, template: &Scan, now: DateTime<Utc>) -> ScannerResult<()> {
        let child = self.store.create_scan(NewScan::child_of(template)).await?;
        debug!("[Scheduler] Created child {} of template {}", child.id, template.id);

        let next = next_run(template.config.schedule_cron.as_deref(), now);
        let child_id = child.id;

        let launch_result = self.launcher.launch(child).await;
        if let Err(e) = &launch_result {
            self.abandon_child(child_id, e).await;
        }

        self.store.update_template_schedule(template.id, now, next).await?;
        info!(
            "[Scheduler] Template {} ran, next run at {}",
            template.id,
            next.to_rfc3339()
        );

        launch_result
    }

    /// A child that could not be launched would otherwise stay pending forever
    async fn abandon_child(&self, child_id: uuid::Uuid, cause: &ScannerError) {
        let message = format!("Scan launch failed: {}", cause);
        let update = match ScanStateMachine::new().fail(&message) {
            Ok(update) => update,
            Err(_) => return,
        };
        if let Err(e) = self.store.update_scan_status(child_id, update).await {
            warn!("[Scheduler] Could not mark child {} failed: {}", child_id, e);
            return;
        }
        if let Err(e) = self.store.append_log(child_id, LogLevel::Error, &message).await {
            warn!("[Scheduler] Could not log launch failure for {}: {}", child_id, e);
        }
    }
}

/// Next trigger strictly after `now`.
///
/// Accepts standard 5-field cron (minute hour day-of-month month day-of-week)
/// as well as 6/7-field expressions with seconds. Absent or unparsable
/// expressions fall back to `now + 24h`.
pub fn next_run(cron_expr: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(expr) = cron_expr.map(str::trim).filter(|e| !e.is_empty()) else {
        return now + default_recurrence();
    };

    match parse_schedule(expr) {
        Ok(schedule) => match schedule.after(&now).next() {
            Some(next) => next,
            None => {
                warn!("[Scheduler] Cron '{}' has no future trigger, using 24h default", expr);
                now + default_recurrence()
            }
        },
        Err(e) => {
            warn!("[Scheduler] Invalid cron '{}': {}, using 24h default", expr, e);
            now + default_recurrence()
        }
    }
}

fn parse_schedule(expr: &str) -> Result<Schedule, cron::error::Error> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() == 5 {
        let dow = unix_day_of_week(fields[4]);
        let expanded = format!("0 {} {} {} {} {}", fields[0], fields[1], fields[2], fields[3], dow);
        Schedule::from_str(&expanded)
    } else {
        Schedule::from_str(expr)
    }
}

/// Unix cron numbers days 0-7 from Sunday (both 0 and 7 are Sunday); the
/// `cron` crate numbers them 1-7 from Sunday. Names pass through unchanged.
fn unix_day_of_week(field: &str) -> String {
    fn shift(n: &str) -> Option<u8> {
        n.parse::<u8>().ok().filter(|d| *d <= 7).map(|d| d % 7 + 1)
    }

    field
        .split(',')
        .map(|part| {
            let (base, step) = match part.split_once('/') {
                Some((base, step)) => (base, Some(step)),
                None => (part, None),
            };
            let mapped = match base.split_once('-') {
                Some((from, "7")) => match shift(from) {
                    // 7 is Sunday, which is 1 here; split the wrapped range
                    Some(start) if start > 1 => format!("{}-7,1", start),
                    Some(_) => "1-7".to_string(),
                    None => base.to_string(),
                },
                Some((from, to)) => match (shift(from), shift(to)) {
                    (Some(a), Some(b)) => format!("{}-{}", a, b),
                    _ => base.to_string(),
                },
                None => shift(base).map(|d| d.to_string()).unwrap_or_else(|| base.to_string()),
            };
            match step {
                Some(step) => format!("{}/{}", mapped, step),
                None => mapped,
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike, Weekday};

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_five_field_cron() {
        let now = at(2026, 3, 10, 12, 30);
        let next = next_run(Some("0 3 * * *"), now);
        assert_eq!(next, at(2026, 3, 11, 3, 0));
    }

    #[test]
    fn test_six_field_cron() {
        let now = at(2026, 3, 10, 12, 30);
        let next = next_run(Some("0 */15 * * * *"), now);
        assert_eq!(next, at(2026, 3, 10, 12, 45));
    }

    #[test]
    fn test_strictly_after_now() {
        let now = at(2026, 3, 10, 3, 0);
        assert_eq!(next_run(Some("0 3 * * *"), now), at(2026, 3, 11, 3, 0));
    }

    #[test]
    fn test_day_of_week_uses_unix_numbering() {
        // 2026-03-10 is a Tuesday
        let now = at(2026, 3, 10, 12, 0);
        let monday = next_run(Some("0 9 * * 1"), now);
        assert_eq!(monday.weekday(), Weekday::Mon);
        assert_eq!(monday.hour(), 9);

        let sunday = next_run(Some("0 9 * * 0"), now);
        assert_eq!(sunday.weekday(), Weekday::Sun);
        assert_eq!(next_run(Some("0 9 * * 7"), now), sunday);
    }

    #[test]
    fn test_day_of_week_mapping() {
        assert_eq!(unix_day_of_week("*"), "*");
        assert_eq!(unix_day_of_week("1-5"), "2-6");
        assert_eq!(unix_day_of_week("0,6"), "1,7");
        assert_eq!(unix_day_of_week("5-7"), "6-7,1");
        assert_eq!(unix_day_of_week("MON-FRI"), "MON-FRI");
        assert_eq!(unix_day_of_week("*/2"), "*/2");
    }

    #[test]
    fn test_fallbacks() {
        let now = at(2026, 3, 10, 12, 0);
        assert_eq!(next_run(None, now), now + default_recurrence());
        assert_eq!(next_run(Some("  "), now), now + default_recurrence());
        assert_eq!(next_run(Some("every tuesday"), now), now + default_recurrence());
    }

    #[test]
    fn test_tick_guard_is_exclusive() {
        let flag = AtomicBool::new(false);
        let guard = TickGuard::try_acquire(&flag);
        assert!(guard.is_some());
        assert!(TickGuard::try_acquire(&flag).is_none());
        drop(guard);
        assert!(TickGuard::try_acquire(&flag).is_some());
    }
}
