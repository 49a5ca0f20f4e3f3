// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Authoritative status / progress model for one scan run.
//!
//! Success path: `pending -> queued -> scanning -> processing -> completed`.
//! `failed` is reachable from every non-terminal state. Once terminal,
//! nothing about the scan changes again.

use crate::errors::StateError;
use crate::types::{Scan, ScanStatus, ScanStatusUpdate};

/// Highest progress a run may report before it completes
pub const MAX_RUNNING_PROGRESS: u8 = 99;

#[derive(Debug, Clone)]
pub struct ScanStateMachine {
    status: ScanStatus,
    progress: u8,
    current_action: String,
}

impl ScanStateMachine {
    pub fn new() -> Self {
        Self {
            status: ScanStatus::Pending,
            progress: 0,
            current_action: "Pending".to_string(),
        }
    }

    /// Resume from a persisted scan record
    pub fn from_scan(scan: &Scan) -> Self {
        Self {
            status: scan.status,
            progress: scan.progress.min(100),
            current_action: scan.current_action.clone(),
        }
    }

    pub fn status(&self) -> ScanStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn current_action(&self) -> &str {
        &self.current_action
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn ensure_mutable(&self) -> Result<(), StateError> {
        if self.status.is_terminal() {
            return Err(StateError::Terminal { status: self.status });
        }
        Ok(())
    }

    /// Move forward along the success path. Skipping phases is allowed,
    /// moving backwards or re-entering the current phase is not.
    pub fn transition(
        &mut self,
        to: ScanStatus,
        action: &str,
    ) -> Result<ScanStatusUpdate, StateError> {
        self.ensure_mutable()?;

        match to {
            ScanStatus::Failed => return self.fail(action),
            ScanStatus::Completed => return self.complete(action),
            _ => {}
        }

        if to.rank() <= self.status.rank() {
            return Err(StateError::InvalidTransition {
                from: self.status,
                to,
            });
        }

        self.status = to;
        self.current_action = action.to_string();

        Ok(ScanStatusUpdate {
            status: Some(to),
            progress: None,
            current_action: Some(self.current_action.clone()),
            node: None,
        })
    }

    /// Record progress. Values are clamped to [current, 99]; a value that
    /// would not move progress forward yields `Ok(None)`.
    pub fn set_progress(&mut self, progress: u8) -> Result<Option<ScanStatusUpdate>, StateError> {
        self.ensure_mutable()?;

        let clamped = progress.min(MAX_RUNNING_PROGRESS);
        if clamped <= self.progress {
            return Ok(None);
        }

        self.progress = clamped;
        Ok(Some(ScanStatusUpdate {
            progress: Some(clamped),
            ..Default::default()
        }))
    }

    pub fn set_action(&mut self, action: &str) -> Result<ScanStatusUpdate, StateError> {
        self.ensure_mutable()?;

        self.current_action = action.to_string();
        Ok(ScanStatusUpdate {
            current_action: Some(self.current_action.clone()),
            ..Default::default()
        })
    }

    /// Progress and action in one update. Progress never moves backwards.
    pub fn update(&mut self, progress: u8, action: &str) -> Result<ScanStatusUpdate, StateError> {
        let progress_update = self.set_progress(progress)?;
        let mut update = self.set_action(action)?;
        update.progress = progress_update.and_then(|u| u.progress);
        Ok(update)
    }

    pub fn complete(&mut self, action: &str) -> Result<ScanStatusUpdate, StateError> {
        self.ensure_mutable()?;

        self.status = ScanStatus::Completed;
        self.progress = 100;
        self.current_action = action.to_string();

        Ok(ScanStatusUpdate {
            status: Some(ScanStatus::Completed),
            progress: Some(100),
            current_action: Some(self.current_action.clone()),
            node: None,
        })
    }

    /// Fail the run, keeping whatever progress was reached
    pub fn fail(&mut self, reason: &str) -> Result<ScanStatusUpdate, StateError> {
        self.ensure_mutable()?;

        self.status = ScanStatus::Failed;
        self.current_action = format!("Failed: {}", reason);

        Ok(ScanStatusUpdate {
            status: Some(ScanStatus::Failed),
            progress: None,
            current_action: Some(self.current_action.clone()),
            node: None,
        })
    }
}

impl Default for ScanStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_path() {
        let mut sm = ScanStateMachine::new();
        sm.transition(ScanStatus::Queued, "Queued").unwrap();
        sm.transition(ScanStatus::Scanning, "Crawling").unwrap();
        sm.set_progress(40).unwrap();
        sm.transition(ScanStatus::Processing, "Aggregating results").unwrap();
        let update = sm.complete("Completed").unwrap();

        assert_eq!(update.progress, Some(100));
        assert_eq!(sm.status(), ScanStatus::Completed);
        assert_eq!(sm.progress(), 100);
    }

    #[test]
    fn test_backwards_transition_rejected() {
        let mut sm = ScanStateMachine::new();
        sm.transition(ScanStatus::Scanning, "Crawling").unwrap();

        let err = sm.transition(ScanStatus::Queued, "Queued").unwrap_err();
        assert_eq!(
            err,
            StateError::InvalidTransition {
                from: ScanStatus::Scanning,
                to: ScanStatus::Queued
            }
        );

        assert!(sm.transition(ScanStatus::Scanning, "again").is_err());
    }

    #[test]
    fn test_terminal_is_immutable() {
        let mut sm = ScanStateMachine::new();
        sm.transition(ScanStatus::Scanning, "Crawling").unwrap();
        sm.fail("target unreachable").unwrap();

        assert!(matches!(sm.set_progress(50), Err(StateError::Terminal { .. })));
        assert!(sm.set_action("Crawling").is_err());
        assert!(sm.complete("Completed").is_err());
        assert!(sm.fail("again").is_err());
        assert_eq!(sm.current_action(), "Failed: target unreachable");
    }

    #[test]
    fn test_progress_monotonic_and_capped() {
        let mut sm = ScanStateMachine::new();
        sm.transition(ScanStatus::Scanning, "Crawling").unwrap();

        assert!(sm.set_progress(30).unwrap().is_some());
        assert!(sm.set_progress(10).unwrap().is_none());
        assert_eq!(sm.progress(), 30);

        sm.set_progress(250).unwrap();
        assert_eq!(sm.progress(), MAX_RUNNING_PROGRESS);
    }

    #[test]
    fn test_update_keeps_progress_when_lower() {
        let mut sm = ScanStateMachine::new();
        sm.transition(ScanStatus::Scanning, "Crawling").unwrap();
        sm.set_progress(60).unwrap();

        let update = sm.update(20, "Analyzing /about").unwrap();
        assert_eq!(update.progress, None);
        assert_eq!(update.current_action.as_deref(), Some("Analyzing /about"));
        assert_eq!(sm.progress(), 60);
    }

    #[test]
    fn test_failed_from_pending() {
        let mut sm = ScanStateMachine::new();
        let update = sm.transition(ScanStatus::Failed, "invalid target").unwrap();
        assert_eq!(update.status, Some(ScanStatus::Failed));
        assert!(sm.is_terminal());
    }
}
