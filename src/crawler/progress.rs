//! Live progress of a crawl run
//!
//! The orchestrator is the only writer; observers read clones through
//! [`ProgressHandle::snapshot`].

use crate::state::CrawlState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Number of recent errors kept for status observers
pub const RECENT_ERROR_CAPACITY: usize = 10;

/// Snapshot of one crawl run's progress
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlProgress {
    pub state: CrawlState,
    pub is_running: bool,
    /// Records successfully merged into the store
    pub processed_count: u64,
    pub current_source: Option<String>,
    /// Unit of work in flight, set before the work begins
    pub current_unit: Option<String>,
    /// Best-effort estimate, revised upward as discovery proceeds
    pub total_units: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Most recent failures, oldest first
    pub recent_errors: VecDeque<String>,
}

impl CrawlProgress {
    /// A fresh progress for a run that starts now
    pub fn started() -> Self {
        Self {
            state: CrawlState::Running,
            is_running: true,
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Appends an error, evicting the oldest beyond capacity
    pub fn push_error(&mut self, message: impl Into<String>) {
        if self.recent_errors.len() == RECENT_ERROR_CAPACITY {
            self.recent_errors.pop_front();
        }
        self.recent_errors.push_back(message.into());
    }
}

/// Shared, cloneable handle to a run's progress
#[derive(Debug, Clone, Default)]
pub struct ProgressHandle(Arc<RwLock<CrawlProgress>>);

impl ProgressHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current progress
    pub fn snapshot(&self) -> CrawlProgress {
        self.read().clone()
    }

    /// Replaces the progress with a fresh running instance
    pub fn reset(&self) {
        *self.write() = CrawlProgress::started();
    }

    /// Applies `f` under the write lock
    pub fn update<F: FnOnce(&mut CrawlProgress)>(&self, f: F) {
        f(&mut self.write());
    }

    pub fn set_source(&self, source_id: &str) {
        self.update(|p| {
            p.current_source = Some(source_id.to_string());
            p.current_unit = None;
        });
    }

    pub fn set_current_unit(&self, unit: impl Into<String>) {
        let unit = unit.into();
        self.update(|p| p.current_unit = Some(unit));
    }

    /// Adds newly discovered units to the estimate
    pub fn add_units(&self, count: usize) {
        self.update(|p| p.total_units += count as u64);
    }

    pub fn record_processed(&self) {
        self.update(|p| p.processed_count += 1);
    }

    pub fn push_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|p| p.push_error(message));
    }

    /// Moves to a terminal state and clears the running flag
    ///
    /// Transitions the state machine does not allow are ignored, but the
    /// running flag is cleared regardless.
    pub fn finish(&self, state: CrawlState) {
        self.update(|p| {
            if p.state.can_transition_to(state) {
                p.state = state;
            }
            p.is_running = false;
            p.finished_at = Some(Utc::now());
        });
    }

    pub fn state(&self) -> CrawlState {
        self.read().state
    }

    // A panic while holding the lock leaves plain data behind, so the
    // poisoned guard is still usable.
    fn read(&self) -> RwLockReadGuard<'_, CrawlProgress> {
        self.0.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CrawlProgress> {
        self.0.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
