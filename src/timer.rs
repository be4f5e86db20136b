//! Timer state machine used for GitLab issue time tracking.

use crate::bridge::Issue;
use crate::format::rounded_seconds;
use serde::{Deserialize, Serialize};

/// Persisted timer record: whether tracking is active, for which issue and since when
/// (unix millis).
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub is_running: bool,
    pub issue: Option<Issue>,
    pub start_time: Option<i64>,
}

impl TimerState {
    /// Whole seconds elapsed at `now`, zero when idle.
    pub fn elapsed_secs(&self, now: i64) -> u64 {
        match (self.is_running, self.start_time) {
            (true, Some(start)) => rounded_seconds(now - start),
            _ => 0,
        }
    }
}

/// Source of wall-clock time in unix milliseconds.
pub trait Clock: Send + Sync + 'static {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A timer taken off the clock by `stop`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoppedTimer {
    pub issue: Issue,
    pub elapsed: u64,
}

/// Owned timer runtime. Exactly one lives inside the coordinator.
#[derive(Debug, Default)]
pub struct Timer {
    state: TimerState,
}

impl Timer {
    /// Creates a new idle timer instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopts a previously persisted state. Inconsistent records restore as idle.
    pub fn restore(state: TimerState) -> Self {
        let consistent = state.is_running && state.issue.is_some() && state.start_time.is_some();
        if consistent {
            Self { state }
        } else {
            Self::new()
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    /// Starts tracking `issue` from `now`. Callers stop any running timer first.
    pub fn start(&mut self, issue: Issue, now: i64) {
        self.state = TimerState {
            is_running: true,
            issue: Some(issue),
            start_time: Some(now),
        };
    }

    /// Stops the timer and returns what was tracked, or `None` when idle.
    pub fn stop(&mut self, now: i64) -> Option<StoppedTimer> {
        if !self.state.is_running {
            return None;
        }
        let elapsed = self.state.elapsed_secs(now);
        let state = std::mem::take(&mut self.state);
        state.issue.map(|issue| StoppedTimer { issue, elapsed })
    }

    /// Discards the running timer without reporting elapsed time.
    pub fn cancel(&mut self) -> Option<Issue> {
        if !self.state.is_running {
            return None;
        }
        std::mem::take(&mut self.state).issue
    }
}
