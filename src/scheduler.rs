//! Refresh Scheduler.
//!
//! Pure timing: coalesces bursts of edit notifications into one refresh.
//! The caller passes the current [`Instant`] in and sleeps until
//! [`RefreshScheduler::deadline`]; nothing here reads the clock.
//!
//! ```text
//! edit  edit  edit         (quiet for `window`)
//!   |-----|-----|-----------------------------> RefreshDue::Debounced
//!
//! edit  edit  run
//!   |-----|-----| -> RefreshDue::Requested (pending timer cancelled)
//! ```

use std::time::{Duration, Instant};

/// Sleep used when nothing is pending.
const IDLE_SLEEP: Duration = Duration::from_secs(86400);

/// Why a refresh fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshDue {
    /// The debounce window elapsed after `edits` coalesced notifications.
    Debounced { edits: usize },
    /// Explicit run request.
    Requested,
}

#[derive(Debug)]
pub struct RefreshScheduler {
    window: Duration,
    /// When the pending refresh fires, if any.
    deadline: Option<Instant>,
    /// Edits coalesced into the pending refresh.
    edits: usize,
}

impl RefreshScheduler {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
            edits: 0,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record an edit; restarts the debounce window.
    pub fn notify_edit(&mut self, now: Instant) {
        self.edits += 1;
        self.deadline = Some(now + self.window);
    }

    /// Cancel any pending debounce and fire now.
    pub fn request_run(&mut self) -> RefreshDue {
        if self.deadline.take().is_some() {
            crate::debug!("scheduler"; "run requested, {} pending edit(s) folded in", self.edits);
        }
        self.edits = 0;
        RefreshDue::Requested
    }

    /// Fire the pending refresh if its window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<RefreshDue> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        self.deadline = None;
        let edits = std::mem::take(&mut self.edits);
        Some(RefreshDue::Debounced { edits })
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time to sleep before the next [`poll`](Self::poll) can fire.
    pub fn sleep_duration(&self, now: Instant) -> Duration {
        match self.deadline {
            Some(deadline) => deadline.saturating_duration_since(now),
            None => IDLE_SLEEP,
        }
    }
}
