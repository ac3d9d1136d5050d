//! Reading-session state machine
//!
//! Every external trigger - viewer lifecycle, focus, visibility, user
//! activity, the periodic tick - funnels through [`SessionTracker::apply`],
//! which enforces the start/end guards centrally and returns the flush
//! effects the caller must execute against the persistence store.

use std::time::{Duration, Instant};

use log::debug;

use super::progress::{ProgressTotals, ProgressUpdate};

/// Session ends after this long without qualifying user activity
pub const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Activity-driven timer resets are coalesced to at most one per window
pub const ACTIVITY_DEBOUNCE: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Inactive,
    Active,
    /// Transient guard while an end transition flushes; serializes
    /// concurrent start/end requests and is never left set between calls.
    Ending,
}

/// External triggers driving the session state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionTrigger {
    /// Viewer opened, persisted progress already seeded
    Open,
    FocusGained,
    FocusLost,
    BecameVisible,
    BecameHidden,
    /// Viewer is closing
    Close,
    /// Qualifying user activity: pointer, keyboard, scroll, touch
    Activity,
    /// Current page changed to the given page (1-based)
    PageChanged(usize),
    /// Periodic tick, expected at roughly 1 s granularity
    Tick,
}

/// Effects the caller must execute after a transition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEffect {
    /// Push accumulated totals to the persistence store
    Flush(ProgressUpdate),
}

/// Read-only view of the tracker for telemetry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub totals: ProgressTotals,
    /// Seconds accumulated in the current session
    pub session_seconds: u64,
}

/// Tracks one reading session per open viewer
#[derive(Debug)]
pub struct SessionTracker {
    status: SessionStatus,
    /// False when no credential is available; every trigger is then a no-op
    enabled: bool,
    totals: ProgressTotals,
    last_recorded_page: usize,
    session_seconds: u64,
    inactivity_timeout: Duration,
    checkpoint_interval: Option<Duration>,
    last_checkpoint: Option<Instant>,
    last_activity: Option<Instant>,
    last_flush: Option<Instant>,
}

impl SessionTracker {
    /// Tracker seeded from persisted totals. `enabled` is false when no
    /// bearer credential exists, making the whole tracker inert.
    #[must_use]
    pub fn new(seed: ProgressTotals, enabled: bool) -> Self {
        Self {
            status: SessionStatus::Inactive,
            enabled,
            totals: seed,
            last_recorded_page: seed.current_page,
            session_seconds: 0,
            inactivity_timeout: INACTIVITY_TIMEOUT,
            checkpoint_interval: None,
            last_checkpoint: None,
            last_activity: None,
            last_flush: None,
        }
    }

    #[must_use]
    pub fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    /// Enable periodic mid-session flushes on top of start/end
    #[must_use]
    pub fn with_checkpoint_interval(mut self, interval: Option<Duration>) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    #[must_use]
    pub fn totals(&self) -> ProgressTotals {
        self.totals
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            totals: self.totals,
            session_seconds: self.session_seconds,
        }
    }

    /// Single entry point for all session triggers
    pub fn apply(&mut self, trigger: SessionTrigger, now: Instant) -> Vec<SessionEffect> {
        if !self.enabled {
            return vec![];
        }

        match trigger {
            SessionTrigger::Open | SessionTrigger::FocusGained | SessionTrigger::BecameVisible => {
                self.start(now)
            }

            SessionTrigger::FocusLost | SessionTrigger::BecameHidden | SessionTrigger::Close => {
                self.end(now)
            }

            SessionTrigger::Activity => {
                self.record_activity(now);
                vec![]
            }

            SessionTrigger::PageChanged(page) => {
                self.record_page(page);
                vec![]
            }

            SessionTrigger::Tick => self.tick(now),
        }
    }

    fn start(&mut self, now: Instant) -> Vec<SessionEffect> {
        if self.status != SessionStatus::Inactive {
            return vec![];
        }

        debug!("session start at page {}", self.totals.current_page);
        self.status = SessionStatus::Active;
        self.session_seconds = 0;
        self.last_checkpoint = Some(now);
        self.last_activity = Some(now);
        self.last_flush = Some(now);

        vec![SessionEffect::Flush(ProgressUpdate::from_totals(
            &self.totals,
            true,
        ))]
    }

    fn end(&mut self, now: Instant) -> Vec<SessionEffect> {
        if self.status != SessionStatus::Active {
            return vec![];
        }

        self.status = SessionStatus::Ending;
        self.fold_elapsed(now);
        debug!(
            "session end: {}s this session, {}s total",
            self.session_seconds, self.totals.total_reading_time
        );

        self.last_checkpoint = None;
        self.last_activity = None;
        self.last_flush = None;
        self.status = SessionStatus::Inactive;

        vec![SessionEffect::Flush(ProgressUpdate::from_totals(
            &self.totals,
            false,
        ))]
    }

    fn tick(&mut self, now: Instant) -> Vec<SessionEffect> {
        if self.status != SessionStatus::Active {
            return vec![];
        }

        self.fold_elapsed(now);

        if let Some(last_activity) = self.last_activity {
            if now.duration_since(last_activity) >= self.inactivity_timeout {
                debug!("inactivity timeout, ending session");
                return self.end(now);
            }
        }

        if let (Some(interval), Some(last_flush)) = (self.checkpoint_interval, self.last_flush) {
            if now.duration_since(last_flush) >= interval {
                self.last_flush = Some(now);
                return vec![SessionEffect::Flush(ProgressUpdate::from_totals(
                    &self.totals,
                    false,
                ))];
            }
        }

        vec![]
    }

    /// Fold whole elapsed seconds since the last checkpoint into the totals
    /// and advance the checkpoint by exactly the seconds consumed, so
    /// fractional remainders carry over instead of being dropped.
    fn fold_elapsed(&mut self, now: Instant) {
        let Some(checkpoint) = self.last_checkpoint else {
            return;
        };

        let whole = now.duration_since(checkpoint).as_secs();
        if whole > 0 {
            self.totals.total_reading_time += whole;
            self.session_seconds += whole;
            self.last_checkpoint = Some(checkpoint + Duration::from_secs(whole));
        }
    }

    fn record_activity(&mut self, now: Instant) {
        if self.status != SessionStatus::Active {
            return;
        }

        if let Some(last) = self.last_activity {
            if now.duration_since(last) < ACTIVITY_DEBOUNCE {
                return;
            }
        }
        self.last_activity = Some(now);
    }

    /// A pages-read increment is recorded only for strictly forward
    /// navigation; backward or lateral moves just update the recorded page.
    fn record_page(&mut self, page: usize) {
        if page > self.last_recorded_page && self.status == SessionStatus::Active {
            self.totals.total_pages_read += 1;
        }
        self.last_recorded_page = page;
        self.totals.current_page = page;
    }
}
