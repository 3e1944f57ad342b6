//! Poll scheduling as a pure state machine.
//!
//! Time comes in as arguments and decisions come out as values, so the
//! policy is testable without a clock or a runtime.
//!
//! # Invariants
//!
//! - At most one fetch is in flight; a tick that lands mid-fetch is
//!   coalesced into the next window rather than stacking requests.
//! - The watermark advances only when a fetch settles successfully, so a
//!   failed window is covered again by the next diff.
//! - Every Nth completed tick fetches a full snapshot instead of a diff;
//!   after too many consecutive failures the next fetch is forced full.
//! - A demanded full fetch ([`PollSchedule::demand_full`]) preempts the
//!   diff cadence until a full fetch settles.

use chrono::{DateTime, Duration, Utc};
use tacks_core::BoardConfig;

/// What the next fetch should ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPlan {
    /// A complete snapshot of the board's scope.
    Full,
    /// Changes in the window `(from, to]`.
    Diff {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle { next_due: DateTime<Utc> },
    Fetching { to: DateTime<Utc>, full: bool },
}

/// Decides when to fetch and what kind of fetch to issue.
#[derive(Debug, Clone)]
pub struct PollSchedule {
    interval: Duration,
    full_refresh_after: u32,
    max_missed_windows: u32,
    state: State,
    watermark: Option<DateTime<Utc>>,
    completed: u32,
    missed: u32,
    full_demanded: bool,
}

impl PollSchedule {
    /// A schedule whose first tick is due immediately.
    #[must_use]
    pub fn new(config: &BoardConfig, now: DateTime<Utc>) -> Self {
        let secs = i64::try_from(config.poll_interval_secs).unwrap_or(i64::MAX);
        Self {
            interval: Duration::try_seconds(secs).unwrap_or(Duration::MAX),
            full_refresh_after: config.full_refresh_after,
            max_missed_windows: config.max_missed_windows,
            state: State::Idle { next_due: now },
            watermark: None,
            completed: 0,
            missed: 0,
            full_demanded: false,
        }
    }

    /// Make the next planned fetch a full snapshot, regardless of cadence.
    /// The demand holds until a full fetch settles, so a failed snapshot is
    /// retried on the very next tick instead of resuming diffs.
    pub const fn demand_full(&mut self) {
        self.full_demanded = true;
    }

    /// Last successfully covered instant; `None` before the first fetch.
    #[must_use]
    pub const fn watermark(&self) -> Option<DateTime<Utc>> {
        self.watermark
    }

    #[must_use]
    pub const fn is_fetching(&self) -> bool {
        matches!(self.state, State::Fetching { .. })
    }

    /// Time until the next tick is due. Zero when overdue or mid-fetch.
    #[must_use]
    pub fn due_in(&self, now: DateTime<Utc>) -> Duration {
        match self.state {
            State::Idle { next_due } => (next_due - now).max(Duration::zero()),
            State::Fetching { .. } => Duration::zero(),
        }
    }

    /// Plan the next fetch. `None` while nothing is due or a fetch is
    /// already in flight.
    pub fn plan_tick(&mut self, now: DateTime<Utc>) -> Option<FetchPlan> {
        let State::Idle { next_due } = self.state else {
            return None;
        };
        if now < next_due {
            return None;
        }

        let cycle_full = self
            .completed
            .checked_rem(self.full_refresh_after)
            .is_none_or(|phase| phase == 0);
        let diff_ok = !self.full_demanded && !cycle_full && self.missed < self.max_missed_windows;
        let plan = match self.watermark {
            Some(from) if diff_ok => FetchPlan::Diff { from, to: now },
            _ => FetchPlan::Full,
        };
        self.state = State::Fetching {
            to: now,
            full: matches!(plan, FetchPlan::Full),
        };
        Some(plan)
    }

    /// The in-flight fetch settled successfully: advance the watermark to
    /// the window end and schedule the next tick from `now`.
    pub fn complete(&mut self, now: DateTime<Utc>) {
        if let State::Fetching { to, full } = self.state {
            self.watermark = Some(to);
            if full {
                self.full_demanded = false;
            }
        }
        self.completed = self.completed.wrapping_add(1);
        self.missed = 0;
        self.idle_after(now);
    }

    /// The in-flight fetch failed. The watermark stays put so the failed
    /// window is covered again; repeated failures push toward a forced full
    /// refresh.
    pub fn fail(&mut self, now: DateTime<Utc>) {
        self.missed = self.missed.saturating_add(1);
        self.idle_after(now);
    }

    /// A manual full refresh settled outside the tick cadence. It covers
    /// everything up to `now` and counts as a completed tick, pushing the
    /// next scheduled one out by a full interval.
    pub fn note_manual_refresh(&mut self, now: DateTime<Utc>) {
        self.watermark = Some(now);
        self.completed = self.completed.wrapping_add(1);
        self.missed = 0;
        self.full_demanded = false;
        self.idle_after(now);
    }

    fn idle_after(&mut self, now: DateTime<Utc>) {
        self.state = State::Idle {
            next_due: now.checked_add_signed(self.interval).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
    }
}
