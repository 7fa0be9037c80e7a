//! Countdown that drives a session from `Running` to `Ended`.
//!
//! The clock never sleeps or spawns anything itself. It asks a [`Scheduler`]
//! for one tick at a time and only accepts the tick it is waiting for, so a
//! timer left over from a reset session cannot touch the new one.

use std::time::Duration;

/// Delay between two countdown ticks.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum Phase {
    Initializing,
    Running,
    Ended,
}

/// Handle for one scheduled tick
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Host-provided timer service
pub trait Scheduler {
    /// Arrange for `id` to be delivered back after `delay`.
    fn schedule(&mut self, delay: Duration) -> TimerId;
    /// Drop a pending timer. Unknown ids are ignored.
    fn cancel(&mut self, id: TimerId);
}

/// What a delivered timer did to the clock
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockEvent {
    /// Not the pending timer, or the clock is not running
    Stale,
    Ticked { remaining: u32 },
    Expired,
}

#[derive(Debug, Clone)]
pub struct GameClock {
    session_secs: u32,
    remaining: u32,
    phase: Phase,
    pending: Option<TimerId>,
}

impl GameClock {
    pub fn new(session_secs: u32) -> Self {
        Self {
            session_secs,
            remaining: session_secs,
            phase: Phase::Initializing,
            pending: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn session_secs(&self) -> u32 {
        self.session_secs
    }

    pub fn pending(&self) -> Option<TimerId> {
        self.pending
    }

    /// Back to `Initializing` with a full countdown, cancelling any pending tick.
    pub fn reset<S: Scheduler + ?Sized>(&mut self, scheduler: &mut S) {
        if let Some(id) = self.pending.take() {
            scheduler.cancel(id);
        }
        self.remaining = self.session_secs;
        self.phase = Phase::Initializing;
    }

    /// `Initializing -> Running`. A zero-length session ends immediately.
    pub fn start(&mut self) -> ClockEvent {
        if self.phase != Phase::Initializing {
            return ClockEvent::Stale;
        }
        if self.remaining == 0 {
            self.phase = Phase::Ended;
            return ClockEvent::Expired;
        }
        self.phase = Phase::Running;
        ClockEvent::Ticked {
            remaining: self.remaining,
        }
    }

    /// Schedule the next tick if running, none is pending and the gate is open.
    ///
    /// Returns true when a tick was scheduled.
    pub fn arm<S: Scheduler + ?Sized>(&mut self, scheduler: &mut S, gate_open: bool) -> bool {
        if self.phase != Phase::Running || self.pending.is_some() || !gate_open {
            return false;
        }
        self.pending = Some(scheduler.schedule(TICK_INTERVAL));
        true
    }

    /// Consume a delivered timer. Only the pending id counts.
    pub fn fire(&mut self, id: TimerId) -> ClockEvent {
        if self.pending != Some(id) {
            return ClockEvent::Stale;
        }
        self.pending = None;
        self.tick()
    }

    /// Count down one second regardless of scheduling.
    pub fn tick(&mut self) -> ClockEvent {
        if self.phase != Phase::Running {
            return ClockEvent::Stale;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.phase = Phase::Ended;
            ClockEvent::Expired
        } else {
            ClockEvent::Ticked {
                remaining: self.remaining,
            }
        }
    }

    /// Drop the pending tick without changing phase (teardown).
    pub fn cancel<S: Scheduler + ?Sized>(&mut self, scheduler: &mut S) {
        if let Some(id) = self.pending.take() {
            scheduler.cancel(id);
        }
    }
}

/// Scheduler that only records requests; the caller fires timers by hand.
#[derive(Debug, Default, Clone)]
pub struct ManualScheduler {
    next_id: u64,
    scheduled: Vec<TimerId>,
    cancelled: Vec<TimerId>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent timer that was scheduled and not cancelled
    pub fn last_pending(&self) -> Option<TimerId> {
        self.scheduled
            .iter()
            .rev()
            .find(|id| !self.cancelled.contains(id))
            .copied()
    }

    pub fn scheduled(&self) -> &[TimerId] {
        &self.scheduled
    }

    pub fn cancelled(&self) -> &[TimerId] {
        &self.cancelled
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, _delay: Duration) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.scheduled.push(id);
        id
    }

    fn cancel(&mut self, id: TimerId) {
        self.cancelled.push(id);
    }
}
