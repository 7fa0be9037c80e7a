use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent, MouseEvent};

use crate::clock::{Scheduler, TimerId};

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum GameEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
    Timer(TimerId),
}

/// Source of terminal events (keyboard, mouse, resize)
pub trait GameEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<GameEvent, RecvTimeoutError>;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    rx: Receiver<GameEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let evt = match event::read() {
                Ok(CtEvent::Key(key)) => GameEvent::Key(key),
                Ok(CtEvent::Mouse(mouse)) => GameEvent::Mouse(mouse),
                Ok(CtEvent::Resize(w, h)) => GameEvent::Resize(w, h),
                Ok(_) => continue,
                Err(_) => break,
            };
            if tx.send(evt).is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl GameEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<GameEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<GameEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<GameEvent>) -> Self {
        Self { rx }
    }
}

impl GameEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<GameEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Wall-clock scheduler: remembers deadlines, the runner delivers them.
#[derive(Debug, Default)]
pub struct DeadlineScheduler {
    next_id: u64,
    pending: Vec<(TimerId, Instant)>,
}

impl DeadlineScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|(_, at)| *at).min()
    }

    /// Remove and return the earliest timer whose deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Option<TimerId> {
        let (idx, _) = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, (_, at))| *at <= now)
            .min_by_key(|(_, (_, at))| *at)?;
        Some(self.pending.remove(idx).0)
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Scheduler for DeadlineScheduler {
    fn schedule(&mut self, delay: Duration) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.pending.push((id, Instant::now() + delay));
        id
    }

    fn cancel(&mut self, id: TimerId) {
        self.pending.retain(|(pending, _)| *pending != id);
    }
}

/// Runner that advances the application one event/timer at a time
pub struct Runner<E: GameEventSource> {
    event_source: E,
    idle_wait: Duration,
}

impl<E: GameEventSource> Runner<E> {
    /// `idle_wait` bounds how long `step` blocks when no timer is pending.
    pub fn new(event_source: E, idle_wait: Duration) -> Self {
        Self {
            event_source,
            idle_wait,
        }
    }

    /// Wait for the next input event or the next due timer.
    ///
    /// Input is delivered first when both are ready. Returns `None` when the
    /// wait ran out with nothing to deliver.
    pub fn step(&self, scheduler: &mut DeadlineScheduler) -> Option<GameEvent> {
        let now = Instant::now();
        if let Some(id) = scheduler.take_due(now) {
            return match self.event_source.recv_timeout(Duration::ZERO) {
                Ok(ev) => {
                    // Input wins; the timer goes back to the front of the queue.
                    scheduler.pending.push((id, now));
                    Some(ev)
                }
                Err(_) => Some(GameEvent::Timer(id)),
            };
        }

        let timeout = scheduler
            .next_deadline()
            .map(|at| at.saturating_duration_since(now))
            .unwrap_or(self.idle_wait);

        match self.event_source.recv_timeout(timeout) {
            Ok(ev) => Some(ev),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => scheduler
                .take_due(Instant::now())
                .map(GameEvent::Timer),
        }
    }
}
