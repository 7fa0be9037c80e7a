//! Session controller: owns the board, score and clock for one play and is
//! the only place any of them change.
//!
//! Input operations are total. Dragging on a cleared cell, dragging after
//! time is up, or pointing outside the board is silently ignored.

use log::{debug, info, trace, warn};
use rand::{rngs::StdRng, SeedableRng};

use crate::board::{Board, Coord, DEFAULT_COLS, DEFAULT_ROWS, MAX_COLS, MAX_ROWS};
use crate::clock::{ClockEvent, GameClock, Phase, Scheduler, TimerId};
use crate::matcher::{evaluate, MatchOutcome};
use crate::score_store::{ScoreReport, ScoreStore, ScoreStoreError, UserId};
use crate::selection::{Drag, Region};

pub const DEFAULT_SESSION_SECS: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub rows: usize,
    pub cols: usize,
    pub session_secs: u32,
    /// Fixed seed for reproducible boards
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            session_secs: DEFAULT_SESSION_SECS,
            seed: None,
        }
    }
}

impl SessionConfig {
    /// Same config with both dimensions clamped to `1..=MAX_ROWS` / `1..=MAX_COLS`.
    pub fn bounded(self) -> Self {
        Self {
            rows: self.rows.clamp(1, MAX_ROWS),
            cols: self.cols.clamp(1, MAX_COLS),
            ..self
        }
    }
}

/// One-shot guard for the end-of-session score report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportGuard {
    Armed,
    Fired,
}

/// What happened to the final score
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportStatus {
    Submitted,
    /// No identity was supplied, nothing was sent
    NoUser,
    /// The store refused or was unreachable. Not retried.
    Failed(ScoreStoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Stale timer, or the session is not running
    Ignored,
    Ticked {
        remaining: u32,
    },
    Ended {
        score: u32,
        /// `None` when the report had already gone out for this session
        report: Option<ReportStatus>,
    },
}

/// Read-only view handed to renderers
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub board: &'a Board,
    pub score: u32,
    pub remaining_secs: u32,
    pub phase: Phase,
    pub selection: Option<Region>,
    pub user_id: Option<&'a UserId>,
    pub last_report: Option<&'a ReportStatus>,
    pub ready: bool,
}

impl Snapshot<'_> {
    pub fn is_selected(&self, coord: Coord) -> bool {
        self.selection.is_some_and(|region| region.contains(coord))
    }

    /// Digits still on the board
    pub fn remaining_digits(&self) -> usize {
        self.board.remaining()
    }
}

pub struct Session<S: Scheduler> {
    config: SessionConfig,
    board: Board,
    score: u32,
    clock: GameClock,
    drag: Option<Drag>,
    user_id: Option<UserId>,
    store: Box<dyn ScoreStore>,
    guard: ReportGuard,
    last_report: Option<ReportStatus>,
    rng: StdRng,
    scheduler: S,
    ready: bool,
}

impl<S: Scheduler> Session<S> {
    /// A session in `Initializing`; call [`Session::reset`] to deal and start.
    pub fn new<T: ScoreStore + 'static>(config: SessionConfig, store: T, scheduler: S) -> Self {
        let config = config.bounded();
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            board: Board::blank(config.rows, config.cols),
            clock: GameClock::new(config.session_secs),
            config,
            score: 0,
            drag: None,
            user_id: None,
            store: Box::new(store),
            guard: ReportGuard::Armed,
            last_report: None,
            rng,
            scheduler,
            ready: true,
        }
    }

    pub fn with_user(mut self, user_id: Option<UserId>) -> Self {
        self.user_id = user_id;
        self
    }

    /// Deal a fresh random board and start the countdown.
    pub fn reset(&mut self) {
        let board = Board::generate(self.config.rows, self.config.cols, &mut self.rng);
        self.reset_with(board);
    }

    /// Same as [`Session::reset`] but with a caller-supplied board.
    pub fn reset_with(&mut self, board: Board) {
        self.clock.reset(&mut self.scheduler);
        self.board = board;
        self.score = 0;
        self.drag = None;
        self.guard = ReportGuard::Armed;
        self.last_report = None;

        info!(
            "session start: {}x{} board, {}s",
            self.board.rows(),
            self.board.cols(),
            self.clock.session_secs()
        );

        match self.clock.start() {
            ClockEvent::Expired => {
                self.report_final_score();
            }
            _ => {
                self.clock.arm(&mut self.scheduler, self.ready);
            }
        }
    }

    /// Pause gate. While not ready the countdown schedules no further ticks.
    pub fn set_ready(&mut self, ready: bool) {
        if ready != self.ready {
            debug!("pause gate {}", if ready { "open" } else { "closed" });
        }
        self.ready = ready;
        self.clock.arm(&mut self.scheduler, ready);
    }

    /// Start a drag on a digit. Returns false when the press was ignored.
    pub fn begin_drag(&mut self, coord: Coord) -> bool {
        if self.clock.phase() != Phase::Running || self.board.get(coord).is_none() {
            return false;
        }
        trace!("drag start at ({}, {})", coord.row, coord.col);
        self.drag = Some(Drag::start(coord));
        true
    }

    /// Move the drag pointer. Ignored without an active drag or off the board.
    pub fn update_drag(&mut self, coord: Coord) -> bool {
        if !self.board.contains(coord) {
            return false;
        }
        match self.drag.as_mut() {
            Some(drag) => {
                drag.move_to(coord);
                true
            }
            None => false,
        }
    }

    /// Release the drag and clear the region if it sums to ten.
    ///
    /// Returns `None` when there was nothing to evaluate. The drag is consumed
    /// either way.
    pub fn end_drag(&mut self) -> Option<MatchOutcome> {
        let drag = self.drag.take()?;
        if self.clock.phase() != Phase::Running {
            return None;
        }

        let region = drag.region();
        let outcome = evaluate(&self.board, &region);
        if outcome.matched() {
            for coord in &outcome.cleared {
                self.board.clear(*coord);
            }
            self.score += outcome.score_delta;
            debug!(
                "cleared {} cells in {}x{} region, score {}",
                outcome.cleared.len(),
                region.height(),
                region.width(),
                self.score
            );
        }
        Some(outcome)
    }

    /// Deliver a scheduled timer. Anything but the pending tick is ignored.
    pub fn on_timer(&mut self, id: TimerId) -> TickOutcome {
        let event = self.clock.fire(id);
        self.apply_clock_event(event)
    }

    /// Count down one second directly, without going through the scheduler.
    pub fn tick(&mut self) -> TickOutcome {
        let event = self.clock.tick();
        self.apply_clock_event(event)
    }

    fn apply_clock_event(&mut self, event: ClockEvent) -> TickOutcome {
        match event {
            ClockEvent::Stale => TickOutcome::Ignored,
            ClockEvent::Ticked { remaining } => {
                trace!("tick, {}s left", remaining);
                self.clock.arm(&mut self.scheduler, self.ready);
                TickOutcome::Ticked { remaining }
            }
            ClockEvent::Expired => {
                self.clock.cancel(&mut self.scheduler);
                self.drag = None;
                info!("session over, final score {}", self.score);
                TickOutcome::Ended {
                    score: self.score,
                    report: self.report_final_score(),
                }
            }
        }
    }

    /// Send the final score if the session has ended and has not reported yet.
    ///
    /// Safe to call any number of times; at most one report per session.
    pub fn report_final_score(&mut self) -> Option<ReportStatus> {
        if self.clock.phase() != Phase::Ended || self.guard == ReportGuard::Fired {
            return None;
        }
        self.guard = ReportGuard::Fired;

        let status = match &self.user_id {
            None => ReportStatus::NoUser,
            Some(user) => {
                let report = ScoreReport::new(user.clone(), self.score);
                match self.store.submit(&report) {
                    Ok(()) => ReportStatus::Submitted,
                    Err(err) => {
                        warn!("score report for {} failed: {}", user, err);
                        ReportStatus::Failed(err)
                    }
                }
            }
        };
        self.last_report = Some(status.clone());
        Some(status)
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            board: &self.board,
            score: self.score,
            remaining_secs: self.clock.remaining(),
            phase: self.clock.phase(),
            selection: self.selection(),
            user_id: self.user_id.as_ref(),
            last_report: self.last_report.as_ref(),
            ready: self.ready,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn remaining_secs(&self) -> u32 {
        self.clock.remaining()
    }

    pub fn phase(&self) -> Phase {
        self.clock.phase()
    }

    pub fn selection(&self) -> Option<Region> {
        self.drag.map(|drag| drag.region())
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    pub fn last_report(&self) -> Option<&ReportStatus> {
        self.last_report.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn pending_timer(&self) -> Option<TimerId> {
        self.clock.pending()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }
}

impl<S: Scheduler> Drop for Session<S> {
    fn drop(&mut self) {
        self.clock.cancel(&mut self.scheduler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualScheduler;
    use crate::score_store::MemoryScoreStore;
    use assert_matches::assert_matches;

    fn c(row: usize, col: usize) -> Coord {
        Coord::new(row, col)
    }

    fn config(secs: u32) -> SessionConfig {
        SessionConfig {
            rows: 2,
            cols: 2,
            session_secs: secs,
            seed: Some(3),
        }
    }

    fn session(secs: u32) -> (Session<ManualScheduler>, MemoryScoreStore) {
        let store = MemoryScoreStore::new();
        let mut session = Session::new(config(secs), store.clone(), ManualScheduler::new())
            .with_user(UserId::new("player-1"));
        session.reset_with(Board::from_digits([[4, 6], [3, 7]]).unwrap());
        (session, store)
    }

    #[test]
    fn test_new_session_waits_in_initializing() {
        let session = Session::new(config(60), MemoryScoreStore::new(), ManualScheduler::new());
        assert_eq!(session.phase(), Phase::Initializing);
        assert_eq!(session.board().remaining(), 0);
        assert!(session.scheduler().scheduled().is_empty());
    }

    #[test]
    fn test_reset_deals_and_runs() {
        let mut session = Session::new(config(60), MemoryScoreStore::new(), ManualScheduler::new());
        session.reset();
        assert_eq!(session.phase(), Phase::Running);
        assert_eq!(session.board().remaining(), 4);
        assert_eq!(session.remaining_secs(), 60);
        assert_eq!(session.scheduler().scheduled().len(), 1);
    }

    #[test]
    fn test_seeded_sessions_deal_same_board() {
        let mut a = Session::new(config(60), MemoryScoreStore::new(), ManualScheduler::new());
        let mut b = Session::new(config(60), MemoryScoreStore::new(), ManualScheduler::new());
        a.reset();
        b.reset();
        assert_eq!(a.board(), b.board());
    }

    #[test]
    fn test_matching_drag_clears_and_scores() {
        let (mut session, _) = session(60);
        assert!(session.begin_drag(c(0, 0)));
        assert!(session.update_drag(c(0, 1)));
        assert_eq!(session.selection(), Some(Region::spanning(c(0, 0), c(0, 1))));

        let outcome = session.end_drag().unwrap();
        assert!(outcome.matched());
        assert_eq!(session.score(), 2);
        assert!(session.board().is_cleared(c(0, 0)));
        assert!(session.board().is_cleared(c(0, 1)));
        assert_eq!(session.selection(), None);
    }

    #[test]
    fn test_non_matching_drag_changes_nothing() {
        let (mut session, _) = session(60);
        let before = session.board().clone();
        session.begin_drag(c(0, 0));
        session.update_drag(c(1, 0));
        let outcome = session.end_drag().unwrap();
        assert!(!outcome.matched());
        assert_eq!(session.board(), &before);
        assert_eq!(session.score(), 0);
        assert_eq!(session.selection(), None);
    }

    #[test]
    fn test_end_drag_twice_is_noop() {
        let (mut session, _) = session(60);
        session.begin_drag(c(0, 0));
        session.update_drag(c(0, 1));
        assert!(session.end_drag().is_some());
        assert_eq!(session.end_drag(), None);
        assert_eq!(session.score(), 2);
    }

    #[test]
    fn test_drag_on_cleared_cell_is_ignored() {
        let (mut session, _) = session(60);
        session.begin_drag(c(0, 0));
        session.update_drag(c(0, 1));
        session.end_drag();

        assert!(!session.begin_drag(c(0, 0)));
        assert_eq!(session.selection(), None);
    }

    #[test]
    fn test_out_of_bounds_input_is_ignored() {
        let (mut session, _) = session(60);
        assert!(!session.begin_drag(c(5, 5)));
        assert!(!session.update_drag(c(0, 1)));
        assert!(session.begin_drag(c(1, 1)));
        assert!(!session.update_drag(c(1, 9)));
        assert_eq!(session.selection(), Some(Region::spanning(c(1, 1), c(1, 1))));
    }

    #[test]
    fn test_scheduled_ticks_count_down_and_report_once() {
        let (mut session, store) = session(2);

        let first = session.pending_timer().unwrap();
        assert_eq!(session.on_timer(first), TickOutcome::Ticked { remaining: 1 });
        assert_eq!(session.on_timer(first), TickOutcome::Ignored);

        let second = session.pending_timer().unwrap();
        assert_ne!(first, second);
        assert_eq!(
            session.on_timer(second),
            TickOutcome::Ended {
                score: 0,
                report: Some(ReportStatus::Submitted)
            }
        );
        assert_eq!(session.phase(), Phase::Ended);
        assert_eq!(session.pending_timer(), None);
        assert_eq!(session.on_timer(second), TickOutcome::Ignored);
        assert_eq!(session.tick(), TickOutcome::Ignored);
        assert_eq!(session.report_final_score(), None);
        assert_eq!(store.submissions().len(), 1);
    }

    #[test]
    fn test_report_carries_final_score() {
        let (mut session, store) = session(1);
        session.begin_drag(c(0, 1));
        session.update_drag(c(1, 1));
        session.end_drag();
        assert_eq!(session.score(), 0);
        session.begin_drag(c(0, 0));
        session.update_drag(c(0, 1));
        session.end_drag();
        assert_eq!(session.score(), 2);

        session.tick();
        let reports = store.submissions();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].score(), 2);
        assert_eq!(reports[0].user_id().as_str(), "player-1");
    }

    #[test]
    fn test_no_user_skips_report() {
        let store = MemoryScoreStore::new();
        let mut session = Session::new(config(1), store.clone(), ManualScheduler::new());
        session.reset();
        assert_eq!(
            session.tick(),
            TickOutcome::Ended {
                score: 0,
                report: Some(ReportStatus::NoUser)
            }
        );
        assert!(store.submissions().is_empty());
        assert_eq!(session.last_report(), Some(&ReportStatus::NoUser));
    }

    #[test]
    fn test_failed_report_keeps_end_state_and_guard() {
        let store = MemoryScoreStore::rejecting();
        let mut session = Session::new(config(1), store.clone(), ManualScheduler::new())
            .with_user(UserId::new("u"));
        session.reset();
        assert_matches!(
            session.tick(),
            TickOutcome::Ended {
                report: Some(ReportStatus::Failed(ScoreStoreError::Rejected(_))),
                ..
            }
        );
        assert_eq!(session.phase(), Phase::Ended);
        assert_eq!(session.report_final_score(), None);
        assert_eq!(store.submissions().len(), 1);
    }

    #[test]
    fn test_input_rejected_after_end() {
        let (mut session, _) = session(1);
        session.begin_drag(c(0, 0));
        session.tick();
        assert_eq!(session.selection(), None);
        assert!(!session.begin_drag(c(1, 1)));
        assert_eq!(session.end_drag(), None);
    }

    #[test]
    fn test_reset_rearms_report_and_cancels_timer() {
        let (mut session, store) = session(1);
        session.tick();
        assert_eq!(store.submissions().len(), 1);

        session.reset();
        assert_eq!(session.phase(), Phase::Running);
        assert_eq!(session.score(), 0);
        assert_eq!(session.remaining_secs(), 1);
        assert_eq!(session.last_report(), None);

        let stale = session.pending_timer().unwrap();
        session.reset();
        assert!(session.scheduler().cancelled().contains(&stale));
        assert_eq!(session.on_timer(stale), TickOutcome::Ignored);

        session.tick();
        assert_eq!(store.submissions().len(), 2);
    }

    #[test]
    fn test_pause_gate_withholds_next_tick() {
        let (mut session, _) = session(10);
        session.set_ready(false);
        let id = session.pending_timer().unwrap();
        assert_eq!(session.on_timer(id), TickOutcome::Ticked { remaining: 9 });
        assert_eq!(session.pending_timer(), None);
        assert_eq!(session.phase(), Phase::Running);

        session.set_ready(true);
        assert!(session.pending_timer().is_some());
        assert!(session.snapshot().ready);
    }

    #[test]
    fn test_zero_length_session_ends_on_reset() {
        let store = MemoryScoreStore::new();
        let mut session = Session::new(config(0), store.clone(), ManualScheduler::new())
            .with_user(UserId::new("u"));
        session.reset();
        assert_eq!(session.phase(), Phase::Ended);
        assert_eq!(store.submissions().len(), 1);
        assert_eq!(session.pending_timer(), None);
    }

    #[test]
    fn test_oversized_config_is_bounded() {
        let huge = SessionConfig {
            rows: usize::MAX,
            cols: 0,
            session_secs: 5,
            seed: Some(1),
        };
        let mut session = Session::new(huge, MemoryScoreStore::new(), ManualScheduler::new());
        assert_eq!(session.config().rows, MAX_ROWS);
        assert_eq!(session.config().cols, 1);
        session.reset();
        assert_eq!(session.board().remaining(), MAX_ROWS);
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let (mut session, _) = session(60);
        session.begin_drag(c(1, 0));
        session.update_drag(c(1, 1));
        let snap = session.snapshot();
        assert_eq!(snap.phase, Phase::Running);
        assert_eq!(snap.remaining_secs, 60);
        assert!(snap.is_selected(c(1, 1)));
        assert!(!snap.is_selected(c(0, 0)));
        assert_eq!(snap.remaining_digits(), 4);
        assert_eq!(snap.user_id.map(|u| u.as_str()), Some("player-1"));
    }
}
