//! Terminal host state: routes runtime events into the session and keeps what
//! the renderer needs besides the snapshot.

use crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use log::{debug, warn};
use ratatui::{layout::Rect, Frame};

use crate::runtime::{DeadlineScheduler, GameEvent};
use crate::score_store::{ScoreStoreError, SqliteScoreStore, UserId};
use crate::session::{Session, TickOutcome};
use crate::ui::{BoardLayout, GameView};

pub struct App {
    session: Session<DeadlineScheduler>,
    layout: Option<BoardLayout>,
    scores: Option<SqliteScoreStore>,
    best_score: Option<u32>,
}

impl App {
    /// `scores` is a read connection used for the best score on the end panel.
    pub fn new(session: Session<DeadlineScheduler>, scores: Option<SqliteScoreStore>) -> Self {
        Self {
            session,
            layout: None,
            scores,
            best_score: None,
        }
    }

    pub fn session(&self) -> &Session<DeadlineScheduler> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<DeadlineScheduler> {
        &mut self.session
    }

    pub fn layout(&self) -> Option<BoardLayout> {
        self.layout
    }

    pub fn best_score(&self) -> Option<u32> {
        self.best_score
    }

    /// Route one runtime event. Returns false when the user asked to quit.
    pub fn handle(&mut self, event: GameEvent) -> bool {
        match event {
            GameEvent::Timer(id) => {
                let outcome = self.session.on_timer(id);
                self.on_timer_outcome(outcome);
            }
            GameEvent::Resize(width, height) => self.on_resize(Rect::new(0, 0, width, height)),
            GameEvent::Mouse(mouse) => self.on_mouse(mouse),
            GameEvent::Key(key) => {
                if is_quit(&key) {
                    return false;
                }
                if key.kind == KeyEventKind::Press && key.code == KeyCode::Char('r') {
                    self.restart();
                }
            }
        }
        true
    }

    /// Refit the board. A terminal too small for the whole board closes the pause gate.
    pub fn on_resize(&mut self, area: Rect) {
        let config = self.session.config();
        self.layout = BoardLayout::fit(area, config.rows, config.cols);
        self.session.set_ready(self.layout.is_some());
    }

    pub fn on_mouse(&mut self, mouse: MouseEvent) {
        let cell = self
            .layout
            .and_then(|layout| layout.cell_at(mouse.column, mouse.row));
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(coord) = cell {
                    self.session.begin_drag(coord);
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                if let Some(coord) = cell {
                    self.session.update_drag(coord);
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                if let Some(outcome) = self.session.end_drag() {
                    debug!(
                        "drag released: matched={} delta={}",
                        outcome.matched(),
                        outcome.score_delta
                    );
                }
            }
            _ => {}
        }
    }

    pub fn on_timer_outcome(&mut self, outcome: TickOutcome) {
        if let TickOutcome::Ended { score, report } = outcome {
            debug!("game over with {} ({:?})", score, report);
            // The writer thread may not have committed this game yet.
            self.best_score = match (&self.scores, self.session.user_id()) {
                (Some(scores), Some(user)) => scores
                    .best_score(user)
                    .unwrap_or_else(|err| {
                        warn!("could not read best score: {}", err);
                        None
                    })
                    .map(|best| best.max(score))
                    .or(Some(score)),
                _ => None,
            };
        }
    }

    pub fn restart(&mut self) {
        self.best_score = None;
        self.session.reset();
    }

    pub fn draw(&self, f: &mut Frame) {
        let view = GameView {
            snapshot: self.session.snapshot(),
            best_score: self.best_score,
        };
        f.render_widget(&view, f.area());
    }
}

pub fn is_quit(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => true,
        // ctrl+c to quit
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Recent games for `user`, one line each, newest first.
pub fn history_lines(
    scores: &SqliteScoreStore,
    user: &UserId,
    limit: usize,
) -> Result<Vec<String>, ScoreStoreError> {
    let records = scores.recent_scores(user, limit)?;
    if records.is_empty() {
        return Ok(vec![format!("no games recorded for {}", user)]);
    }
    let mut lines = vec![format!("recent games for {}", user)];
    lines.extend(records.iter().map(|record| {
        format!(
            "{}  {:>4}",
            record.created_at.format("%Y-%m-%d %H:%M"),
            record.score
        )
    }));
    Ok(lines)
}

/// Best score per user, ranked.
pub fn ranking_lines(
    scores: &SqliteScoreStore,
    limit: usize,
) -> Result<Vec<String>, ScoreStoreError> {
    let ranking = scores.top_scores(limit)?;
    if ranking.is_empty() {
        return Ok(vec!["no scores yet".to_string()]);
    }
    Ok(ranking
        .iter()
        .enumerate()
        .map(|(i, (user, best))| format!("{:>3}. {:<20} {:>4}", i + 1, user.as_str(), best))
        .collect())
}
