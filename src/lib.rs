// Library surface for headless/integration tests and reuse.
// The engine (board, selection, matcher, clock, session) has no terminal
// dependencies; runtime and ui adapt it to crossterm/ratatui.
pub mod app;
pub mod app_dirs;
pub mod board;
pub mod clock;
pub mod config;
pub mod logging;
pub mod matcher;
pub mod runtime;
pub mod score_store;
pub mod selection;
pub mod session;
pub mod ui;

pub use board::{Board, Coord};
pub use clock::{Phase, Scheduler, TimerId};
pub use matcher::{evaluate, MatchOutcome};
pub use score_store::{ScoreReport, ScoreStore, UserId};
pub use selection::Region;
pub use session::{Session, SessionConfig, Snapshot, TickOutcome};
