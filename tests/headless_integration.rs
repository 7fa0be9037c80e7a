use std::sync::mpsc;
use std::time::Duration;

use crossterm::event::{KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use dragten::app::App;
use dragten::runtime::{DeadlineScheduler, GameEvent, Runner, TestEventSource};
use dragten::score_store::MemoryScoreStore;
use dragten::ui::BoardLayout;
use dragten::{Board, Coord, Phase, Session, SessionConfig, TickOutcome, UserId};

fn mouse(kind: MouseEventKind, layout: &BoardLayout, coord: Coord) -> GameEvent {
    let rect = layout.cell_rect(coord);
    GameEvent::Mouse(MouseEvent {
        kind,
        column: rect.x + 1,
        row: rect.y,
        modifiers: KeyModifiers::NONE,
    })
}

fn config(secs: u32) -> SessionConfig {
    SessionConfig {
        rows: 2,
        cols: 2,
        session_secs: secs,
        seed: Some(8),
    }
}

#[test]
fn headless_drag_flow_clears_cells() {
    let store = MemoryScoreStore::new();
    let mut session = Session::new(config(60), store, DeadlineScheduler::new());
    session.reset_with(Board::from_digits([[4, 6], [3, 7]]).unwrap());
    let mut app = App::new(session, None);
    app.on_resize(Rect::new(0, 0, 40, 12));
    let layout = app.layout().expect("board fits");

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(TestEventSource::new(rx), Duration::from_millis(5));

    tx.send(mouse(MouseEventKind::Down(MouseButton::Left), &layout, Coord::new(0, 1)))
        .unwrap();
    tx.send(mouse(MouseEventKind::Drag(MouseButton::Left), &layout, Coord::new(1, 1)))
        .unwrap();
    tx.send(mouse(MouseEventKind::Up(MouseButton::Left), &layout, Coord::new(1, 1)))
        .unwrap();
    tx.send(mouse(MouseEventKind::Down(MouseButton::Left), &layout, Coord::new(1, 0)))
        .unwrap();
    tx.send(mouse(MouseEventKind::Drag(MouseButton::Left), &layout, Coord::new(1, 1)))
        .unwrap();
    tx.send(mouse(MouseEventKind::Up(MouseButton::Left), &layout, Coord::new(1, 1)))
        .unwrap();

    for _ in 0..6 {
        let event = runner
            .step(app.session_mut().scheduler_mut())
            .expect("queued mouse event");
        assert!(app.handle(event));
    }

    // 6 + 7 misses, 3 + 7 clears
    let session = app.session();
    assert_eq!(session.score(), 2);
    assert_eq!(session.board().get(Coord::new(0, 1)), Some(6));
    assert_eq!(session.board().get(Coord::new(1, 0)), None);
    assert_eq!(session.board().get(Coord::new(1, 1)), None);
    assert_eq!(session.selection(), None);
}

#[test]
fn headless_timed_session_ends_by_wall_clock() {
    let store = MemoryScoreStore::new();
    let mut session = Session::new(config(1), store.clone(), DeadlineScheduler::new())
        .with_user(UserId::new("headless"));
    session.reset();
    let mut app = App::new(session, None);
    app.on_resize(Rect::new(0, 0, 40, 12));

    let (_tx, rx) = mpsc::channel();
    let runner = Runner::new(TestEventSource::new(rx), Duration::from_millis(50));

    // One second of countdown, bounded to avoid hanging on failure
    for _ in 0..100u32 {
        if let Some(event) = runner.step(app.session_mut().scheduler_mut()) {
            assert!(app.handle(event));
        }
        if app.session().phase() == Phase::Ended {
            break;
        }
    }

    assert_eq!(app.session().phase(), Phase::Ended, "session should end by timeout");
    assert_eq!(store.submissions().len(), 1);
    assert!(app.session().scheduler().is_idle());
}

#[test]
fn headless_shrinking_terminal_pauses_countdown() {
    let mut session = Session::new(config(5), MemoryScoreStore::new(), DeadlineScheduler::new());
    session.reset();
    let mut app = App::new(session, None);
    app.on_resize(Rect::new(0, 0, 40, 12));

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(TestEventSource::new(rx), Duration::from_millis(5));
    tx.send(GameEvent::Resize(6, 3)).unwrap();
    let event = runner.step(app.session_mut().scheduler_mut()).unwrap();
    app.handle(event);
    assert!(!app.session().is_ready());

    // The tick already in flight lands, no further tick is scheduled
    for _ in 0..100u32 {
        if let Some(event) = runner.step(app.session_mut().scheduler_mut()) {
            app.handle(event);
        }
        if app.session().scheduler().is_idle() {
            break;
        }
    }
    assert_eq!(app.session().remaining_secs(), 4);
    assert!(app.session().scheduler().is_idle());

    tx.send(GameEvent::Resize(40, 12)).unwrap();
    let event = runner.step(app.session_mut().scheduler_mut()).unwrap();
    app.handle(event);
    assert!(app.session().is_ready());
    assert!(!app.session().scheduler().is_idle());
}

#[test]
fn headless_closed_gate_stops_the_countdown() {
    let mut session = Session::new(config(5), MemoryScoreStore::new(), DeadlineScheduler::new());
    session.set_ready(false);
    session.reset();
    assert!(session.scheduler().is_idle());

    let (_tx, rx) = mpsc::channel::<GameEvent>();
    let runner = Runner::new(TestEventSource::new(rx), Duration::from_millis(5));
    for _ in 0..3 {
        assert!(runner.step(session.scheduler_mut()).is_none());
    }
    assert_eq!(session.remaining_secs(), 5);
    assert_eq!(session.phase(), Phase::Running);

    session.set_ready(true);
    assert!(!session.scheduler().is_idle());
}

#[test]
fn headless_reset_discards_pending_tick() {
    let mut session = Session::new(config(5), MemoryScoreStore::new(), DeadlineScheduler::new());
    session.reset();
    let stale = session.pending_timer().unwrap();
    session.reset();
    let fresh = session.pending_timer().unwrap();
    assert_ne!(stale, fresh);
    assert_eq!(session.on_timer(stale), TickOutcome::Ignored);
    assert_eq!(session.remaining_secs(), 5);
}
