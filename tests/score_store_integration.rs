use assert_cmd::Command;
use tempfile::tempdir;

use dragten::clock::ManualScheduler;
use dragten::score_store::{BackgroundScoreStore, SqliteScoreStore};
use dragten::{Board, Coord, Session, SessionConfig, UserId};

fn config() -> SessionConfig {
    SessionConfig {
        rows: 1,
        cols: 4,
        session_secs: 1,
        seed: Some(0),
    }
}

#[test]
fn finished_sessions_land_in_sqlite() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("state").join("scores.db");
    let user = UserId::new("sqlite-player").unwrap();

    let writer = SqliteScoreStore::open(&db_path).unwrap();
    let mut session = Session::new(
        config(),
        BackgroundScoreStore::spawn(writer),
        ManualScheduler::new(),
    )
    .with_user(Some(user.clone()));

    // First game: clear 1 + 9
    session.reset_with(Board::from_digits([[1, 9, 5, 5]]).unwrap());
    session.begin_drag(Coord::new(0, 0));
    session.update_drag(Coord::new(0, 1));
    session.end_drag();
    session.tick();

    // Second game: clear both pairs
    session.reset_with(Board::from_digits([[1, 9, 5, 5]]).unwrap());
    for start in [0, 2] {
        session.begin_drag(Coord::new(0, start));
        session.update_drag(Coord::new(0, start + 1));
        session.end_drag();
    }
    session.tick();

    // Dropping the session drops the background store, which drains its queue.
    drop(session);

    let reader = SqliteScoreStore::open(&db_path).unwrap();
    assert_eq!(reader.best_score(&user).unwrap(), Some(4));
    let history: Vec<u32> = reader
        .recent_scores(&user, 10)
        .unwrap()
        .into_iter()
        .map(|record| record.score)
        .collect();
    assert_eq!(history, vec![4, 2]);
    assert_eq!(reader.top_scores(5).unwrap(), vec![(user, 4)]);

    let output = Command::cargo_bin("dragten")
        .unwrap()
        .arg("--db")
        .arg(&db_path)
        .arg("--top")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1. sqlite-player"));
    assert!(stdout.trim_end().ends_with('4'));
}

#[test]
fn guest_sessions_write_nothing() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("scores.db");

    let writer = SqliteScoreStore::open(&db_path).unwrap();
    let mut session = Session::new(
        config(),
        BackgroundScoreStore::spawn(writer),
        ManualScheduler::new(),
    );
    session.reset();
    session.tick();
    drop(session);

    let reader = SqliteScoreStore::open(&db_path).unwrap();
    assert!(reader.top_scores(10).unwrap().is_empty());
}
