use chrono::{DateTime, Local};
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Opaque identifier handed over by the identity service
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Blank identifiers count as "no user".
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Final result of one session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScoreReport {
    user_id: UserId,
    score: u32,
}

impl ScoreReport {
    pub fn new(user_id: UserId, score: u32) -> Self {
        Self { user_id, score }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn score(&self) -> u32 {
        self.score
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScoreStoreError {
    #[error("score store unavailable: {0}")]
    Unavailable(String),
    #[error("score rejected: {0}")]
    Rejected(String),
    #[error("score database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for ScoreStoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<std::io::Error> for ScoreStoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Destination for finished sessions' scores
pub trait ScoreStore: Send {
    fn submit(&mut self, report: &ScoreReport) -> Result<(), ScoreStoreError>;
}

/// Keeps every submission in memory; handles share the same list.
#[derive(Debug, Clone, Default)]
pub struct MemoryScoreStore {
    submissions: Arc<Mutex<Vec<ScoreReport>>>,
    reject: bool,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that records each attempt and then refuses it
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    /// Every report passed to `submit`, accepted or not
    pub fn submissions(&self) -> Vec<ScoreReport> {
        self.submissions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ScoreStore for MemoryScoreStore {
    fn submit(&mut self, report: &ScoreReport) -> Result<(), ScoreStoreError> {
        self.submissions
            .lock()
            .map_err(|_| ScoreStoreError::Unavailable("score list poisoned".to_string()))?
            .push(report.clone());
        if self.reject {
            return Err(ScoreStoreError::Rejected(format!(
                "store refuses {}",
                report.user_id()
            )));
        }
        Ok(())
    }
}

/// One row of a user's score history
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub score: u32,
    pub created_at: DateTime<Local>,
}

/// SQLite-backed store keeping full history plus a per-user best
#[derive(Debug)]
pub struct SqliteScoreStore {
    conn: Connection,
}

impl SqliteScoreStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ScoreStoreError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, ScoreStoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, ScoreStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS game_scores (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                score INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_game_scores_user ON game_scores(user_id);
            CREATE TABLE IF NOT EXISTS user_best_scores (
                user_id TEXT PRIMARY KEY,
                best_score INTEGER NOT NULL,
                achieved_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self { conn })
    }

    /// Highest score ever submitted for `user`
    pub fn best_score(&self, user: &UserId) -> Result<Option<u32>, ScoreStoreError> {
        let best: Option<u32> = self
            .conn
            .query_row(
                "SELECT best_score FROM user_best_scores WHERE user_id = ?1",
                [user.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(best)
    }

    /// Most recent scores for `user`, newest first
    pub fn recent_scores(
        &self,
        user: &UserId,
        limit: usize,
    ) -> Result<Vec<ScoreRecord>, ScoreStoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT score, created_at FROM game_scores
            WHERE user_id = ?1
            ORDER BY id DESC
            LIMIT ?2
            "#,
        )?;

        let rows = stmt.query_map(params![user.as_str(), limit as i64], |row| {
            let created_at: String = row.get(1)?;
            let created_at = DateTime::parse_from_rfc3339(&created_at)
                .map_err(|_| {
                    rusqlite::Error::InvalidColumnType(
                        1,
                        "created_at".to_string(),
                        rusqlite::types::Type::Text,
                    )
                })?
                .with_timezone(&Local);
            Ok(ScoreRecord {
                score: row.get(0)?,
                created_at,
            })
        })?;

        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        Ok(records)
    }

    /// Best score per user, highest first; earlier achievers win ties.
    pub fn top_scores(&self, limit: usize) -> Result<Vec<(UserId, u32)>, ScoreStoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT user_id, best_score FROM user_best_scores
            ORDER BY best_score DESC, achieved_at ASC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
        })?;

        let mut ranking = Vec::new();
        for row in rows {
            let (user, best) = row?;
            if let Some(user) = UserId::new(user) {
                ranking.push((user, best));
            }
        }
        Ok(ranking)
    }
}

impl ScoreStore for SqliteScoreStore {
    fn submit(&mut self, report: &ScoreReport) -> Result<(), ScoreStoreError> {
        let now = Local::now().to_rfc3339();
        let user = report.user_id().as_str();
        let tx = self.conn.transaction()?;

        let best: Option<u32> = tx
            .query_row(
                "SELECT best_score FROM user_best_scores WHERE user_id = ?1",
                [user],
                |row| row.get(0),
            )
            .optional()?;

        match best {
            Some(best) if report.score() > best => {
                tx.execute(
                    "UPDATE user_best_scores SET best_score = ?1, achieved_at = ?2 WHERE user_id = ?3",
                    params![report.score(), now, user],
                )?;
            }
            Some(_) => {}
            None => {
                tx.execute(
                    "INSERT INTO user_best_scores (user_id, best_score, achieved_at) VALUES (?1, ?2, ?3)",
                    params![user, report.score(), now],
                )?;
            }
        }

        tx.execute(
            "INSERT INTO game_scores (user_id, score, created_at) VALUES (?1, ?2, ?3)",
            params![user, report.score(), now],
        )?;

        tx.commit()?;
        Ok(())
    }
}

/// Hands reports to a worker thread so `submit` never waits on the inner store.
///
/// Dropping the store waits for queued reports to be written.
pub struct BackgroundScoreStore {
    tx: Option<Sender<ScoreReport>>,
    worker: Option<JoinHandle<()>>,
}

impl BackgroundScoreStore {
    pub fn spawn<S: ScoreStore + 'static>(mut inner: S) -> Self {
        let (tx, rx) = mpsc::channel::<ScoreReport>();
        let worker = thread::spawn(move || {
            for report in rx {
                match inner.submit(&report) {
                    Ok(()) => info!(
                        "saved score {} for user {}",
                        report.score(),
                        report.user_id()
                    ),
                    Err(err) => warn!(
                        "could not save score {} for user {}: {}",
                        report.score(),
                        report.user_id(),
                        err
                    ),
                }
            }
        });
        Self {
            tx: Some(tx),
            worker: Some(worker),
        }
    }
}

impl ScoreStore for BackgroundScoreStore {
    fn submit(&mut self, report: &ScoreReport) -> Result<(), ScoreStoreError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| ScoreStoreError::Unavailable("score worker stopped".to_string()))?;
        tx.send(report.clone())
            .map_err(|_| ScoreStoreError::Unavailable("score worker stopped".to_string()))
    }
}

impl Drop for BackgroundScoreStore {
    fn drop(&mut self) {
        drop(self.tx.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
