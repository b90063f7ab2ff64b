//! SessionManager - actor that owns the planning-session table
//!
//! Sessions are stored whole as JSON with a version column for
//! compare-and-swap writes. A put that names a stale version loses the
//! race and comes back as a VersionConflict; the session JSON never
//! reflects half of an operation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::{StoreError, StoreResponse};
use crate::domain::{PlanningSession, SessionKey, now_ms};

/// Version a put expects to find in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    /// The key must not exist yet
    Absent,
    /// The stored version must equal this value
    Version(u64),
}

/// Storage for planning sessions with versioned writes
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a session by key
    async fn get(&self, key: &SessionKey) -> StoreResponse<Option<PlanningSession>>;

    /// Write a session, succeeding only when the stored version matches
    /// the expectation. Returns the stored session with its new version.
    async fn put(&self, session: PlanningSession, expected: Expected) -> StoreResponse<PlanningSession>;
}

/// Commands sent to the SessionManager actor
#[derive(Debug)]
enum SessionCommand {
    Get {
        key: SessionKey,
        reply: oneshot::Sender<StoreResponse<Option<PlanningSession>>>,
    },
    Put {
        session: Box<PlanningSession>,
        expected: Expected,
        reply: oneshot::Sender<StoreResponse<PlanningSession>>,
    },
    Shutdown,
}

/// Handle to send commands to the SessionManager
#[derive(Clone)]
pub struct SessionManager {
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionManager {
    /// Spawn a new SessionManager actor over a SQLite database
    pub fn spawn(db_path: impl AsRef<Path>) -> eyre::Result<Self> {
        debug!(db_path = %db_path.as_ref().display(), "spawn: called");
        let db = SessionDb::open(db_path.as_ref())?;

        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(actor_loop(db, rx));
        info!("SessionManager spawned");

        Ok(Self { tx })
    }

    /// Ask the actor to stop after draining queued commands
    pub async fn shutdown(&self) {
        let _ = self.tx.send(SessionCommand::Shutdown).await;
    }
}

#[async_trait]
impl SessionStore for SessionManager {
    async fn get(&self, key: &SessionKey) -> StoreResponse<Option<PlanningSession>> {
        debug!(key = %key, "get: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::Get {
                key: key.clone(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| StoreError::ChannelError)?;
        reply_rx.await.map_err(|_| StoreError::ChannelError)?
    }

    async fn put(&self, session: PlanningSession, expected: Expected) -> StoreResponse<PlanningSession> {
        debug!(key = %session.key, ?expected, "put: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::Put {
                session: Box::new(session),
                expected,
                reply: reply_tx,
            })
            .await
            .map_err(|_| StoreError::ChannelError)?;
        reply_rx.await.map_err(|_| StoreError::ChannelError)?
    }
}

/// The actor task: single owner of the connection
async fn actor_loop(mut db: SessionDb, mut rx: mpsc::Receiver<SessionCommand>) {
    debug!("actor_loop: started");
    while let Some(command) = rx.recv().await {
        match command {
            SessionCommand::Get { key, reply } => {
                let _ = reply.send(db.get(&key));
            }
            SessionCommand::Put { session, expected, reply } => {
                let _ = reply.send(db.put(*session, expected));
            }
            SessionCommand::Shutdown => {
                debug!("actor_loop: shutdown");
                break;
            }
        }
    }
    debug!("actor_loop: exited");
}

/// Direct SQLite access, only ever touched by the actor task
struct SessionDb {
    conn: Connection,
}

impl SessionDb {
    fn open(path: &Path) -> eyre::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS planning_sessions (
                employee_id TEXT NOT NULL,
                month INTEGER NOT NULL,
                year INTEGER NOT NULL,
                version INTEGER NOT NULL,
                body TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (employee_id, month, year)
            );",
        )?;
        Ok(Self { conn })
    }

    fn get(&self, key: &SessionKey) -> StoreResponse<Option<PlanningSession>> {
        // Version is stored as i64 since SQLite has no unsigned integers
        let row: Option<(i64, String)> = self
            .conn
            .query_row(
                "SELECT version, body FROM planning_sessions
                 WHERE employee_id = ?1 AND month = ?2 AND year = ?3",
                params![key.employee_id, key.month, key.year],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((version, body)) => {
                let mut session: PlanningSession = serde_json::from_str(&body)?;
                session.version = version as u64;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    fn put(&mut self, mut session: PlanningSession, expected: Expected) -> StoreResponse<PlanningSession> {
        let key = session.key.clone();
        session.updated_at = now_ms();

        match expected {
            Expected::Absent => {
                session.version = 1;
                let body = serde_json::to_string(&session)?;
                let inserted = self.conn.execute(
                    "INSERT OR IGNORE INTO planning_sessions
                     (employee_id, month, year, version, body, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        key.employee_id,
                        key.month,
                        key.year,
                        session.version as i64,
                        body,
                        session.updated_at
                    ],
                )?;
                if inserted == 0 {
                    return Err(StoreError::VersionConflict(format!(
                        "session {} already exists",
                        key
                    )));
                }
            }
            Expected::Version(version) => {
                session.version = version + 1;
                let body = serde_json::to_string(&session)?;
                let updated = self.conn.execute(
                    "UPDATE planning_sessions
                     SET version = ?4, body = ?5, updated_at = ?6
                     WHERE employee_id = ?1 AND month = ?2 AND year = ?3 AND version = ?7",
                    params![
                        key.employee_id,
                        key.month,
                        key.year,
                        session.version as i64,
                        body,
                        session.updated_at,
                        version as i64
                    ],
                )?;
                if updated == 0 {
                    return Err(StoreError::VersionConflict(format!(
                        "session {} changed since version {}",
                        key, version
                    )));
                }
            }
        }
        Ok(session)
    }
}

/// In-memory store with the same CAS semantics, for tests
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<SessionKey, PlanningSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &SessionKey) -> StoreResponse<Option<PlanningSession>> {
        let sessions = self.sessions.lock().map_err(|_| StoreError::ChannelError)?;
        Ok(sessions.get(key).cloned())
    }

    async fn put(&self, mut session: PlanningSession, expected: Expected) -> StoreResponse<PlanningSession> {
        let mut sessions = self.sessions.lock().map_err(|_| StoreError::ChannelError)?;
        let key = session.key.clone();
        session.updated_at = now_ms();

        match (expected, sessions.get(&key)) {
            (Expected::Absent, None) => {
                session.version = 1;
            }
            (Expected::Absent, Some(_)) => {
                return Err(StoreError::VersionConflict(format!(
                    "session {} already exists",
                    key
                )));
            }
            (Expected::Version(version), Some(stored)) if stored.version == version => {
                session.version = version + 1;
            }
            (Expected::Version(version), _) => {
                return Err(StoreError::VersionConflict(format!(
                    "session {} changed since version {}",
                    key, version
                )));
            }
        }
        sessions.insert(key, session.clone());
        Ok(session)
    }
}
