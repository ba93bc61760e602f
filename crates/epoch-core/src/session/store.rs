//! SQLite-backed session store.
//!
//! Every mutation is a single partial-merge write keyed by session id: fields
//! a given update does not carry are left untouched (`COALESCE` against the
//! stored value). Status changes run through the `SessionStatus` transition
//! rules inside one transaction, so no reader can observe a half-applied
//! transition and no writer can resurrect a terminal session.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::debug;

use crate::session::state::{SessionStatus, TrainingSession};
use crate::storage::{Database, StorageError};

/// Result type alias for session-store operations.
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Errors surfaced by the session store.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The requested status change is not a legal transition.
    #[error("invalid transition for session {id}: {from} -> {to}")]
    InvalidTransition { id: String, from: SessionStatus, to: SessionStatus },

    /// `finish` was called with an outcome conflicting with the recorded one.
    #[error("session {id} is already terminal ({status})")]
    AlreadyTerminal { id: String, status: SessionStatus },

    /// A progress update arrived for a session that is not running.
    #[error("session {id} is not running ({status})")]
    NotRunning { id: String, status: SessionStatus },

    #[error("session not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<rusqlite::Error> for SessionError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Connection(e))
    }
}

/// Partial update applied to a session document.
///
/// `None` fields are left untouched by the write; this mirrors the
/// only-set-what-was-supplied merge the rest of the platform relies on.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub progress: Option<f64>,
    pub current_epoch: Option<u32>,
    pub total_epochs: Option<u32>,
    pub metric_name: Option<String>,
    pub accuracy: Option<f64>,
    pub loss: Option<f64>,
    pub accuracy_percent: Option<f64>,
    pub loss_percent: Option<f64>,
}

impl SessionUpdate {
    /// Update carrying only a progress value.
    #[must_use]
    pub fn progress(progress: f64) -> Self {
        Self { progress: Some(progress), ..Self::default() }
    }
}

/// Store for `TrainingSession` documents.
///
/// Ownership of a session is established at job start and never transferred:
/// the claiming trainer is the sole mutator until a terminal state is
/// recorded. Writes for different sessions are independent.
pub struct SessionStore {
    db: Mutex<Database>,
}

impl SessionStore {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Opens (or creates) the store at the given path.
    pub fn open(path: &str) -> SessionResult<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    fn lock(&self) -> SessionResult<MutexGuard<'_, Database>> {
        self.db.lock().map_err(|_| {
            SessionError::Storage(StorageError::InvalidData(
                "session store lock poisoned".to_string(),
            ))
        })
    }

    /// Inserts a new session document.
    ///
    /// Callers create sessions in `pending` state before a trainer is
    /// spawned for them.
    pub fn create(&self, session: &TrainingSession) -> SessionResult<()> {
        let db = self.lock()?;
        db.conn().execute(
            r#"
            INSERT INTO training_sessions
                (id, model_id, dataset_id, status, progress, current_epoch, total_epochs,
                 metric_name, accuracy, loss, accuracy_percent, loss_percent,
                 parameters_json, start_time, end_time, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
            rusqlite::params![
                session.id,
                session.model_id,
                session.dataset_id,
                session.status.as_str(),
                session.progress,
                session.current_epoch,
                session.total_epochs,
                session.metric_name,
                session.accuracy,
                session.loss,
                session.accuracy_percent,
                session.loss_percent,
                session.parameters_json,
                session.start_time.to_rfc3339(),
                session.end_time.map(|t| t.to_rfc3339()),
                session.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Fetches a session by id.
    pub fn get(&self, id: &str) -> SessionResult<TrainingSession> {
        let db = self.lock()?;
        Self::get_in(db.conn(), id)
    }

    /// Lists all sessions, most recently started first.
    pub fn list(&self) -> SessionResult<Vec<TrainingSession>> {
        let db = self.lock()?;
        let mut stmt = db.conn().prepare(
            "SELECT id, model_id, dataset_id, status, progress, current_epoch, total_epochs,
                    metric_name, accuracy, loss, accuracy_percent, loss_percent,
                    parameters_json, start_time, end_time, updated_at
             FROM training_sessions ORDER BY start_time DESC",
        )?;
        let sessions = stmt
            .query_map([], session_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    /// Deletes a session by id.
    pub fn delete(&self, id: &str) -> SessionResult<()> {
        let db = self.lock()?;
        let affected =
            db.conn().execute("DELETE FROM training_sessions WHERE id = ?", [id])?;
        if affected == 0 {
            return Err(SessionError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Claims a session for a run: `pending → running`.
    ///
    /// An absent row is treated as implicit pending and a claim row is
    /// inserted (its `model_id` defaults to the session id — there is nothing
    /// else to key the artifact by). Claiming resets `progress` and the
    /// metric fields; a session that is already running or terminal cannot be
    /// claimed again.
    pub fn start(
        &self,
        id: &str,
        dataset_id: &str,
        parameters_json: Option<&str>,
    ) -> SessionResult<TrainingSession> {
        let mut db = self.lock()?;
        let now = Utc::now();
        let claimed = transaction(&mut db, |tx| {
            match Self::get_in(tx, id) {
                Ok(existing) => {
                    if !existing.status.can_transition_to(SessionStatus::Running) {
                        return Err(SessionError::InvalidTransition {
                            id: id.to_string(),
                            from: existing.status,
                            to: SessionStatus::Running,
                        });
                    }
                    tx.execute(
                        r#"
                        UPDATE training_sessions SET
                            status = 'running',
                            dataset_id = ?1,
                            parameters_json = COALESCE(?2, parameters_json),
                            progress = 0,
                            current_epoch = NULL,
                            total_epochs = NULL,
                            metric_name = NULL,
                            accuracy = NULL,
                            loss = NULL,
                            accuracy_percent = NULL,
                            loss_percent = NULL,
                            updated_at = ?3
                        WHERE id = ?4
                        "#,
                        rusqlite::params![dataset_id, parameters_json, now.to_rfc3339(), id],
                    )?;
                }
                Err(SessionError::NotFound(_)) => {
                    debug!(session_id = id, "no pending session document; inserting claim row");
                    let mut session = TrainingSession::new(id, id, dataset_id);
                    session.status = SessionStatus::Running;
                    session.parameters_json = parameters_json.map(str::to_string);
                    tx.execute(
                        r#"
                        INSERT INTO training_sessions
                            (id, model_id, dataset_id, status, progress, parameters_json,
                             start_time, updated_at)
                        VALUES (?1, ?2, ?3, 'running', 0, ?4, ?5, ?6)
                        "#,
                        rusqlite::params![
                            session.id,
                            session.model_id,
                            session.dataset_id,
                            session.parameters_json,
                            session.start_time.to_rfc3339(),
                            session.updated_at.to_rfc3339(),
                        ],
                    )?;
                }
                Err(e) => return Err(e),
            }
            Self::get_in(tx, id)
        })?;
        Ok(claimed)
    }

    /// Records an intermediate progress/metric snapshot.
    ///
    /// Permitted only while the session is running. `progress` is clamped
    /// monotonic against the stored value, so an out-of-order update can
    /// never move the bar backwards.
    pub fn report_progress(&self, id: &str, update: &SessionUpdate) -> SessionResult<()> {
        let mut db = self.lock()?;
        let now = Utc::now();
        transaction(&mut db, |tx| {
            let existing = Self::get_in(tx, id)?;
            if existing.status != SessionStatus::Running {
                return Err(SessionError::NotRunning {
                    id: id.to_string(),
                    status: existing.status,
                });
            }
            apply_merge(tx, id, update, None, now)?;
            Ok(())
        })
    }

    /// Records a terminal outcome with its final metric snapshot.
    ///
    /// Idempotent for a matching outcome: the repeat call is a no-op and
    /// `end_time` keeps its original value. A conflicting outcome after a
    /// terminal state fails with `AlreadyTerminal`.
    pub fn finish(
        &self,
        id: &str,
        outcome: SessionStatus,
        update: &SessionUpdate,
    ) -> SessionResult<()> {
        if !outcome.is_terminal() {
            return Err(SessionError::InvalidTransition {
                id: id.to_string(),
                from: SessionStatus::Running,
                to: outcome,
            });
        }
        let mut db = self.lock()?;
        let now = Utc::now();
        transaction(&mut db, |tx| {
            let existing = Self::get_in(tx, id)?;
            if existing.status == outcome {
                debug!(session_id = id, outcome = %outcome, "finish repeated; no-op");
                return Ok(());
            }
            if existing.status.is_terminal() {
                return Err(SessionError::AlreadyTerminal {
                    id: id.to_string(),
                    status: existing.status,
                });
            }
            if !existing.status.can_transition_to(outcome) {
                return Err(SessionError::InvalidTransition {
                    id: id.to_string(),
                    from: existing.status,
                    to: outcome,
                });
            }
            apply_merge(tx, id, update, Some(outcome), now)?;
            Ok(())
        })
    }

    fn get_in(conn: &rusqlite::Connection, id: &str) -> SessionResult<TrainingSession> {
        let mut stmt = conn.prepare(
            "SELECT id, model_id, dataset_id, status, progress, current_epoch, total_epochs,
                    metric_name, accuracy, loss, accuracy_percent, loss_percent,
                    parameters_json, start_time, end_time, updated_at
             FROM training_sessions WHERE id = ?",
        )?;
        stmt.query_row([id], session_from_row)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => SessionError::NotFound(id.to_string()),
                other => other.into(),
            })
    }
}

/// Applies one atomic partial-merge write.
///
/// Unsupplied fields coalesce to their stored values; `progress` is merged
/// monotonic. When `outcome` is set the write also records the terminal
/// status and stamps `end_time` exactly once.
fn apply_merge(
    tx: &rusqlite::Transaction,
    id: &str,
    update: &SessionUpdate,
    outcome: Option<SessionStatus>,
    now: DateTime<Utc>,
) -> SessionResult<()> {
    tx.execute(
        r#"
        UPDATE training_sessions SET
            status = COALESCE(?1, status),
            progress = MAX(progress, COALESCE(?2, progress)),
            current_epoch = COALESCE(?3, current_epoch),
            total_epochs = COALESCE(?4, total_epochs),
            metric_name = COALESCE(?5, metric_name),
            accuracy = COALESCE(?6, accuracy),
            loss = COALESCE(?7, loss),
            accuracy_percent = COALESCE(?8, accuracy_percent),
            loss_percent = COALESCE(?9, loss_percent),
            end_time = COALESCE(end_time, ?10),
            updated_at = ?11
        WHERE id = ?12
        "#,
        rusqlite::params![
            outcome.map(SessionStatus::as_str),
            update.progress,
            update.current_epoch,
            update.total_epochs,
            update.metric_name,
            update.accuracy,
            update.loss,
            update.accuracy_percent,
            update.loss_percent,
            outcome.map(|_| now.to_rfc3339()),
            now.to_rfc3339(),
            id,
        ],
    )?;
    Ok(())
}

fn transaction<F, R>(db: &mut Database, f: F) -> SessionResult<R>
where
    F: FnOnce(&rusqlite::Transaction) -> SessionResult<R>,
{
    let tx = db.conn_mut().transaction().map_err(StorageError::from)?;
    match f(&tx) {
        Ok(result) => {
            tx.commit().map_err(StorageError::from)?;
            Ok(result)
        }
        Err(e) => {
            tx.rollback().map_err(StorageError::from)?;
            Err(e)
        }
    }
}

fn session_from_row(row: &Row) -> rusqlite::Result<TrainingSession> {
    let status_str: String = row.get(3)?;
    let status = SessionStatus::from_str(&status_str).map_err(|_| {
        rusqlite::Error::InvalidColumnType(3, "status".to_string(), rusqlite::types::Type::Text)
    })?;
    Ok(TrainingSession {
        id: row.get(0)?,
        model_id: row.get(1)?,
        dataset_id: row.get(2)?,
        status,
        progress: row.get(4)?,
        current_epoch: row.get(5)?,
        total_epochs: row.get(6)?,
        metric_name: row.get(7)?,
        accuracy: row.get(8)?,
        loss: row.get(9)?,
        accuracy_percent: row.get(10)?,
        loss_percent: row.get(11)?,
        parameters_json: row.get(12)?,
        start_time: parse_timestamp(row, 13, "start_time")?,
        end_time: parse_optional_timestamp(row, 14, "end_time")?,
        updated_at: parse_timestamp(row, 15, "updated_at")?,
    })
}

fn parse_timestamp(row: &Row, idx: usize, column_name: &str) -> rusqlite::Result<DateTime<Utc>> {
    let timestamp_str: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&timestamp_str).map(|dt| dt.with_timezone(&Utc)).map_err(|_| {
        rusqlite::Error::InvalidColumnType(
            idx,
            column_name.to_string(),
            rusqlite::types::Type::Text,
        )
    })
}

fn parse_optional_timestamp(
    row: &Row,
    idx: usize,
    column_name: &str,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let timestamp_str: Option<String> = row.get(idx)?;
    match timestamp_str {
        Some(s) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|_| {
                rusqlite::Error::InvalidColumnType(
                    idx,
                    column_name.to_string(),
                    rusqlite::types::Type::Text,
                )
            }),
        None => Ok(None),
    }
}
