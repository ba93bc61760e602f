//! Database connection and schema management.

use rusqlite::Connection;
use tracing::debug;

use crate::storage::error::StorageResult;

/// Database connection wrapper.
///
/// Manages the SQLite connection and schema initialization.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a new database connection at the specified path.
    ///
    /// # Errors
    /// * `StorageError::Connection` - If the database connection fails
    pub fn open(path: &str) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Opens an in-memory database for testing.
    ///
    /// # Errors
    /// * `StorageError::Connection` - If the database connection fails
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Gets a reference to the underlying connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Gets a mutable reference to the underlying connection.
    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Initializes the database schema.
    ///
    /// # Errors
    /// * `StorageError::Connection` - If schema creation fails
    fn init_schema(&self) -> StorageResult<()> {
        debug!("Initializing session store schema");

        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS training_sessions (
                id TEXT PRIMARY KEY,
                model_id TEXT NOT NULL,
                dataset_id TEXT NOT NULL,
                status TEXT NOT NULL,
                progress REAL NOT NULL DEFAULT 0,
                current_epoch INTEGER,
                total_epochs INTEGER,
                metric_name TEXT,
                accuracy REAL,
                loss REAL,
                accuracy_percent REAL,
                loss_percent REAL,
                parameters_json TEXT,
                start_time TEXT NOT NULL,
                end_time TEXT,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_training_sessions_status ON training_sessions(status)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_training_sessions_model_id ON training_sessions(model_id)",
            [],
        )?;

        Ok(())
    }

    /// Runs a transaction with the provided closure.
    ///
    /// Commits when the closure returns `Ok`, rolls back otherwise.
    ///
    /// # Errors
    /// * `StorageError::Connection` - If the transaction fails
    pub fn transaction<F, R>(&mut self, f: F) -> StorageResult<R>
    where
        F: FnOnce(&rusqlite::Transaction) -> StorageResult<R>,
    {
        let tx = self.conn.transaction()?;
        match f(&tx) {
            Ok(result) => {
                tx.commit()?;
                Ok(result)
            }
            Err(e) => {
                tx.rollback()?;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        let mut stmt =
            db.conn().prepare("SELECT name FROM sqlite_master WHERE type='table'").unwrap();
        let tables: Vec<String> =
            stmt.query_map([], |row| row.get(0)).unwrap().map(|r| r.unwrap()).collect();

        assert!(tables.contains(&"training_sessions".to_string()));
    }

    #[test]
    fn test_database_open_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("epoch-test.db");

        let _db = Database::open(path.to_str().unwrap()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_database_schema_idempotent() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("epoch-test.db");

        // Opening the same database twice must not fail
        drop(Database::open(path.to_str().unwrap()).unwrap());
        let db = Database::open(path.to_str().unwrap()).unwrap();

        let count: i64 = db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='training_sessions'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_database_indexes_created() {
        let db = Database::open_in_memory().unwrap();

        let mut stmt = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%'")
            .unwrap();
        let indexes: Vec<String> =
            stmt.query_map([], |row| row.get(0)).unwrap().map(|r| r.unwrap()).collect();

        assert!(indexes.contains(&"idx_training_sessions_status".to_string()));
        assert!(indexes.contains(&"idx_training_sessions_model_id".to_string()));
    }

    #[test]
    fn test_database_transaction_rollback() {
        let mut db = Database::open_in_memory().unwrap();

        let result: StorageResult<()> = db.transaction(|tx| {
            tx.execute(
                "INSERT INTO training_sessions (id, model_id, dataset_id, status, start_time, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                rusqlite::params![
                    "sess-rollback",
                    "model-1",
                    "classification-demo",
                    "pending",
                    "2026-01-01T00:00:00Z",
                    "2026-01-01T00:00:00Z"
                ],
            )?;
            Err(crate::storage::error::StorageError::InvalidData("simulated".to_string()))
        });
        assert!(result.is_err());

        let mut stmt =
            db.conn().prepare("SELECT id FROM training_sessions WHERE id = ?").unwrap();
        assert!(!stmt.exists(rusqlite::params!["sess-rollback"]).unwrap());
    }

    #[test]
    fn test_database_transaction_commit() {
        let mut db = Database::open_in_memory().unwrap();

        db.transaction(|tx| {
            tx.execute(
                "INSERT INTO training_sessions (id, model_id, dataset_id, status, start_time, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                rusqlite::params![
                    "sess-commit",
                    "model-1",
                    "classification-demo",
                    "pending",
                    "2026-01-01T00:00:00Z",
                    "2026-01-01T00:00:00Z"
                ],
            )?;
            Ok(())
        })
        .unwrap();

        let mut stmt =
            db.conn().prepare("SELECT id FROM training_sessions WHERE id = ?").unwrap();
        assert!(stmt.exists(rusqlite::params!["sess-commit"]).unwrap());
    }
}
