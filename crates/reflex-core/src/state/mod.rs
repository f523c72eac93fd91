use std::path::Path;
#[cfg(unix)]
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::apply::AppliedDecisionLedger;
use crate::error::{ReflexError, Result};

mod migration;
mod rules;

/// SQLite persistence for reflex rules and the applied-decision ledger.
#[derive(Clone)]
pub struct SqliteReflexStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteReflexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteReflexStore").finish_non_exhaustive()
    }
}

impl SqliteReflexStore {
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| ReflexError::mutex_poisoned("sqlite"))?;
        f(&conn)
    }

    fn with_tx<T>(&self, f: impl FnOnce(&rusqlite::Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| ReflexError::mutex_poisoned("sqlite"))?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        drop(conn);
        Ok(value)
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        #[cfg(unix)]
        harden_sqlite_permissions(path)?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn applied_at(
        &self,
        sample_uid: &str,
        rule_uid: &str,
        decision_uid: &str,
    ) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let value = conn
                .query_row(
                    r"
                    SELECT applied_at FROM applied_decisions
                    WHERE sample_uid = ?1 AND rule_uid = ?2 AND decision_uid = ?3
                    ",
                    params![sample_uid, rule_uid, decision_uid],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(value)
        })
    }

    /// Forgets every decision applied to a sample, so a later pass may fire
    /// them again.
    pub fn clear_applied(&self, sample_uid: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "DELETE FROM applied_decisions WHERE sample_uid = ?1",
                params![sample_uid],
            )?;
            Ok(affected)
        })
    }
}

impl AppliedDecisionLedger for SqliteReflexStore {
    fn is_applied(&self, sample_uid: &str, rule_uid: &str, decision_uid: &str) -> Result<bool> {
        Ok(self
            .applied_at(sample_uid, rule_uid, decision_uid)?
            .is_some())
    }

    fn record_applied(&self, sample_uid: &str, rule_uid: &str, decision_uid: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                r"
                INSERT INTO applied_decisions(sample_uid, rule_uid, decision_uid, applied_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(sample_uid, rule_uid, decision_uid) DO NOTHING
                ",
                params![sample_uid, rule_uid, decision_uid, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
    }
}

#[cfg(unix)]
fn harden_sqlite_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    for suffix in ["", "-wal", "-shm"] {
        let mut os = path.as_os_str().to_os_string();
        os.push(suffix);
        let candidate = PathBuf::from(os);
        if candidate.exists() {
            std::fs::set_permissions(candidate, std::fs::Permissions::from_mode(0o600))?;
        }
    }
    Ok(())
}
