use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{ReflexError, Result};

use super::SqliteReflexStore;

const SCHEMA_VERSION: i64 = 1;

const MIGRATION_SCHEMA_SQL: &str = r"
    PRAGMA journal_mode = WAL;
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS system_kv (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS reflex_rules (
        uid TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL,
        is_active INTEGER NOT NULL,
        priority INTEGER NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS reflex_triggers (
        rule_uid TEXT NOT NULL,
        uid TEXT NOT NULL,
        position INTEGER NOT NULL,
        level INTEGER NOT NULL,
        description TEXT NOT NULL,
        sample_type_uid TEXT NOT NULL,
        analysis_uids_json TEXT NOT NULL,
        PRIMARY KEY (rule_uid, uid),
        FOREIGN KEY (rule_uid) REFERENCES reflex_rules(uid) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS reflex_decisions (
        rule_uid TEXT NOT NULL,
        uid TEXT NOT NULL,
        trigger_uid TEXT NOT NULL,
        position INTEGER NOT NULL,
        description TEXT NOT NULL,
        priority INTEGER NOT NULL,
        PRIMARY KEY (rule_uid, uid),
        FOREIGN KEY (rule_uid, trigger_uid)
            REFERENCES reflex_triggers(rule_uid, uid) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS reflex_rule_groups (
        rule_uid TEXT NOT NULL,
        uid TEXT NOT NULL,
        decision_uid TEXT NOT NULL,
        position INTEGER NOT NULL,
        description TEXT NOT NULL,
        priority INTEGER NOT NULL,
        PRIMARY KEY (rule_uid, uid),
        FOREIGN KEY (rule_uid, decision_uid)
            REFERENCES reflex_decisions(rule_uid, uid) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS reflex_group_rules (
        rule_uid TEXT NOT NULL,
        uid TEXT NOT NULL,
        group_uid TEXT NOT NULL,
        position INTEGER NOT NULL,
        analysis_uid TEXT NOT NULL,
        operator TEXT NOT NULL,
        value_json TEXT NOT NULL,
        priority INTEGER NOT NULL,
        node_id TEXT,
        PRIMARY KEY (rule_uid, group_uid, uid),
        FOREIGN KEY (rule_uid, group_uid)
            REFERENCES reflex_rule_groups(rule_uid, uid) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS reflex_actions (
        rule_uid TEXT NOT NULL,
        uid TEXT NOT NULL,
        decision_uid TEXT NOT NULL,
        position INTEGER NOT NULL,
        action_type TEXT NOT NULL,
        analysis_uid TEXT NOT NULL,
        count INTEGER,
        value_json TEXT,
        PRIMARY KEY (rule_uid, decision_uid, uid),
        FOREIGN KEY (rule_uid, decision_uid)
            REFERENCES reflex_decisions(rule_uid, uid) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS reflex_layout (
        rule_uid TEXT NOT NULL,
        node_id TEXT NOT NULL,
        x REAL NOT NULL,
        y REAL NOT NULL,
        PRIMARY KEY (rule_uid, node_id),
        FOREIGN KEY (rule_uid) REFERENCES reflex_rules(uid) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS applied_decisions (
        sample_uid TEXT NOT NULL,
        rule_uid TEXT NOT NULL,
        decision_uid TEXT NOT NULL,
        applied_at TEXT NOT NULL,
        PRIMARY KEY (sample_uid, rule_uid, decision_uid)
    );

    CREATE INDEX IF NOT EXISTS idx_reflex_decisions_trigger
    ON reflex_decisions(rule_uid, trigger_uid);
";

impl SqliteReflexStore {
    pub fn migrate(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(MIGRATION_SCHEMA_SQL)?;
            ensure_schema_version(conn)
        })
    }
}

fn ensure_schema_version(conn: &Connection) -> Result<()> {
    let stored = conn
        .query_row(
            "SELECT value FROM system_kv WHERE key = 'schema_version'",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    match stored {
        None => {
            conn.execute(
                "INSERT INTO system_kv(key, value, updated_at) VALUES ('schema_version', ?1, ?2)",
                params![SCHEMA_VERSION.to_string(), chrono::Utc::now().to_rfc3339()],
            )?;
            Ok(())
        }
        Some(raw) if raw.parse::<i64>().ok() == Some(SCHEMA_VERSION) => Ok(()),
        Some(raw) => Err(ReflexError::Validation(format!(
            "unsupported reflex store schema version {raw}; expected {SCHEMA_VERSION}"
        ))),
    }
}
