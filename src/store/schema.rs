/// Idempotent DDL for the seven persisted tables (spec §6.3).
use rusqlite::Connection;

use crate::error::EngineResult;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS by_type (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    type_name TEXT NOT NULL,
    json      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_by_type_type_name ON by_type(type_name);

CREATE TABLE IF NOT EXISTS relations (
    from_id  INTEGER NOT NULL,
    to_id    INTEGER NOT NULL,
    relation TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_relations_from ON relations(from_id, relation);
CREATE INDEX IF NOT EXISTS idx_relations_to ON relations(to_id);

CREATE TABLE IF NOT EXISTS operations (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    operation_type TEXT NOT NULL,
    current        INTEGER NOT NULL DEFAULT 0,
    next_operation INTEGER NOT NULL DEFAULT -1
);
CREATE INDEX IF NOT EXISTS idx_operations_current ON operations(current);

CREATE TABLE IF NOT EXISTS by_type_history (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    operation_id INTEGER NOT NULL,
    by_type_id   INTEGER NOT NULL,
    type_name    TEXT NOT NULL,
    before_json  TEXT NOT NULL,
    after_json   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_by_type_history_op ON by_type_history(operation_id);

CREATE TABLE IF NOT EXISTS relations_history_before (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    operation_id INTEGER NOT NULL,
    from_id      INTEGER NOT NULL,
    to_id        INTEGER NOT NULL,
    relation     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_relations_history_before_op ON relations_history_before(operation_id);

CREATE TABLE IF NOT EXISTS relations_history_after (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    operation_id INTEGER NOT NULL,
    from_id      INTEGER NOT NULL,
    to_id        INTEGER NOT NULL,
    relation     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_relations_history_after_op ON relations_history_after(operation_id);

CREATE TABLE IF NOT EXISTS undo_transactions (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    undo_operation_start  INTEGER NOT NULL,
    undo_operation_end    INTEGER NOT NULL,
    current               INTEGER NOT NULL DEFAULT 0,
    next_undo_transaction INTEGER NOT NULL DEFAULT -1
);
CREATE INDEX IF NOT EXISTS idx_undo_transactions_current ON undo_transactions(current);

CREATE TABLE IF NOT EXISTS completions (
    type_name TEXT NOT NULL,
    property  TEXT NOT NULL,
    label     TEXT NOT NULL,
    UNIQUE(type_name, property, label)
);
CREATE INDEX IF NOT EXISTS idx_completions_prefix ON completions(type_name, property, label);
"#;

/// Create all tables and indexes if they do not already exist.
pub fn init(conn: &Connection) -> EngineResult<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init(&conn).unwrap();
        init(&conn).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'by_type'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
