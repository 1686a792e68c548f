/// Completion index (spec §4.6): prefix lookup over labels a user model
/// chooses to index, independent of vertex storage.
use rusqlite::Connection;

use crate::error::EngineResult;
use crate::store::util::{execute, iterate};

/// Escape `%` and `_`, SQLite's `LIKE` wildcards, in a literal prefix.
fn escape_like(prefix: &str) -> String {
    prefix.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

/// Record `label` under `(type_name, property)`. Re-indexing the same label
/// is a no-op (spec §4.6: the index stores each label once per property).
pub fn index(conn: &Connection, type_name: &str, property: &str, label: &str) -> EngineResult<()> {
    execute(
        conn,
        "INSERT OR IGNORE INTO completions (type_name, property, label) VALUES (?1, ?2, ?3)",
        rusqlite::params![type_name, property, label],
    )?;
    Ok(())
}

/// Every label under `(type_name, property)` starting with `prefix`, in
/// lexical order. An empty prefix returns every indexed label.
pub fn search(conn: &Connection, type_name: &str, property: &str, prefix: &str) -> EngineResult<Vec<String>> {
    let pattern = format!("{}%", escape_like(prefix));
    iterate(
        conn,
        "SELECT label FROM completions \
         WHERE type_name = ?1 AND property = ?2 AND label LIKE ?3 ESCAPE '\\' \
         ORDER BY label",
        rusqlite::params![type_name, property, pattern],
        |row| row.get(0),
    )
}
