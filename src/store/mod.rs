/// Store façade: a thin binding over the relational engine.
///
/// This module is the one piece of the crate that is allowed to know SQL.
/// Everything above it (`repository`, `history`, `undo`, `transaction`,
/// `completion`) only ever sees `&rusqlite::Connection` plus the small set
/// of generic helpers in [`util`] — scalar/pluck/iterate/insert — so the
/// relational engine can be swapped without touching replay logic.
pub mod schema;
pub mod util;

use std::path::Path;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use rusqlite::Connection;

use crate::error::EngineResult;

/// Owns the single connection to the backing SQLite database.
///
/// A [`ReentrantMutex`] guards the connection rather than a plain `Mutex`:
/// the engine is explicitly single-threaded (spec §5), but nested calls
/// from within a user model's `save_related`/`delete_related` callback (see
/// `Persistable`) re-enter the engine on the same call stack and must not
/// deadlock against the bracket that is already holding the connection.
pub struct SqliteStore {
    conn: ReentrantMutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if absent) a database file and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> EngineResult<Self> {
        let conn = Connection::open(path)?;
        schema::init(&conn)?;
        Ok(Self {
            conn: ReentrantMutex::new(conn),
        })
    }

    /// Open a private in-memory database, primarily for tests.
    pub fn open_in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init(&conn)?;
        Ok(Self {
            conn: ReentrantMutex::new(conn),
        })
    }

    /// Acquire the connection. Reentrant on the calling thread.
    pub(crate) fn lock(&self) -> ReentrantMutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_creates_schema() {
        let store = SqliteStore::open_in_memory().unwrap();
        let guard = store.lock();
        let count: i64 = guard
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(count >= 7);
    }

    #[test]
    fn lock_is_reentrant_on_same_thread() {
        let store = SqliteStore::open_in_memory().unwrap();
        let outer = store.lock();
        let inner = store.lock();
        let _: &Connection = &inner;
        drop(inner);
        let _: &Connection = &outer;
    }
}
