/// The engine façade (spec §2 "Data flow", §4.5): wires the store, the
/// repository, the history writer, the undo/redo cursor, the transaction
/// bracket, and the completion index into the public API a host calls.
use std::cell::Cell;
use std::path::Path;

use parking_lot::ReentrantMutexGuard;
use rusqlite::Connection;
use tracing::warn;

use crate::completion;
use crate::error::EngineResult;
use crate::history::{self, OpType};
use crate::model::Persistable;
use crate::repository;
use crate::store::SqliteStore;
use crate::transaction;
use crate::traversal::{self, VisitSet};
use crate::undo::{self, UndoRedoOutcome};

/// An owned persistence engine over one SQLite database.
///
/// `Persister` holds no in-memory mirror of persisted state (spec §5):
/// every call hits the store. It is not thread-safe in the sense of
/// allowing concurrent distinct callers — see [`SqliteStore`] — but a
/// single caller may re-enter it from within a `save_related`/
/// `delete_related` callback without deadlocking.
pub struct Persister {
    store: SqliteStore,
    bracket_depth: Cell<u32>,
    visiting: VisitSet,
}

impl Persister {
    /// Open (creating if absent) a database file.
    pub fn open(path: impl AsRef<Path>) -> EngineResult<Self> {
        Ok(Self {
            store: SqliteStore::open(path)?,
            bracket_depth: Cell::new(0),
            visiting: VisitSet::new(),
        })
    }

    /// Open a private in-memory database, primarily for tests and demos.
    pub fn open_in_memory() -> EngineResult<Self> {
        Ok(Self {
            store: SqliteStore::open_in_memory()?,
            bracket_depth: Cell::new(0),
            visiting: VisitSet::new(),
        })
    }

    pub(crate) fn connection(&self) -> ReentrantMutexGuard<'_, Connection> {
        self.store.lock()
    }

    pub(crate) fn bracket_depth(&self) -> u32 {
        self.bracket_depth.get()
    }

    pub(crate) fn enter_bracket(&self) {
        self.bracket_depth.set(self.bracket_depth.get() + 1);
    }

    pub(crate) fn exit_bracket(&self) {
        self.bracket_depth.set(self.bracket_depth.get().saturating_sub(1));
    }

    fn hydrate<T: Persistable>(&self, mut items: Vec<T>) -> EngineResult<Vec<T>> {
        for item in &mut items {
            item.initialize(self)?;
        }
        Ok(items)
    }

    fn hydrate_one<T: Persistable>(&self, item: Option<T>) -> EngineResult<Option<T>> {
        match item {
            Some(mut item) => {
                item.initialize(self)?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    /// All vertices of `T::type_name()`, in insertion order.
    pub fn retrieve<T: Persistable>(&self) -> EngineResult<Vec<T>> {
        let guard = self.connection();
        let items = repository::retrieve::<T>(&guard)?;
        self.hydrate(items)
    }

    /// Paginated retrieve (spec §4.1).
    pub fn retrieve_page<T: Persistable>(&self, start: i64, limit: i64) -> EngineResult<Vec<T>> {
        let guard = self.connection();
        let items = repository::retrieve_page::<T>(&guard, start, limit)?;
        self.hydrate(items)
    }

    /// A single vertex by id, or `None` if absent or of another type.
    pub fn retrieve_by_id<T: Persistable>(&self, id: i64) -> EngineResult<Option<T>> {
        let guard = self.connection();
        let item = repository::retrieve_by_id::<T>(&guard, id)?;
        self.hydrate_one(item)
    }

    /// Vertices of `T` reached from `from_id` via edges labeled `property`.
    pub fn related<T: Persistable>(&self, from_id: Option<i64>, property: &str) -> EngineResult<Vec<T>> {
        let guard = self.connection();
        let items = repository::related::<T>(&guard, from_id, property)?;
        self.hydrate(items)
    }

    /// [`Persister::related`] restricted to exactly one result.
    pub fn related_item<T: Persistable>(&self, from_id: Option<i64>, property: &str) -> EngineResult<Option<T>> {
        let guard = self.connection();
        let item = repository::related_item::<T>(&guard, from_id, property)?;
        self.hydrate_one(item)
    }

    /// Replace the `(from_id, property)` edge set with `items`, saving each
    /// item first (if `recurse`) so its id exists.
    pub fn save_relations<T: Persistable>(
        &self,
        from_id: i64,
        items: &mut [T],
        property: &str,
        recurse: bool,
    ) -> EngineResult<()> {
        if recurse {
            for item in items.iter_mut() {
                self.save_impl(item, true)?;
            }
        }
        let guard = self.connection();
        let ids: Vec<i64> = items.iter().filter_map(Persistable::id).collect();
        repository::replace_edges(&guard, from_id, property, &ids)
    }

    /// Replace the `(from_id, property)` to-one edge with `item`, if any.
    pub fn save_relation<T: Persistable>(
        &self,
        from_id: i64,
        item: &mut Option<T>,
        property: &str,
        recurse: bool,
    ) -> EngineResult<()> {
        if let Some(obj) = item.as_mut() {
            if recurse {
                self.save_impl(obj, true)?;
            }
        }
        let guard = self.connection();
        let ids: Vec<i64> = item.as_ref().and_then(Persistable::id).into_iter().collect();
        repository::replace_edges(&guard, from_id, property, &ids)
    }

    /// Save `obj`: create it if unsaved, otherwise update it. Runs inside
    /// the transaction bracket (spec §4.4); a no-op update is detected and
    /// suppressed rather than recorded.
    pub fn save<T: Persistable>(&self, obj: &mut T) -> EngineResult<()> {
        transaction::with_undo_transaction(self, || self.save_impl(obj, false))
    }

    /// Recursive, transaction-bracketed save: `obj` plus every outbound edge
    /// collection it declares, saved through the full path (spec §4.5).
    pub fn save_all<T: Persistable>(&self, obj: &mut T) -> EngineResult<()> {
        transaction::with_undo_transaction(self, || self.save_impl(obj, true))
    }

    fn save_impl<T: Persistable>(&self, obj: &mut T, recurse: bool) -> EngineResult<()> {
        let Some(_guard) = traversal::enter(&self.visiting, &*obj) else {
            return Ok(());
        };

        let new_json = obj.to_scalar_json()?.to_string();

        let (id, op_type, before_json) = {
            let guard = self.connection();
            match obj.id() {
                None => {
                    let id = repository::insert_vertex(&guard, T::type_name(), &new_json)?;
                    obj.set_id(id);
                    (id, OpType::Create, String::new())
                }
                Some(id) => {
                    let before = repository::read_vertex(&guard, id)?
                        .map(|(_, json)| json)
                        .unwrap_or_default();
                    repository::update_vertex(&guard, id, &new_json)?;
                    (id, OpType::Update, before)
                }
            }
        };

        let op_id = {
            let guard = self.connection();
            let op_id = history::record_operation(&guard, op_type)?;
            history::snapshot_edges_before(&guard, op_id, id)?;
            op_id
        };

        obj.save_related(self, recurse)?;

        let guard = self.connection();
        history::snapshot_edges_after(&guard, op_id, id)?;
        history::record_vertex_history(&guard, op_id, id, T::type_name(), &before_json, &new_json)?;

        Ok(())
    }

    /// Delete `obj`. Missing identifier (never saved) is a silent no-op
    /// (spec §7, kind 5), not an error.
    pub fn delete<T: Persistable>(&self, obj: &T) -> EngineResult<()> {
        transaction::with_undo_transaction(self, || self.delete_impl(obj, false))
    }

    /// Transaction-bracketed cascading delete: `obj` plus every child the
    /// user model's `delete_related` enumerates (spec §4.5).
    pub fn delete_all<T: Persistable>(&self, obj: &T) -> EngineResult<()> {
        transaction::with_undo_transaction(self, || self.delete_impl(obj, true))
    }

    fn delete_impl<T: Persistable>(&self, obj: &T, recurse: bool) -> EngineResult<()> {
        let Some(id) = obj.id() else {
            return Ok(());
        };
        let Some(_guard) = traversal::enter(&self.visiting, obj) else {
            return Ok(());
        };

        let before_json = {
            let guard = self.connection();
            repository::read_vertex(&guard, id)?
                .map(|(_, json)| json)
                .unwrap_or_default()
        };

        let op_id = {
            let guard = self.connection();
            let op_id = history::record_operation(&guard, OpType::Delete)?;
            history::snapshot_edges_before(&guard, op_id, id)?;
            op_id
        };

        if recurse {
            obj.delete_related(self)?;
        }

        let guard = self.connection();
        repository::delete_vertex_row(&guard, id)?;
        repository::delete_incident_edges(&guard, id)?;
        history::snapshot_edges_after(&guard, op_id, id)?;
        history::record_vertex_history(&guard, op_id, id, T::type_name(), &before_json, "")?;

        Ok(())
    }

    /// Undo the current transaction. No-op if there is none. Replay
    /// failures are logged, not propagated (spec §7, kind 4).
    pub fn undo(&self) -> Option<UndoRedoOutcome> {
        let guard = self.connection();
        let conn: &Connection = &guard;
        if let Err(e) = conn.execute_batch("BEGIN") {
            warn!(error = %e, "failed to start undo transaction");
            return None;
        }
        match undo::undo(conn) {
            Ok(outcome) => {
                let _ = conn.execute_batch("COMMIT");
                outcome
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                warn!(error = %e, "undo replay failed; rolled back");
                None
            }
        }
    }

    /// Redo the next transaction. No-op if there is none.
    pub fn redo(&self) -> Option<UndoRedoOutcome> {
        let guard = self.connection();
        let conn: &Connection = &guard;
        if let Err(e) = conn.execute_batch("BEGIN") {
            warn!(error = %e, "failed to start redo transaction");
            return None;
        }
        match undo::redo(conn) {
            Ok(outcome) => {
                let _ = conn.execute_batch("COMMIT");
                outcome
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                warn!(error = %e, "redo replay failed; rolled back");
                None
            }
        }
    }

    /// Upsert a completion label for autocomplete (spec §4.6).
    pub fn index_completion(&self, type_name: &str, property: &str, label: &str) -> EngineResult<()> {
        let guard = self.connection();
        completion::index(&guard, type_name, property, label)
    }

    /// All labels matching `type_name`/`property` with the given prefix.
    pub fn completions(&self, type_name: &str, property: &str, prefix: &str) -> EngineResult<Vec<String>> {
        let guard = self.connection();
        completion::search(&guard, type_name, property, prefix)
    }
}
