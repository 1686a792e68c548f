/// Undo/redo cursor (spec §4.3): the `operations`/`undo_transactions` linked
/// lists and the replay of stored images in either direction.
use rusqlite::Connection;

use crate::error::EngineResult;
use crate::history::{edges_after, edges_before, operation_type, predecessor_of, set_current_operation, vertex_history, OpType};
use crate::repository::{self, EdgeRow};
use crate::store::util::{execute, insert, pluck, scalar};

/// The id of the transaction currently marked `is_current`, if any.
pub fn current_transaction_id(conn: &Connection) -> EngineResult<Option<i64>> {
    scalar(conn, "SELECT id FROM undo_transactions WHERE current = 1", [])
}

/// `(undo_operation_start, undo_operation_end)` for a transaction.
pub fn transaction_span(conn: &Connection, tx_id: i64) -> EngineResult<(i64, i64)> {
    let row = pluck(
        conn,
        "SELECT undo_operation_start, undo_operation_end FROM undo_transactions WHERE id = ?1",
        [tx_id],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
    )?;
    Ok(row.unwrap_or((0, 0)))
}

/// The transaction this one points to via `next_undo_transaction` (`-1` maps
/// to `None`).
fn next_undo_transaction_of(conn: &Connection, tx_id: i64) -> EngineResult<Option<i64>> {
    let next: Option<i64> = scalar(
        conn,
        "SELECT next_undo_transaction FROM undo_transactions WHERE id = ?1",
        [tx_id],
    )?;
    Ok(next.filter(|&n| n != -1))
}

/// The transaction whose `next_undo_transaction` equals `tx_id`, i.e. its
/// predecessor.
fn predecessor_transaction_of(conn: &Connection, tx_id: i64) -> EngineResult<Option<i64>> {
    scalar(
        conn,
        "SELECT id FROM undo_transactions WHERE next_undo_transaction = ?1",
        [tx_id],
    )
}

/// The first transaction in insertion order, if any exist.
fn first_transaction(conn: &Connection) -> EngineResult<Option<i64>> {
    scalar(conn, "SELECT MIN(id) FROM undo_transactions", [])
}

/// The first operation belonging to a transaction whose span starts
/// (exclusively) at `start`. `start == 0` means "from the very beginning."
fn first_operation_after(conn: &Connection, start: i64) -> EngineResult<Option<i64>> {
    if start == 0 {
        scalar(conn, "SELECT MIN(id) FROM operations", [])
    } else {
        let next: Option<i64> = scalar(
            conn,
            "SELECT next_operation FROM operations WHERE id = ?1",
            [start],
        )?;
        Ok(next.filter(|&n| n != -1))
    }
}

/// The operation after `operation_id` in the forward chain, if any.
fn next_operation_of(conn: &Connection, operation_id: i64) -> EngineResult<Option<i64>> {
    let next: Option<i64> = scalar(
        conn,
        "SELECT next_operation FROM operations WHERE id = ?1",
        [operation_id],
    )?;
    Ok(next.filter(|&n| n != -1))
}

/// Move the transaction `is_current` marker.
pub fn set_current_transaction(conn: &Connection, tx_id: Option<i64>) -> EngineResult<()> {
    execute(conn, "UPDATE undo_transactions SET current = 0 WHERE current = 1", [])?;
    if let Some(id) = tx_id {
        execute(conn, "UPDATE undo_transactions SET current = 1 WHERE id = ?1", [id])?;
    }
    Ok(())
}

/// Insert a new transaction row spanning `(start, end]` and link it into the
/// chain, mirroring [`crate::history::record_operation`]'s bootstrapping
/// rules (spec §9, applied symmetrically to transactions).
pub fn record_transaction(conn: &Connection, start: i64, end: i64) -> EngineResult<i64> {
    let prev_current: Option<i64> =
        scalar(conn, "SELECT id FROM undo_transactions WHERE current = 1", [])?;
    let existing_head: Option<i64> = scalar(conn, "SELECT MIN(id) FROM undo_transactions", [])?;

    let new_id = insert(
        conn,
        "INSERT INTO undo_transactions \
         (undo_operation_start, undo_operation_end, current, next_undo_transaction) \
         VALUES (?1, ?2, 0, -1)",
        rusqlite::params![start, end],
    )?;

    match prev_current {
        Some(prev_id) => {
            execute(
                conn,
                "UPDATE undo_transactions SET next_undo_transaction = ?1, current = 0 WHERE id = ?2",
                rusqlite::params![new_id, prev_id],
            )?;
        }
        None => {
            if let Some(head_id) = existing_head {
                if head_id != new_id {
                    execute(
                        conn,
                        "UPDATE undo_transactions SET next_undo_transaction = ?1 WHERE id = ?2",
                        rusqlite::params![new_id, head_id],
                    )?;
                }
            }
        }
    }

    execute(
        conn,
        "UPDATE undo_transactions SET current = 1 WHERE id = ?1",
        [new_id],
    )?;

    Ok(new_id)
}

/// Replay one operation's stored image — spec §4.3 `apply`. `blob` and
/// `edges` are the before- or after- image selected by the caller
/// (undo always passes `before_json`/`relations_history_before`; redo always
/// passes `after_json`/`relations_history_after`).
fn apply(
    conn: &Connection,
    op_type: OpType,
    by_type_id: i64,
    type_name: &str,
    blob: &str,
    edges: &[EdgeRow],
) -> EngineResult<()> {
    match op_type {
        OpType::Create => {
            repository::insert_vertex_with_id(conn, by_type_id, type_name, blob)?;
            repository::delete_incident_edges(conn, by_type_id)?;
            for edge in edges {
                repository::insert_edge(conn, edge.from_id, edge.to_id, &edge.relation)?;
            }
        }
        OpType::Update => {
            repository::update_vertex(conn, by_type_id, blob)?;
            repository::delete_incident_edges(conn, by_type_id)?;
            for edge in edges {
                repository::insert_edge(conn, edge.from_id, edge.to_id, &edge.relation)?;
            }
        }
        OpType::Delete => {
            repository::delete_vertex_row(conn, by_type_id)?;
            repository::delete_incident_edges(conn, by_type_id)?;
        }
    }
    Ok(())
}

/// What an `undo`/`redo` call affected, for callers that want to observe it
/// (spec §8, S3: "undo() returns an update op").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndoRedoOutcome {
    pub op_type: OpType,
    pub operation_id: i64,
}

/// Undo the current transaction, replaying its operations' inverses from
/// `undo_operation_end` back to (but not including) `undo_operation_start`.
/// No-op (returns `None`) if there is no current transaction (spec §4.3,
/// tie-breaks). A replay failure partway through is propagated rather than
/// swallowed, so the caller's outer bracket rolls back every write the
/// partial replay already made instead of committing them with the cursor
/// left pointing at the wrong transaction (spec §4.3, §7 kind 4).
pub fn undo(conn: &Connection) -> EngineResult<Option<UndoRedoOutcome>> {
    let Some(tx_id) = current_transaction_id(conn)? else {
        return Ok(None);
    };
    let (start, end) = transaction_span(conn, tx_id)?;

    let outcome = undo_operations(conn, start, end)?;
    let prev_tx = predecessor_transaction_of(conn, tx_id)?;
    set_current_transaction(conn, prev_tx)?;
    Ok(outcome)
}

fn undo_operations(conn: &Connection, start: i64, end: i64) -> EngineResult<Option<UndoRedoOutcome>> {
    if end == 0 || end == start {
        return Ok(None);
    }
    let mut op_id = end;
    let mut last_type = None;
    loop {
        let op_type = operation_type(conn, op_id)?;
        if last_type.is_none() {
            last_type = Some(op_type);
        }
        let hist = vertex_history(conn, op_id)?
            .ok_or_else(|| crate::error::EngineError::InvalidState(format!("missing vertex history for operation {op_id}")))?;
        let edges = edges_before(conn, op_id)?;
        apply(conn, op_type.inverse(), hist.by_type_id, &hist.type_name, &hist.before_json, &edges)?;

        let pred = predecessor_of(conn, op_id)?.unwrap_or(0);
        set_current_operation(conn, if pred == 0 { None } else { Some(pred) })?;

        if pred == start || pred == 0 {
            break;
        }
        op_id = pred;
    }
    Ok(last_type.map(|op_type| UndoRedoOutcome { op_type, operation_id: end }))
}

/// Redo the next transaction: the current transaction's successor, or the
/// first transaction if none is current (spec §4.3, tie-breaks). No-op if
/// there is nothing to redo. A replay failure partway through is propagated
/// rather than swallowed, for the same reason as in [`undo`].
pub fn redo(conn: &Connection) -> EngineResult<Option<UndoRedoOutcome>> {
    let current_tx = current_transaction_id(conn)?;
    let target_tx = match current_tx {
        Some(tx_id) => next_undo_transaction_of(conn, tx_id)?,
        None => first_transaction(conn)?,
    };
    let Some(tx_id) = target_tx else {
        return Ok(None);
    };
    let (start, end) = transaction_span(conn, tx_id)?;

    let outcome = redo_operations(conn, start, end)?;
    set_current_transaction(conn, Some(tx_id))?;
    Ok(outcome)
}

fn redo_operations(conn: &Connection, start: i64, end: i64) -> EngineResult<Option<UndoRedoOutcome>> {
    let Some(mut op_id) = first_operation_after(conn, start)? else {
        return Ok(None);
    };
    let mut last_type = None;
    loop {
        let op_type = operation_type(conn, op_id)?;
        last_type = Some(op_type);
        let hist = vertex_history(conn, op_id)?
            .ok_or_else(|| crate::error::EngineError::InvalidState(format!("missing vertex history for operation {op_id}")))?;
        let edges = edges_after(conn, op_id)?;
        apply(conn, op_type, hist.by_type_id, &hist.type_name, &hist.after_json, &edges)?;
        set_current_operation(conn, Some(op_id))?;

        if op_id == end {
            break;
        }
        match next_operation_of(conn, op_id)? {
            Some(next) => op_id = next,
            None => break,
        }
    }
    Ok(last_type.map(|op_type| UndoRedoOutcome { op_type, operation_id: end }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::record_operation;
    use crate::store::SqliteStore;

    fn record_create(conn: &Connection, type_name: &str, json: &str) -> i64 {
        let id = repository::insert_vertex(conn, type_name, json).unwrap();
        let op_id = record_operation(conn, OpType::Create).unwrap();
        crate::history::record_vertex_history(conn, op_id, id, type_name, "", json).unwrap();
        crate::history::snapshot_edges_after(conn, op_id, id).unwrap();
        op_id
    }

    #[test]
    fn undo_with_no_transaction_is_noop() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock();
        assert!(undo(&conn).unwrap().is_none());
    }

    #[test]
    fn redo_with_no_transactions_is_noop() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock();
        assert!(redo(&conn).unwrap().is_none());
    }

    #[test]
    fn undo_then_redo_restores_created_vertex() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock();

        let start = 0;
        let end = record_create(&conn, "Widget", r#"{"label":"a"}"#);
        record_transaction(&conn, start, end).unwrap();

        let outcome = undo(&conn).unwrap().unwrap();
        assert_eq!(outcome.op_type, OpType::Create);
        let remaining: i64 = scalar(&conn, "SELECT count(*) FROM by_type", []).unwrap().unwrap();
        assert_eq!(remaining, 0);

        redo(&conn).unwrap().unwrap();
        let remaining: i64 = scalar(&conn, "SELECT count(*) FROM by_type", []).unwrap().unwrap();
        assert_eq!(remaining, 1);
    }
}
