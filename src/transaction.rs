/// Transaction bracket (spec §4.4): wraps a user action, captures the span
/// of operations it produced, links it into `undo_transactions`, and vetoes
/// idempotent single-update saves before they ever leave the store
/// transaction.
use rusqlite::Connection;
use tracing::debug;

use crate::codec::json_blobs_equal;
use crate::engine::Persister;
use crate::error::EngineResult;
use crate::history::{current_operation_id, edges_after, edges_before, operation_type, vertex_history, OpType};
use crate::undo;

/// Run `action` inside the engine's transaction bracket.
///
/// If a bracket is already active on this call stack (a nested `save`/
/// `delete` invoked from within a `save_related`/`delete_related` callback),
/// this simply runs `action` without opening a new store transaction or
/// inserting a new `undo_transactions` row — spec §4.4 step 3 and §5's
/// reentrancy rule.
pub(crate) fn with_undo_transaction<T>(
    persister: &Persister,
    action: impl FnOnce() -> EngineResult<T>,
) -> EngineResult<T> {
    let guard = persister.connection();
    let conn: &Connection = &guard;

    let outermost = persister.bracket_depth() == 0;
    if outermost {
        conn.execute_batch("BEGIN")?;
    }
    persister.enter_bracket();

    let tx_start_op = current_operation_id(conn).unwrap_or(0);

    let result = action();

    persister.exit_bracket();

    if !outermost {
        return result;
    }

    match result {
        Ok(value) => {
            let tx_end_op = match current_operation_id(conn) {
                Ok(id) => id,
                Err(e) => {
                    let _ = conn.execute_batch("ROLLBACK");
                    return Err(e);
                }
            };
            match finalize(conn, tx_start_op, tx_end_op) {
                Ok(true) => {
                    conn.execute_batch("COMMIT")?;
                    Ok(value)
                }
                Ok(false) => {
                    conn.execute_batch("ROLLBACK")?;
                    debug!(
                        start = tx_start_op,
                        end = tx_end_op,
                        "suppressed idempotent update; transaction rolled back"
                    );
                    Ok(value)
                }
                Err(e) => {
                    let _ = conn.execute_batch("ROLLBACK");
                    Err(e)
                }
            }
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

/// Record the transaction row for `(start, end]`, unless it is exactly one
/// idempotent update (spec §4.4's idempotence guard). Returns `true` if the
/// transaction was recorded (caller should commit), `false` if it should be
/// rolled back instead.
fn finalize(conn: &Connection, start: i64, end: i64) -> EngineResult<bool> {
    let op_count = end - start;
    if op_count == 1 && is_idempotent_update(conn, end)? {
        return Ok(false);
    }
    undo::record_transaction(conn, start, end)?;
    Ok(true)
}

fn is_idempotent_update(conn: &Connection, operation_id: i64) -> EngineResult<bool> {
    if operation_type(conn, operation_id)? != OpType::Update {
        return Ok(false);
    }
    let hist = match vertex_history(conn, operation_id)? {
        Some(h) => h,
        None => return Ok(false),
    };
    if !json_blobs_equal(&hist.before_json, &hist.after_json) {
        return Ok(false);
    }
    let mut before = edges_before(conn, operation_id)?;
    let mut after = edges_after(conn, operation_id)?;
    before.sort();
    after.sort();
    Ok(before == after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    #[test]
    fn finalize_commits_a_create() {
        let store = SqliteStore::open_in_memory().unwrap();
        let guard = store.lock();
        let conn: &Connection = &guard;
        let id = crate::repository::insert_vertex(conn, "Widget", r#"{"label":"a"}"#).unwrap();
        let op = crate::history::record_operation(conn, OpType::Create).unwrap();
        crate::history::record_vertex_history(conn, op, id, "Widget", "", r#"{"label":"a"}"#).unwrap();
        crate::history::snapshot_edges_after(conn, op, id).unwrap();

        assert!(finalize(conn, 0, op).unwrap());
    }

    #[test]
    fn finalize_suppresses_noop_update() {
        let store = SqliteStore::open_in_memory().unwrap();
        let guard = store.lock();
        let conn: &Connection = &guard;
        let id = crate::repository::insert_vertex(conn, "Widget", r#"{"label":"a"}"#).unwrap();
        let create_op = crate::history::record_operation(conn, OpType::Create).unwrap();
        crate::history::record_vertex_history(conn, create_op, id, "Widget", "", r#"{"label":"a"}"#).unwrap();
        crate::history::snapshot_edges_after(conn, create_op, id).unwrap();

        let update_op = crate::history::record_operation(conn, OpType::Update).unwrap();
        crate::history::record_vertex_history(
            conn,
            update_op,
            id,
            "Widget",
            r#"{"label":"a"}"#,
            r#"{"label":"a"}"#,
        )
        .unwrap();
        crate::history::snapshot_edges_before(conn, update_op, id).unwrap();
        crate::history::snapshot_edges_after(conn, update_op, id).unwrap();

        assert!(!finalize(conn, create_op, update_op).unwrap());
    }
}
