/// History writer (spec §4.2): operation bookkeeping plus before/after
/// replay images for vertices and edges.
use rusqlite::Connection;

use crate::error::{EngineError, EngineResult};
use crate::repository::EdgeRow;
use crate::store::util::{execute, insert, iterate, pluck, scalar};

/// The kind of mutation one operation row represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpType {
    Create,
    Update,
    Delete,
}

impl OpType {
    pub fn as_str(self) -> &'static str {
        match self {
            OpType::Create => "create",
            OpType::Update => "update",
            OpType::Delete => "delete",
        }
    }

    pub fn parse(s: &str) -> EngineResult<Self> {
        match s {
            "create" => Ok(OpType::Create),
            "update" => Ok(OpType::Update),
            "delete" => Ok(OpType::Delete),
            other => Err(EngineError::InvalidState(format!(
                "unknown operation_type {other:?}"
            ))),
        }
    }

    /// `create <-> delete`; `update -> update` (spec §4.3, `apply`).
    pub fn inverse(self) -> Self {
        match self {
            OpType::Create => OpType::Delete,
            OpType::Delete => OpType::Create,
            OpType::Update => OpType::Update,
        }
    }
}

/// One row of `by_type_history`.
#[derive(Debug, Clone)]
pub struct VertexHistory {
    pub by_type_id: i64,
    pub type_name: String,
    pub before_json: String,
    pub after_json: String,
}

/// The id of the operation currently marked `is_current`, or `0` if none
/// (spec §4.4 step 2: "or 0 if none").
pub fn current_operation_id(conn: &Connection) -> EngineResult<i64> {
    Ok(scalar::<i64, _>(conn, "SELECT id FROM operations WHERE current = 1", [])?.unwrap_or(0))
}

/// The operation type of a given operation id.
pub fn operation_type(conn: &Connection, operation_id: i64) -> EngineResult<OpType> {
    let raw: Option<String> = scalar(
        conn,
        "SELECT operation_type FROM operations WHERE id = ?1",
        [operation_id],
    )?;
    match raw {
        Some(s) => OpType::parse(&s),
        None => Err(EngineError::InvalidState(format!(
            "no operation with id {operation_id}"
        ))),
    }
}

/// The operation whose `next_operation` equals `operation_id`, i.e. its
/// predecessor in the chain. `None` if `operation_id` is the head.
pub fn predecessor_of(conn: &Connection, operation_id: i64) -> EngineResult<Option<i64>> {
    scalar(
        conn,
        "SELECT id FROM operations WHERE next_operation = ?1",
        [operation_id],
    )
}

/// Insert a new operation row and link it into the chain (spec §4.2 steps
/// 1-3), including the bootstrapping rules from spec §9's Open Questions.
pub fn record_operation(conn: &Connection, op_type: OpType) -> EngineResult<i64> {
    let prev_current: Option<i64> = scalar(conn, "SELECT id FROM operations WHERE current = 1", [])?;
    let existing_head: Option<i64> = scalar(conn, "SELECT MIN(id) FROM operations", [])?;

    let new_id = insert(
        conn,
        "INSERT INTO operations (operation_type, current, next_operation) VALUES (?1, 0, -1)",
        [op_type.as_str()],
    )?;

    match prev_current {
        Some(prev_id) => {
            execute(
                conn,
                "UPDATE operations SET next_operation = ?1, current = 0 WHERE id = ?2",
                rusqlite::params![new_id, prev_id],
            )?;
        }
        None => {
            if let Some(head_id) = existing_head {
                if head_id != new_id {
                    execute(
                        conn,
                        "UPDATE operations SET next_operation = ?1 WHERE id = ?2",
                        rusqlite::params![new_id, head_id],
                    )?;
                }
            }
        }
    }

    execute(
        conn,
        "UPDATE operations SET current = 1 WHERE id = ?1",
        [new_id],
    )?;

    Ok(new_id)
}

/// Move the `is_current` marker to `operation_id` (or clear it if `None`).
pub fn set_current_operation(conn: &Connection, operation_id: Option<i64>) -> EngineResult<()> {
    execute(conn, "UPDATE operations SET current = 0 WHERE current = 1", [])?;
    if let Some(id) = operation_id {
        execute(conn, "UPDATE operations SET current = 1 WHERE id = ?1", [id])?;
    }
    Ok(())
}

/// Record the vertex-history row for one operation. `before_json`/
/// `after_json` are `""` where inapplicable (spec §4.2 table).
pub fn record_vertex_history(
    conn: &Connection,
    operation_id: i64,
    by_type_id: i64,
    type_name: &str,
    before_json: &str,
    after_json: &str,
) -> EngineResult<()> {
    execute(
        conn,
        "INSERT INTO by_type_history (operation_id, by_type_id, type_name, before_json, after_json) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![operation_id, by_type_id, type_name, before_json, after_json],
    )?;
    Ok(())
}

/// Fetch the vertex-history row pinned to `operation_id`.
pub fn vertex_history(conn: &Connection, operation_id: i64) -> EngineResult<Option<VertexHistory>> {
    pluck(
        conn,
        "SELECT by_type_id, type_name, before_json, after_json FROM by_type_history \
         WHERE operation_id = ?1",
        [operation_id],
        |row| {
            Ok(VertexHistory {
                by_type_id: row.get(0)?,
                type_name: row.get(1)?,
                before_json: row.get(2)?,
                after_json: row.get(3)?,
            })
        },
    )
}

fn snapshot_edges(
    conn: &Connection,
    table: &str,
    operation_id: i64,
    vertex_id: i64,
) -> EngineResult<()> {
    let edges: Vec<EdgeRow> = iterate(
        conn,
        "SELECT from_id, to_id, relation FROM relations WHERE from_id = ?1 OR to_id = ?1 ORDER BY rowid",
        [vertex_id],
        |row| {
            Ok(EdgeRow {
                from_id: row.get(0)?,
                to_id: row.get(1)?,
                relation: row.get(2)?,
            })
        },
    )?;
    for edge in edges {
        execute(
            conn,
            &format!(
                "INSERT INTO {table} (operation_id, from_id, to_id, relation) VALUES (?1, ?2, ?3, ?4)"
            ),
            rusqlite::params![operation_id, edge.from_id, edge.to_id, edge.relation],
        )?;
    }
    Ok(())
}

/// Snapshot every edge incident to `vertex_id` into `relations_history_before`.
pub fn snapshot_edges_before(conn: &Connection, operation_id: i64, vertex_id: i64) -> EngineResult<()> {
    snapshot_edges(conn, "relations_history_before", operation_id, vertex_id)
}

/// Snapshot every edge incident to `vertex_id` into `relations_history_after`.
pub fn snapshot_edges_after(conn: &Connection, operation_id: i64, vertex_id: i64) -> EngineResult<()> {
    snapshot_edges(conn, "relations_history_after", operation_id, vertex_id)
}

fn read_edges(conn: &Connection, table: &str, operation_id: i64) -> EngineResult<Vec<EdgeRow>> {
    iterate(
        conn,
        &format!("SELECT from_id, to_id, relation FROM {table} WHERE operation_id = ?1 ORDER BY id"),
        [operation_id],
        |row| {
            Ok(EdgeRow {
                from_id: row.get(0)?,
                to_id: row.get(1)?,
                relation: row.get(2)?,
            })
        },
    )
}

/// Edges snapshotted immediately before the operation's `save_related` phase.
pub fn edges_before(conn: &Connection, operation_id: i64) -> EngineResult<Vec<EdgeRow>> {
    read_edges(conn, "relations_history_before", operation_id)
}

/// Edges snapshotted immediately after the operation's `save_related` phase.
pub fn edges_after(conn: &Connection, operation_id: i64) -> EngineResult<Vec<EdgeRow>> {
    read_edges(conn, "relations_history_after", operation_id)
}
