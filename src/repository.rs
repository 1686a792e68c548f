/// Vertex/edge repository (spec §4.1): CRUD over `by_type` and `relations`.
///
/// Every function here takes `&Connection` directly rather than a `Store`
/// handle — callers (history writer, transaction bracket) already hold the
/// connection for the duration of a bracket and pass it straight through,
/// so nothing here ever re-locks [`crate::store::SqliteStore`].
use rusqlite::Connection;
use serde_json::Value as JsonValue;

use crate::error::{EngineError, EngineResult};
use crate::model::Persistable;
use crate::store::util::{execute, insert, iterate, pluck, scalar};

/// A raw edge row, independent of any `Persistable` type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EdgeRow {
    pub from_id: i64,
    pub to_id: i64,
    pub relation: String,
}

fn decode_row<T: Persistable>(id: i64, json: &str) -> EngineResult<T> {
    let value: JsonValue = serde_json::from_str(json)?;
    T::from_scalar_json(id, &value)
}

/// All vertices of `T::type_name()`, in insertion (id) order.
pub fn retrieve<T: Persistable>(conn: &Connection) -> EngineResult<Vec<T>> {
    iterate(
        conn,
        "SELECT id, json FROM by_type WHERE type_name = ?1 ORDER BY id",
        [T::type_name()],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
    )?
    .into_iter()
    .map(|(id, json)| decode_row(id, &json))
    .collect()
}

/// Same as [`retrieve`], but paginated by insertion order.
pub fn retrieve_page<T: Persistable>(
    conn: &Connection,
    start: i64,
    limit: i64,
) -> EngineResult<Vec<T>> {
    iterate(
        conn,
        "SELECT id, json FROM by_type WHERE type_name = ?1 ORDER BY id LIMIT ?2 OFFSET ?3",
        rusqlite::params![T::type_name(), limit, start],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
    )?
    .into_iter()
    .map(|(id, json)| decode_row(id, &json))
    .collect()
}

/// A single vertex by id, or `None` if absent or of the wrong type.
pub fn retrieve_by_id<T: Persistable>(conn: &Connection, id: i64) -> EngineResult<Option<T>> {
    let row = pluck(
        conn,
        "SELECT json FROM by_type WHERE id = ?1 AND type_name = ?2",
        rusqlite::params![id, T::type_name()],
        |row| row.get::<_, String>(0),
    )?;
    row.map(|json| decode_row(id, &json)).transpose()
}

/// Vertices of `to_type` reached from `obj_id` via edges labeled `property`,
/// in edge-row insertion order. `obj_id` of `None` (unsaved source) yields
/// an empty result — spec §7, kind 5.
pub fn related<T: Persistable>(
    conn: &Connection,
    obj_id: Option<i64>,
    property: &str,
) -> EngineResult<Vec<T>> {
    let Some(from_id) = obj_id else {
        return Ok(Vec::new());
    };
    iterate(
        conn,
        "SELECT by_type.id, by_type.json \
         FROM relations JOIN by_type ON relations.to_id = by_type.id \
         WHERE relations.from_id = ?1 AND relations.relation = ?2 AND by_type.type_name = ?3 \
         ORDER BY relations.rowid",
        rusqlite::params![from_id, property, T::type_name()],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
    )?
    .into_iter()
    .map(|(id, json)| decode_row(id, &json))
    .collect()
}

/// [`related`] restricted to exactly one result; zero or many yield `None`.
pub fn related_item<T: Persistable>(
    conn: &Connection,
    obj_id: Option<i64>,
    property: &str,
) -> EngineResult<Option<T>> {
    let mut items = related::<T>(conn, obj_id, property)?;
    if items.len() == 1 {
        Ok(items.pop())
    } else {
        Ok(None)
    }
}

/// Read a vertex's current `(type_name, json)`, if it exists.
pub fn read_vertex(conn: &Connection, id: i64) -> EngineResult<Option<(String, String)>> {
    pluck(
        conn,
        "SELECT type_name, json FROM by_type WHERE id = ?1",
        [id],
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
    )
}

/// Insert a new vertex with an engine-assigned id, or one carried over from
/// a redo (spec invariant 3.2.5). Returns the assigned id.
pub fn insert_vertex_with_id(
    conn: &Connection,
    id: i64,
    type_name: &str,
    json: &str,
) -> EngineResult<i64> {
    insert(
        conn,
        "INSERT INTO by_type (id, type_name, json) VALUES (?1, ?2, ?3)",
        rusqlite::params![id, type_name, json],
    )
}

/// Insert a new vertex letting SQLite assign the id. Returns the assigned id.
pub fn insert_vertex(conn: &Connection, type_name: &str, json: &str) -> EngineResult<i64> {
    insert(
        conn,
        "INSERT INTO by_type (type_name, json) VALUES (?1, ?2)",
        rusqlite::params![type_name, json],
    )
}

/// Overwrite an existing vertex's JSON in place.
pub fn update_vertex(conn: &Connection, id: i64, json: &str) -> EngineResult<()> {
    let affected = execute(
        conn,
        "UPDATE by_type SET json = ?1 WHERE id = ?2",
        rusqlite::params![json, id],
    )?;
    if affected == 0 {
        return Err(EngineError::InvalidState(format!(
            "update_vertex: no row with id {id}"
        )));
    }
    Ok(())
}

/// Remove the vertex row only (edges are handled separately).
pub fn delete_vertex_row(conn: &Connection, id: i64) -> EngineResult<()> {
    execute(conn, "DELETE FROM by_type WHERE id = ?1", [id])?;
    Ok(())
}

/// All edges incident to `id` in either direction, in insertion order.
pub fn incident_edges(conn: &Connection, id: i64) -> EngineResult<Vec<EdgeRow>> {
    iterate(
        conn,
        "SELECT from_id, to_id, relation FROM relations \
         WHERE from_id = ?1 OR to_id = ?1 ORDER BY rowid",
        [id],
        |row| {
            Ok(EdgeRow {
                from_id: row.get(0)?,
                to_id: row.get(1)?,
                relation: row.get(2)?,
            })
        },
    )
}

/// Delete every edge incident to `id` in either direction.
pub fn delete_incident_edges(conn: &Connection, id: i64) -> EngineResult<()> {
    execute(
        conn,
        "DELETE FROM relations WHERE from_id = ?1 OR to_id = ?1",
        [id],
    )?;
    Ok(())
}

/// Replace the edge set `(from_id, relation)` with exactly the given targets,
/// in order. Deduplication is the caller's responsibility (spec §4.1).
pub fn replace_edges(
    conn: &Connection,
    from_id: i64,
    relation: &str,
    to_ids: &[i64],
) -> EngineResult<()> {
    execute(
        conn,
        "DELETE FROM relations WHERE from_id = ?1 AND relation = ?2",
        rusqlite::params![from_id, relation],
    )?;
    for to_id in to_ids {
        execute(
            conn,
            "INSERT INTO relations (from_id, to_id, relation) VALUES (?1, ?2, ?3)",
            rusqlite::params![from_id, to_id, relation],
        )?;
    }
    Ok(())
}

/// Insert a single directed edge row verbatim (used by undo/redo replay).
pub fn insert_edge(conn: &Connection, from_id: i64, to_id: i64, relation: &str) -> EngineResult<()> {
    execute(
        conn,
        "INSERT INTO relations (from_id, to_id, relation) VALUES (?1, ?2, ?3)",
        rusqlite::params![from_id, to_id, relation],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    #[derive(Debug, Clone, PartialEq)]
    struct Widget {
        id: Option<i64>,
        label: String,
    }

    impl Persistable for Widget {
        fn type_name() -> &'static str {
            "Widget"
        }
        fn id(&self) -> Option<i64> {
            self.id
        }
        fn set_id(&mut self, id: i64) {
            self.id = Some(id);
        }
        fn to_scalar_json(&self) -> EngineResult<JsonValue> {
            Ok(serde_json::json!({ "label": self.label }))
        }
        fn from_scalar_json(id: i64, json: &JsonValue) -> EngineResult<Self> {
            Ok(Widget {
                id: Some(id),
                label: json["label"].as_str().unwrap_or_default().to_string(),
            })
        }
    }

    #[test]
    fn insert_then_retrieve_by_id() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock();
        let id = insert_vertex(&conn, "Widget", r#"{"label":"a"}"#).unwrap();
        let found: Option<Widget> = retrieve_by_id(&conn, id).unwrap();
        assert_eq!(found, Some(Widget { id: Some(id), label: "a".into() }));
    }

    #[test]
    fn retrieve_by_id_wrong_type_is_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock();
        let id = insert_vertex(&conn, "Other", r#"{"label":"a"}"#).unwrap();
        let found: Option<Widget> = retrieve_by_id(&conn, id).unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn retrieve_orders_by_insertion() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock();
        insert_vertex(&conn, "Widget", r#"{"label":"a"}"#).unwrap();
        insert_vertex(&conn, "Widget", r#"{"label":"b"}"#).unwrap();
        let all: Vec<Widget> = retrieve(&conn).unwrap();
        assert_eq!(all.iter().map(|w| w.label.clone()).collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn related_with_no_id_is_empty() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock();
        let out: Vec<Widget> = related(&conn, None, "items").unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn replace_edges_is_idempotent_for_same_set() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock();
        let a = insert_vertex(&conn, "Widget", r#"{"label":"a"}"#).unwrap();
        let b = insert_vertex(&conn, "Widget", r#"{"label":"b"}"#).unwrap();
        replace_edges(&conn, a, "knows", &[b]).unwrap();
        let found: Vec<Widget> = related(&conn, Some(a), "knows").unwrap();
        assert_eq!(found.len(), 1);
        replace_edges(&conn, a, "knows", &[]).unwrap();
        let found: Vec<Widget> = related(&conn, Some(a), "knows").unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn related_item_requires_exactly_one() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock();
        let a = insert_vertex(&conn, "Widget", r#"{"label":"a"}"#).unwrap();
        let b = insert_vertex(&conn, "Widget", r#"{"label":"b"}"#).unwrap();
        let c = insert_vertex(&conn, "Widget", r#"{"label":"c"}"#).unwrap();
        assert!(related_item::<Widget>(&conn, Some(a), "one").unwrap().is_none());
        replace_edges(&conn, a, "one", &[b]).unwrap();
        assert!(related_item::<Widget>(&conn, Some(a), "one").unwrap().is_some());
        replace_edges(&conn, a, "one", &[b, c]).unwrap();
        assert!(related_item::<Widget>(&conn, Some(a), "one").unwrap().is_none());
    }
}
