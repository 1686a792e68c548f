/// Generic query helpers shared by every layer above the store façade.
///
/// These realize the primitives named in the store collaborator contract
/// (spec §6.1): scalar-value query, single-row "pluck," row iteration,
/// insert, and update/delete by filter. `JOIN` and `INSERT OR REPLACE` are
/// expressed directly as SQL text by callers — there is no query builder,
/// only these thin wrappers around `rusqlite`.
use rusqlite::{Connection, Params, Row};

use crate::error::EngineResult;

/// Run a statement that returns at most one column of one row.
pub(crate) fn scalar<T, P>(conn: &Connection, sql: &str, params: P) -> EngineResult<Option<T>>
where
    T: rusqlite::types::FromSql,
    P: Params,
{
    match conn.query_row(sql, params, |row| row.get(0)) {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Run a statement and map the first row, if any, through `f`.
pub(crate) fn pluck<T, P, F>(conn: &Connection, sql: &str, params: P, f: F) -> EngineResult<Option<T>>
where
    P: Params,
    F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    match rows.next()? {
        Some(row) => Ok(Some(f(row)?)),
        None => Ok(None),
    }
}

/// Run a statement and map every row through `f`, in result-set order.
pub(crate) fn iterate<T, P, F>(conn: &Connection, sql: &str, params: P, mut f: F) -> EngineResult<Vec<T>>
where
    P: Params,
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(f(row)?);
    }
    Ok(out)
}

/// Execute a statement (insert/update/delete) and return the affected row count.
pub(crate) fn execute<P>(conn: &Connection, sql: &str, params: P) -> EngineResult<usize>
where
    P: Params,
{
    Ok(conn.execute(sql, params)?)
}

/// Execute an insert and return the assigned rowid.
pub(crate) fn insert<P>(conn: &Connection, sql: &str, params: P) -> EngineResult<i64>
where
    P: Params,
{
    conn.execute(sql, params)?;
    Ok(conn.last_insert_rowid())
}
