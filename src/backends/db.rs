//! SQLite backend
//!
//! Keyed records insert by column name. The first keyed record written to
//! a missing table creates it; new keys add columns when the header may
//! grow. Positional records insert into the existing columns in order.

use super::FlushContext;
use crate::buffer::Entry;
use crate::error::{RecorderError, Result};
use crate::header::Header;
use crate::types::{CellValue, Record};
use indexmap::IndexMap;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection};
use std::path::Path;

/// Backtick-quoted identifier
pub(crate) fn quote_ident(name: &str) -> Result<String> {
    if name.contains('`') {
        return Err(RecorderError::InvalidConfig(format!(
            "identifier '{}' may not contain a backtick",
            name
        )));
    }
    Ok(format!("`{}`", name))
}

pub(crate) fn to_sql(value: &CellValue) -> Value {
    match value {
        CellValue::Empty => Value::Null,
        CellValue::String(s) | CellValue::Formula(s) | CellValue::Error(s) => {
            Value::Text(s.clone())
        }
        CellValue::Int(i) => Value::Integer(*i),
        CellValue::Float(f) | CellValue::DateTime(f) => Value::Real(*f),
        CellValue::Bool(b) => Value::Integer(*b as i64),
    }
}

pub(crate) fn from_sql(value: ValueRef<'_>) -> CellValue {
    match value {
        ValueRef::Null => CellValue::Empty,
        ValueRef::Integer(i) => CellValue::Int(i),
        ValueRef::Real(f) => CellValue::Float(f),
        ValueRef::Text(t) => CellValue::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => CellValue::String(format!("<{} bytes>", b.len())),
    }
}

/// Names of user tables
pub fn tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
}

/// Column names of `table`, empty when it does not exist
pub fn columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let sql = format!("PRAGMA table_info({})", quote_ident(table)?);
    let mut stmt = conn.prepare(&sql)?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
}

/// Run one statement and collect whatever rows it returns
pub fn run_sql(conn: &Connection, sql: &str) -> Result<Vec<Vec<CellValue>>> {
    let mut stmt = conn.prepare(sql)?;
    let width = stmt.column_count();
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            values.push(from_sql(row.get_ref(i)?));
        }
        out.push(values);
    }
    Ok(out)
}

/// Table a target writes to
fn table_name(conn: &Connection, ctx: &FlushContext<'_>, target: Option<&str>) -> Result<String> {
    if let Some(name) = target.or(ctx.config.table.as_deref()) {
        return Ok(name.to_string());
    }
    tables(conn)?
        .into_iter()
        .next()
        .ok_or_else(|| RecorderError::MissingTarget {
            target: "default table".to_string(),
            available: String::new(),
        })
}

pub fn flush(
    ctx: &mut FlushContext<'_>,
    path: &Path,
    batches: IndexMap<Option<String>, Vec<Entry>>,
) -> Result<()> {
    let mut conn = Connection::open(path)?;
    let tx = conn.transaction()?;

    for (target, entries) in batches {
        let table = table_name(&tx, ctx, target.as_deref())?;
        if target.is_none() && ctx.config.table.is_none() {
            ctx.headers.set_default(&table);
        }
        let quoted = quote_ident(&table)?;
        let auto_grow = ctx.config.auto_new_header;

        let existing = columns(&tx, &table)?;
        let header = ctx.headers.get_or_load(Some(table.as_str()), || {
            Ok(Header::from_existing(existing.iter().map(|c| Some(c.as_str()))))
        })?;

        for record in entries.into_iter().flat_map(super::entry_records) {
            match record {
                Record::Map(map) => {
                    if header.is_empty() {
                        let cols = map
                            .keys()
                            .map(|k| quote_ident(k))
                            .collect::<Result<Vec<_>>>()?;
                        log::info!("creating table {}", table);
                        tx.execute(
                            &format!("CREATE TABLE IF NOT EXISTS {} ({})", quoted, cols.join(", ")),
                            [],
                        )?;
                        header.declare(map.keys());
                        header.mark_written();
                    }
                    for key in map.keys() {
                        if header.resolve(key, true).is_some() {
                            continue;
                        }
                        if !auto_grow {
                            return Err(RecorderError::UnknownColumn {
                                column: key.clone(),
                                target: table.clone(),
                            });
                        }
                        tx.execute(
                            &format!("ALTER TABLE {} ADD COLUMN {}", quoted, quote_ident(key)?),
                            [],
                        )?;
                        header.grow(key);
                        header.mark_written();
                    }

                    let cols = map
                        .keys()
                        .map(|k| quote_ident(k))
                        .collect::<Result<Vec<_>>>()?;
                    let marks = vec!["?"; map.len()].join(", ");
                    tx.execute(
                        &format!("INSERT INTO {} ({}) VALUES ({})", quoted, cols.join(", "), marks),
                        params_from_iter(map.values().map(to_sql)),
                    )?;
                }
                positional => {
                    if header.is_empty() {
                        return Err(RecorderError::MissingTarget {
                            target: table.clone(),
                            available: tables(&tx)?.join(", "),
                        });
                    }
                    let values = positional.into_values();
                    let marks = vec!["?"; values.len()].join(", ");
                    let cols = header
                        .names()
                        .iter()
                        .take(values.len())
                        .map(|c| quote_ident(c.as_deref().unwrap_or_default()))
                        .collect::<Result<Vec<_>>>()?;
                    tx.execute(
                        &format!("INSERT INTO {} ({}) VALUES ({})", quoted, cols.join(", "), marks),
                        params_from_iter(values.iter().map(to_sql)),
                    )?;
                }
            }
        }
    }

    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("people").unwrap(), "`people`");
        assert!(quote_ident("bad`name").is_err());
    }

    #[test]
    fn test_run_sql_and_introspection() {
        let conn = Connection::open_in_memory().unwrap();
        run_sql(&conn, "CREATE TABLE t (a, b)").unwrap();
        run_sql(&conn, "INSERT INTO t VALUES (1, 'x')").unwrap();

        assert_eq!(tables(&conn).unwrap(), vec!["t"]);
        assert_eq!(columns(&conn, "t").unwrap(), vec!["a", "b"]);
        assert!(columns(&conn, "missing").unwrap().is_empty());

        let rows = run_sql(&conn, "SELECT a, b FROM t").unwrap();
        assert_eq!(rows, vec![vec![CellValue::Int(1), CellValue::from("x")]]);
    }

    #[test]
    fn test_value_mapping() {
        assert_eq!(to_sql(&CellValue::Bool(true)), Value::Integer(1));
        assert_eq!(to_sql(&CellValue::Empty), Value::Null);
        assert_eq!(from_sql(ValueRef::Real(1.5)), CellValue::Float(1.5));
    }
}
