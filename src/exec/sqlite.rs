//! SQLite execution provider backed by `rusqlite`.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use super::{BufferedCursor, ExecError, ExecResult, Executor, Record, RowCursor};
use crate::sql::Dialect;
use crate::value::Value;

/// Executes queries on a SQLite connection.
///
/// Result sets are read completely when the statement runs, so the returned
/// cursor does not borrow the connection.
pub struct SqliteExecutor {
    conn: Connection,
}

impl SqliteExecutor {
    /// Open a database file read-only.
    pub fn open(path: impl AsRef<Path>) -> ExecResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// In-memory database, mainly for tests.
    pub fn open_in_memory() -> ExecResult<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Executor for SqliteExecutor {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn query(&self, sql: &str) -> ExecResult<Box<dyn RowCursor>> {
        debug!(sql, "executing query");
        let mut stmt = self.conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Record::new();
            for (idx, name) in names.iter().enumerate() {
                record.push(name.clone(), convert(row.get_ref(idx)?));
            }
            records.push(record);
        }

        Ok(Box::new(BufferedCursor::new(records)))
    }

    fn count(&self, sql: &str) -> ExecResult<u64> {
        debug!(sql, "executing count");
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        u64::try_from(count).map_err(|_| ExecError::InvalidCount)
    }
}

/// Blobs come back base64-encoded so binary content survives as text.
fn convert(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Int(n),
        ValueRef::Real(x) => Value::Float(x),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Text(BASE64.encode(bytes)),
    }
}
