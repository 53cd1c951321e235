//! SQL collaborator for database-backed rules.
//!
//! The engine only needs `execute(connection_string, query) -> rows`; how a
//! connection is made is the executor's business.

use crate::{DataValue, QueryError};
use std::fmt;

/// One returned row as ordered `(column, value)` pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRow {
    pub values: Vec<(String, DataValue)>,
}

impl QueryRow {
    pub fn get(&self, column: &str) -> Option<&DataValue> {
        self.values.iter().find(|(name, _)| name == column).map(|(_, v)| v)
    }
}

impl fmt::Display for QueryRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        Ok(())
    }
}

/// Runs a query and returns every row.
pub trait QueryExecutor: Send + Sync {
    fn execute(&self, connection_string: &str, query: &str) -> Result<Vec<QueryRow>, QueryError>;
}

/// Executor used when no database support is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopExecutor;

impl QueryExecutor for NoopExecutor {
    fn execute(&self, _connection_string: &str, _query: &str) -> Result<Vec<QueryRow>, QueryError> {
        Err(QueryError::Connection("no SQL executor configured".to_string()))
    }
}

/// SQLite executor.
///
/// Accepts `sqlite://path`, `sqlite:path`, a plain path or `:memory:`.
/// Files are opened read-only.
#[cfg(feature = "sqlite")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteExecutor;

#[cfg(feature = "sqlite")]
impl SqliteExecutor {
    fn open(connection_string: &str) -> Result<rusqlite::Connection, QueryError> {
        use rusqlite::{Connection, OpenFlags};

        let target = connection_string
            .strip_prefix("sqlite://")
            .or_else(|| connection_string.strip_prefix("sqlite:"))
            .unwrap_or(connection_string)
            .trim();

        let connection = if target == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open_with_flags(
                target,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
        };
        connection.map_err(|e| QueryError::Connection(format!("cannot open '{}': {}", target, e)))
    }
}

#[cfg(feature = "sqlite")]
impl QueryExecutor for SqliteExecutor {
    fn execute(&self, connection_string: &str, query: &str) -> Result<Vec<QueryRow>, QueryError> {
        use rusqlite::types::ValueRef;

        let connection = Self::open(connection_string)?;
        let mut statement = connection
            .prepare(query)
            .map_err(|e| QueryError::QuerySyntax(e.to_string()))?;
        let names: Vec<String> = statement.column_names().iter().map(|s| s.to_string()).collect();

        let mut rows = statement.query([]).map_err(|e| QueryError::QuerySyntax(e.to_string()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|e| QueryError::QuerySyntax(e.to_string()))? {
            let mut values = Vec::with_capacity(names.len());
            for (i, name) in names.iter().enumerate() {
                let value = match row.get_ref(i).map_err(|e| QueryError::QuerySyntax(e.to_string()))? {
                    ValueRef::Null => DataValue::Null,
                    ValueRef::Integer(n) => DataValue::Int(n),
                    ValueRef::Real(x) => DataValue::Float(x),
                    ValueRef::Text(bytes) => DataValue::String(String::from_utf8_lossy(bytes).into_owned()),
                    ValueRef::Blob(bytes) => DataValue::String(format!("<{} bytes>", bytes.len())),
                };
                values.push((name.clone(), value));
            }
            out.push(QueryRow { values });
        }
        Ok(out)
    }
}

/// The executor compiled into this build.
pub fn default_executor() -> std::sync::Arc<dyn QueryExecutor> {
    #[cfg(feature = "sqlite")]
    {
        std::sync::Arc::new(SqliteExecutor)
    }
    #[cfg(not(feature = "sqlite"))]
    {
        std::sync::Arc::new(NoopExecutor)
    }
}
