use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Number, Value};

use crate::{
    backend::DatabaseConfiguration,
    settings::{SettingsError, TableSchema},
    storage::{Row, Storage, StorageError},
};

/// [`Storage`] implementation backed by a single SQLite connection.
///
/// Cloning is cheap and yields a handle to the same connection.
#[derive(Clone)]
pub struct SqliteStorage(Arc<Mutex<rusqlite::Connection>>);

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage").finish()
    }
}

impl SqliteStorage {
    /// Opens the database described by `configuration`.
    pub fn open(configuration: &DatabaseConfiguration) -> Result<Self, StorageError> {
        let connection = match configuration {
            DatabaseConfiguration::Sqlite { file_path } => {
                let connection = rusqlite::Connection::open(file_path)?;
                // Set WAL mode for better concurrency
                connection.query_row("PRAGMA journal_mode = WAL", [], |row| {
                    row.get::<_, String>(0)
                })?;
                connection
            }
            DatabaseConfiguration::InMemory => rusqlite::Connection::open_in_memory()?,
        };

        Ok(Self::from_connection(connection))
    }

    /// Wraps an already opened connection.
    pub fn from_connection(connection: rusqlite::Connection) -> Self {
        SqliteStorage(Arc::new(Mutex::new(connection)))
    }

    /// Creates the settings table described by `schema` when it does not exist yet.
    ///
    /// An existing table is left untouched, whatever its shape.
    pub fn ensure_table(&self, schema: &TableSchema) -> Result<(), SettingsError> {
        schema.validate()?;
        self.connection()?
            .execute_batch(&schema.create_table_sql())
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn connection(&self) -> Result<MutexGuard<'_, rusqlite::Connection>, StorageError> {
        self.0
            .lock()
            .map_err(|_| StorageError::Internal("SQLite connection lock is poisoned".to_string()))
    }
}

impl Storage for SqliteStorage {
    fn select(&self, query: &str) -> Result<Vec<Row>, StorageError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(query)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let mut rows = stmt.query([])?;
        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (index, column) in columns.iter().enumerate() {
                record.insert(column.clone(), to_json(row.get_ref(index)?));
            }
            results.push(record);
        }

        Ok(results)
    }

    fn select_field_value(
        &self,
        query: &str,
        field: &str,
        params: &[Value],
    ) -> Result<Option<Value>, StorageError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(query)?;
        let index = stmt.column_index(field)?;

        let mut rows = stmt.query(rusqlite::params_from_iter(params.iter().map(to_sql)))?;
        let value = match rows.next()? {
            Some(row) => Some(to_json(row.get_ref(index)?)),
            None => None,
        };
        Ok(value)
    }

    fn execute(&self, query: &str, params: &[Value]) -> Result<usize, StorageError> {
        let conn = self.connection()?;
        let affected = conn.execute(
            query,
            rusqlite::params_from_iter(params.iter().map(to_sql)),
        )?;
        Ok(affected)
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map_or(SqlValue::Null, SqlValue::Real),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}
