use serde_json::{Map, Value};

/// A single result row, keyed by column name.
///
/// Column values are carried as JSON scalars so that the settings layer does not depend on the
/// value representation of any particular database engine.
pub type Row = Map<String, Value>;

/// An error resulting from operations on a [`Storage`] backend.
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    /// An internal unspecified error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// An error reported by the SQLite engine.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// The query/execute contract the settings stores need from a relational backend.
///
/// Calls are blocking and are expected to either complete or fail; the settings stores never
/// retry and propagate every error unchanged.
pub trait Storage: Send + Sync {
    /// Runs a read query without parameters and returns every row it produces, in the order the
    /// backend yields them.
    fn select(&self, query: &str) -> Result<Vec<Row>, StorageError>;

    /// Runs a parameterized read query and returns `field` from the first row, or `None` when the
    /// query produced no rows.
    fn select_field_value(
        &self,
        query: &str,
        field: &str,
        params: &[Value],
    ) -> Result<Option<Value>, StorageError>;

    /// Runs a parameterized write (insert, update or delete) and returns the number of affected
    /// rows.
    fn execute(&self, query: &str, params: &[Value]) -> Result<usize, StorageError>;
}
