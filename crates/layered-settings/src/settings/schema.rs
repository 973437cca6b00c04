//! Table and column names for a settings table.

use super::SettingsError;

/// Describes the table a settings store reads from and writes to.
///
/// Every settings table has four columns: a row identifier, the setting name, its content and a
/// flag marking rows that belong to a multiple setting. The column names default to `id`, `name`,
/// `content` and `multiple`.
///
/// Names are interpolated into SQL, so they must be plain identifiers. [`TableSchema::validate`]
/// is called by every store before the first query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    table: String,
    id_column: String,
    name_column: String,
    content_column: String,
    multiple_column: String,
}

impl TableSchema {
    /// Create a schema for `table` using the default column names.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            id_column: "id".to_string(),
            name_column: "name".to_string(),
            content_column: "content".to_string(),
            multiple_column: "multiple".to_string(),
        }
    }

    /// Override the row identifier column.
    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    /// Override the setting name column.
    pub fn with_name_column(mut self, column: impl Into<String>) -> Self {
        self.name_column = column.into();
        self
    }

    /// Override the content column.
    pub fn with_content_column(mut self, column: impl Into<String>) -> Self {
        self.content_column = column.into();
        self
    }

    /// Override the multiple flag column.
    pub fn with_multiple_column(mut self, column: impl Into<String>) -> Self {
        self.multiple_column = column.into();
        self
    }

    /// The table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The row identifier column.
    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    /// The setting name column.
    pub fn name_column(&self) -> &str {
        &self.name_column
    }

    /// The content column.
    pub fn content_column(&self) -> &str {
        &self.content_column
    }

    /// The multiple flag column.
    pub fn multiple_column(&self) -> &str {
        &self.multiple_column
    }

    /// Check that the table and every column name is a plain SQL identifier.
    pub fn validate(&self) -> Result<(), SettingsError> {
        for name in [
            &self.table,
            &self.id_column,
            &self.name_column,
            &self.content_column,
            &self.multiple_column,
        ] {
            if !is_identifier(name) {
                return Err(SettingsError::InvalidIdentifier(name.clone()));
            }
        }
        Ok(())
    }

    pub(crate) fn select_records_sql(&self) -> String {
        format!(
            "SELECT DISTINCT {n}, {c}, {m} FROM {t}",
            n = self.name_column,
            c = self.content_column,
            m = self.multiple_column,
            t = self.table,
        )
    }

    pub(crate) fn select_id_sql(&self) -> String {
        format!(
            "SELECT {i} FROM {t} WHERE {n} = ?1",
            i = self.id_column,
            t = self.table,
            n = self.name_column,
        )
    }

    pub(crate) fn insert_sql(&self, multiple: bool) -> String {
        format!(
            "INSERT INTO {t} ({n}, {c}, {m}) VALUES (?1, ?2, {flag})",
            t = self.table,
            n = self.name_column,
            c = self.content_column,
            m = self.multiple_column,
            flag = u8::from(multiple),
        )
    }

    pub(crate) fn update_content_sql(&self) -> String {
        format!(
            "UPDATE {t} SET {c} = ?1 WHERE {i} = ?2",
            t = self.table,
            c = self.content_column,
            i = self.id_column,
        )
    }

    pub(crate) fn delete_sql(&self) -> String {
        format!(
            "DELETE FROM {t} WHERE {n} = ?1",
            t = self.table,
            n = self.name_column,
        )
    }

    pub(crate) fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {t} (\
                {i} INTEGER PRIMARY KEY AUTOINCREMENT, \
                {n} TEXT NOT NULL, \
                {c} TEXT, \
                {m} INTEGER NOT NULL DEFAULT 0\
            );",
            t = self.table,
            i = self.id_column,
            n = self.name_column,
            c = self.content_column,
            m = self.multiple_column,
        )
    }
}

/// Valid identifiers are non-empty, made of ASCII letters, digits and underscores, and do not
/// start with a digit.
const fn is_identifier(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes[0].is_ascii_digit() {
        return false;
    }
    let mut i = 0;
    while i < bytes.len() {
        let byte = bytes[i];
        if !(byte.is_ascii_alphanumeric() || byte == b'_') {
            return false;
        }
        i += 1;
    }
    true
}
