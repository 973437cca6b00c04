use std::path::PathBuf;

#[derive(Debug, Clone)]
/// Configuration for the database backing the settings stores.
pub enum DatabaseConfiguration {
    /// SQLite database stored in a file. The file is created when it does not exist.
    Sqlite {
        /// The file path to the SQLite database.
        file_path: PathBuf,
    },

    /// Private in-memory SQLite database, discarded when the last handle is dropped.
    InMemory,
}
