mod configuration;
pub use configuration::DatabaseConfiguration;

mod sqlite;
pub use sqlite::SqliteStorage;
