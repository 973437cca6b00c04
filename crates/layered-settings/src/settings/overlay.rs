use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tracing::{debug, warn};

use super::{
    store::import_records, Persistence, SetOptions, SettingValue, SettingsAccess, SettingsError,
    SettingsStore, TableSchema,
};
use crate::storage::Storage;

/// A settings store layered on top of a read-only table.
///
/// Duplicated settings are handled as follows: the read-only table is loaded first, then the
/// mutable table. A name present in both ends up with the mutable table's value, but it still
/// counts as read-only and can never be set or removed through this store.
///
/// The read-only names are captured once during [`ReadonlyOverlayStore::load`]. An empty
/// read-only table protects nothing, and later changes to that table are not observed.
pub struct ReadonlyOverlayStore {
    base: SettingsStore,
    readonly_schema: TableSchema,
    readonly_names: HashSet<String>,
}

impl std::fmt::Debug for ReadonlyOverlayStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadonlyOverlayStore")
            .field("readonly_schema", &self.readonly_schema)
            .field("schema", self.base.schema())
            .field("readonly_names", &self.readonly_names.len())
            .finish()
    }
}

impl ReadonlyOverlayStore {
    /// Load `readonly_schema`'s table, then `schema`'s table on top of it.
    pub fn load(
        storage: Arc<dyn Storage>,
        readonly_schema: TableSchema,
        schema: TableSchema,
    ) -> Result<Self, SettingsError> {
        let mut settings = HashMap::new();
        let mut readonly_names = HashSet::new();

        import_records(storage.as_ref(), &readonly_schema, &mut settings, |name| {
            readonly_names.insert(name.to_string());
        })?;
        debug!(
            table = readonly_schema.table(),
            readonly = readonly_names.len(),
            "Captured readonly settings"
        );

        let base = SettingsStore::load_over(storage, schema, settings)?;

        Ok(Self {
            base,
            readonly_schema,
            readonly_names,
        })
    }

    /// True if `key` was loaded from the read-only table.
    pub fn is_readonly(&self, key: &str) -> bool {
        self.readonly_names.contains(key)
    }

    /// The names loaded from the read-only table.
    pub fn readonly_names(&self) -> impl Iterator<Item = &str> {
        self.readonly_names.iter().map(String::as_str)
    }

    /// The schema of the read-only table.
    pub fn readonly_schema(&self) -> &TableSchema {
        &self.readonly_schema
    }

    /// The schema of the mutable table.
    pub fn schema(&self) -> &TableSchema {
        self.base.schema()
    }
}

impl SettingsAccess for ReadonlyOverlayStore {
    fn get_setting(&self, key: &str) -> Option<SettingValue> {
        self.base.get_setting(key)
    }

    fn set_content(
        &self,
        key: &str,
        value: Option<&str>,
        options: SetOptions,
    ) -> Result<(), SettingsError> {
        if self.is_readonly(key) {
            warn!(setting = key, "Refused to change readonly setting");
            return Err(SettingsError::ReadonlySet(key.to_string()));
        }
        self.base.set_content(key, value, options)
    }

    fn remove_setting(&self, key: &str, persistence: Persistence) -> Result<(), SettingsError> {
        if self.is_readonly(key) {
            warn!(setting = key, "Refused to remove readonly setting");
            return Err(SettingsError::ReadonlyRemove(key.to_string()));
        }
        self.base.remove_setting(key, persistence)
    }

    fn settings(&self) -> HashMap<String, SettingValue> {
        self.base.settings()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::backend::{DatabaseConfiguration, SqliteStorage};

    const READONLY: &str = "settings_readonly";
    const MUTABLE: &str = "settings";

    fn storage() -> Arc<SqliteStorage> {
        let storage = SqliteStorage::open(&DatabaseConfiguration::InMemory).unwrap();
        storage.ensure_table(&TableSchema::new(READONLY)).unwrap();
        storage.ensure_table(&TableSchema::new(MUTABLE)).unwrap();
        Arc::new(storage)
    }

    fn insert(storage: &SqliteStorage, table: &str, name: &str, content: &str, multiple: bool) {
        storage
            .execute(
                &format!("INSERT INTO {table} (name, content, multiple) VALUES (?1, ?2, ?3)"),
                &[json!(name), json!(content), json!(multiple)],
            )
            .unwrap();
    }

    fn load(storage: &Arc<SqliteStorage>) -> ReadonlyOverlayStore {
        ReadonlyOverlayStore::load(
            storage.clone(),
            TableSchema::new(READONLY),
            TableSchema::new(MUTABLE),
        )
        .unwrap()
    }

    fn content_of(storage: &SqliteStorage, name: &str) -> Option<Value> {
        storage
            .select_field_value(
                "SELECT content FROM settings WHERE name = ?1",
                "content",
                &[json!(name)],
            )
            .unwrap()
    }

    #[test]
    fn test_mutable_table_overrides_readonly_values() {
        let storage = storage();
        insert(&storage, READONLY, "a", "1", false);
        insert(&storage, MUTABLE, "a", "2", false);
        insert(&storage, MUTABLE, "b", "3", false);

        let store = load(&storage);

        assert_eq!(store.get_setting("a"), Some(SettingValue::from("2")));
        assert_eq!(store.get_setting("b"), Some(SettingValue::from("3")));
        assert!(store.is_readonly("a"));
        assert!(!store.is_readonly("b"));
    }

    #[test]
    fn test_readonly_names_can_not_be_changed() {
        let storage = storage();
        insert(&storage, READONLY, "a", "1", false);
        insert(&storage, MUTABLE, "a", "2", false);
        let store = load(&storage);

        let err = store
            .set_setting("a", "5", SetOptions::new().temporary())
            .unwrap_err();
        assert!(matches!(&err, SettingsError::ReadonlySet(name) if name == "a"));
        assert_eq!(err.code(), Some(401));

        let err = store
            .remove_setting("a", Persistence::Temporary)
            .unwrap_err();
        assert!(matches!(&err, SettingsError::ReadonlyRemove(name) if name == "a"));
        assert_eq!(err.code(), Some(402));
        assert_eq!(err.setting_name(), Some("a"));

        assert_eq!(store.get_setting("a"), Some(SettingValue::from("2")));
        assert_eq!(content_of(&storage, "a"), Some(json!("2")));
    }

    #[test]
    fn test_other_names_remain_mutable() {
        let storage = storage();
        insert(&storage, READONLY, "a", "1", false);
        insert(&storage, MUTABLE, "b", "3", false);
        let store = load(&storage);

        store.set_setting("b", "99", SetOptions::new()).unwrap();
        store.set_setting("c", "new", SetOptions::new()).unwrap();

        assert_eq!(store.get_setting("b"), Some(SettingValue::from("99")));
        assert_eq!(content_of(&storage, "b"), Some(json!("99")));
        assert_eq!(content_of(&storage, "c"), Some(json!("new")));

        store.remove_setting("c", Persistence::Persistent).unwrap();
        assert_eq!(store.get_setting("c"), None);
        assert_eq!(content_of(&storage, "c"), None);
    }

    #[test]
    fn test_readonly_multiple_setting_is_protected() {
        let storage = storage();
        insert(&storage, READONLY, "hosts", "a", true);
        insert(&storage, READONLY, "hosts", "b", true);
        let store = load(&storage);

        assert_eq!(store.get_setting("hosts"), Some(SettingValue::from(vec!["a", "b"])));
        assert!(matches!(
            store.set_setting("hosts", "c", SetOptions::new().multiple()),
            Err(SettingsError::ReadonlySet(_))
        ));
        assert_eq!(store.readonly_names().collect::<Vec<_>>(), vec!["hosts"]);
    }

    #[test]
    fn test_mutable_multiple_records_override_readonly_name() {
        let storage = storage();
        insert(&storage, READONLY, "hosts", "default", false);
        insert(&storage, MUTABLE, "hosts", "a", true);
        insert(&storage, MUTABLE, "hosts", "b", true);
        let store = load(&storage);

        assert_eq!(store.get_setting("hosts"), Some(SettingValue::from(vec!["a", "b"])));
        assert!(store.is_readonly("hosts"));
        assert!(matches!(
            store.set_setting("hosts", "c", SetOptions::new().multiple()),
            Err(SettingsError::ReadonlySet(name)) if name == "hosts"
        ));
        assert!(matches!(
            store.set_content("hosts", None, SetOptions::new().temporary()),
            Err(SettingsError::ReadonlySet(_))
        ));
        assert!(matches!(
            store.remove_setting("hosts", Persistence::Persistent),
            Err(SettingsError::ReadonlyRemove(_))
        ));
        assert_eq!(store.get_setting("hosts"), Some(SettingValue::from(vec!["a", "b"])));
    }

    #[test]
    fn test_empty_readonly_table_protects_nothing() {
        let storage = storage();
        insert(&storage, MUTABLE, "a", "2", false);
        let store = load(&storage);

        assert_eq!(store.readonly_names().count(), 0);
        store.set_setting("a", "3", SetOptions::new()).unwrap();
        assert_eq!(store.get_setting("a"), Some(SettingValue::from("3")));
    }

    #[test]
    fn test_readonly_names_are_frozen_after_load() {
        let storage = storage();
        let store = load(&storage);

        insert(&storage, READONLY, "late", "1", false);

        assert!(!store.is_readonly("late"));
        store.set_setting("late", "2", SetOptions::new()).unwrap();
    }

    #[test]
    fn test_missing_readonly_table_fails_load() {
        let storage = SqliteStorage::open(&DatabaseConfiguration::InMemory).unwrap();
        storage.ensure_table(&TableSchema::new(MUTABLE)).unwrap();

        let result = ReadonlyOverlayStore::load(
            Arc::new(storage),
            TableSchema::new(READONLY),
            TableSchema::new(MUTABLE),
        );

        assert!(matches!(result, Err(SettingsError::Storage(_))));
    }
}
