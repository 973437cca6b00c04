use std::{
    collections::{hash_map::Entry, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock},
};

use serde_json::Value;
use tracing::{debug, warn};

use super::{Persistence, SetOptions, SettingValue, SettingsAccess, SettingsError, TableSchema};
use crate::storage::Storage;

/// A mutable settings store backed by one table.
///
/// The whole table is loaded into memory on construction. Reads are served from memory, writes
/// update memory first and then the table.
pub struct SettingsStore {
    storage: Arc<dyn Storage>,
    schema: TableSchema,
    settings: RwLock<HashMap<String, SettingValue>>,
    // Held across the in-memory update and the table write of a mutation.
    writes: Mutex<()>,
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("schema", &self.schema)
            .finish()
    }
}

impl SettingsStore {
    /// Load every record of the table described by `schema`.
    ///
    /// Fails if the schema is invalid or the table can not be read; no partially loaded store
    /// is returned.
    pub fn load(storage: Arc<dyn Storage>, schema: TableSchema) -> Result<Self, SettingsError> {
        Self::load_over(storage, schema, HashMap::new())
    }

    /// Load the table on top of already imported `settings`. Records of the table overwrite
    /// single values with the same name.
    pub(crate) fn load_over(
        storage: Arc<dyn Storage>,
        schema: TableSchema,
        mut settings: HashMap<String, SettingValue>,
    ) -> Result<Self, SettingsError> {
        import_records(storage.as_ref(), &schema, &mut settings, |_| {})?;

        Ok(Self {
            storage,
            schema,
            settings: RwLock::new(settings),
            writes: Mutex::new(()),
        })
    }

    /// The schema of the backing table.
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        // The mutex guards no data, so poisoning is ignored.
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(
        &self,
        key: &str,
        value: Option<&str>,
        multiple: bool,
    ) -> Result<(), SettingsError> {
        let name = Value::from(key);
        let content = Value::from(value);

        if multiple {
            self.storage
                .execute(&self.schema.insert_sql(true), &[name, content])?;
            return Ok(());
        }

        let id = self.storage.select_field_value(
            &self.schema.select_id_sql(),
            self.schema.id_column(),
            &[name.clone()],
        )?;
        match id.filter(|id| !id.is_null()) {
            Some(id) => self
                .storage
                .execute(&self.schema.update_content_sql(), &[content, id])?,
            None => self
                .storage
                .execute(&self.schema.insert_sql(false), &[name, content])?,
        };
        Ok(())
    }
}

impl SettingsAccess for SettingsStore {
    fn get_setting(&self, key: &str) -> Option<SettingValue> {
        self.settings
            .read()
            .expect("RwLock should not be poisoned")
            .get(key)
            .cloned()
    }

    fn set_content(
        &self,
        key: &str,
        value: Option<&str>,
        options: SetOptions,
    ) -> Result<(), SettingsError> {
        let _writes = self.lock_writes();
        {
            let mut settings = self.settings.write().expect("RwLock should not be poisoned");
            let content = value.map(str::to_string);

            if options.multiple {
                match settings.get_mut(key) {
                    Some(SettingValue::Multiple(values)) => values.push(content),
                    Some(current) if current.is_null() => {
                        *current = SettingValue::Multiple(vec![content]);
                    }
                    // A single value is never converted into a list. The value is still
                    // persisted below, so the next load will see it.
                    Some(_) => {
                        warn!(
                            setting = key,
                            "Setting holds a single value, multiple value not applied in memory"
                        );
                    }
                    None => {
                        settings.insert(key.to_string(), SettingValue::Multiple(vec![content]));
                    }
                }
            } else {
                settings.insert(key.to_string(), SettingValue::Single(content));
            }
        }

        if options.persistence == Persistence::Temporary {
            return Ok(());
        }
        self.persist(key, value, options.multiple)
    }

    fn remove_setting(&self, key: &str, persistence: Persistence) -> Result<(), SettingsError> {
        let _writes = self.lock_writes();
        self.settings
            .write()
            .expect("RwLock should not be poisoned")
            .remove(key);

        if persistence == Persistence::Temporary {
            return Ok(());
        }
        self.storage
            .execute(&self.schema.delete_sql(), &[Value::from(key)])?;
        Ok(())
    }

    fn settings(&self) -> HashMap<String, SettingValue> {
        self.settings
            .read()
            .expect("RwLock should not be poisoned")
            .clone()
    }
}

/// Read every distinct record of the table into `settings`.
///
/// `on_record` is called with the name of each imported record, before its value is applied.
/// Records without a name are skipped. Returns the number of imported records.
pub(crate) fn import_records(
    storage: &dyn Storage,
    schema: &TableSchema,
    settings: &mut HashMap<String, SettingValue>,
    mut on_record: impl FnMut(&str),
) -> Result<usize, SettingsError> {
    schema.validate()?;

    let rows = storage.select(&schema.select_records_sql())?;
    let mut imported = 0;
    for row in rows {
        let Some(name) = row
            .get(schema.name_column())
            .and_then(as_text)
            .filter(|name| !name.is_empty())
        else {
            continue;
        };
        on_record(&name);

        let content = row.get(schema.content_column()).and_then(as_text);
        let multiple = row.get(schema.multiple_column()).is_some_and(is_truthy);

        if multiple {
            match settings.entry(name) {
                Entry::Occupied(mut entry) => match entry.get_mut() {
                    SettingValue::Multiple(values) => values.push(content),
                    single => *single = SettingValue::Multiple(vec![content]),
                },
                Entry::Vacant(entry) => {
                    entry.insert(SettingValue::Multiple(vec![content]));
                }
            }
        } else {
            settings.insert(name, SettingValue::Single(content));
        }
        imported += 1;
    }

    debug!(table = schema.table(), records = imported, "Imported settings");
    Ok(imported)
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(u8::from(*b).to_string()),
        other => Some(other.to_string()),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(values) => !values.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
