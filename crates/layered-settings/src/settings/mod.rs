//! Table-backed settings stores.
//!
//! Settings are loaded once from a backing table into memory, read from memory, and written
//! through to the table unless a mutation is marked [`Persistence::Temporary`].
//!
//! Two stores share the [`SettingsAccess`] contract:
//!
//! - [`SettingsStore`] loads a single mutable table.
//! - [`ReadonlyOverlayStore`] first loads a read-only table, remembers every name it found there,
//!   then loads the mutable table on top of it. The remembered names can never be set or removed
//!   afterwards, even when the mutable table overrode their values during load.

use std::collections::HashMap;

mod error;
mod overlay;
mod schema;
mod store;
mod value;

pub use error::SettingsError;
pub use overlay::ReadonlyOverlayStore;
pub use schema::TableSchema;
pub use store::SettingsStore;
pub use value::SettingValue;

/// Whether a mutation is written through to the backing table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Persistence {
    /// Apply the change in memory and in the backing table.
    #[default]
    Persistent,
    /// Apply the change in memory only. It is lost on the next load.
    Temporary,
}

/// Options for [`SettingsAccess::set_setting`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Whether the value is written to the backing table.
    pub persistence: Persistence,
    /// Append the value to a multiple setting instead of replacing a single value.
    pub multiple: bool,
}

impl SetOptions {
    /// Persistent, single-valued write.
    pub const fn new() -> Self {
        Self {
            persistence: Persistence::Persistent,
            multiple: false,
        }
    }

    /// Only apply the write in memory.
    pub const fn temporary(self) -> Self {
        Self {
            persistence: Persistence::Temporary,
            ..self
        }
    }

    /// Append to a multiple setting.
    pub const fn multiple(self) -> Self {
        Self {
            multiple: true,
            ..self
        }
    }
}

/// Read and write access to a settings store.
pub trait SettingsAccess {
    /// Returns the current value of `key`, or `None` when it is not set.
    fn get_setting(&self, key: &str) -> Option<SettingValue>;

    /// Returns the current value of `key`, or `default` when it is not set or its content is
    /// null.
    fn get_setting_or(&self, key: &str, default: SettingValue) -> SettingValue {
        self.get_setting(key)
            .filter(|value| !value.is_null())
            .unwrap_or(default)
    }

    /// Sets `key` to `value`, or appends `value` to it when [`SetOptions::multiple`] is set.
    ///
    /// The in-memory mapping is updated before the backing table. If the write to the table
    /// fails the error is returned, but the in-memory change is kept; reload the store to
    /// resynchronize.
    ///
    /// Writes to one store are serialized: the in-memory update and the table write of a call
    /// complete before the next write starts. Nothing coordinates writers in other processes or
    /// other stores sharing the table.
    fn set_setting(
        &self,
        key: &str,
        value: &str,
        options: SetOptions,
    ) -> Result<(), SettingsError> {
        self.set_content(key, Some(value), options)
    }

    /// Same as [`SettingsAccess::set_setting`], but `None` stores null content.
    fn set_content(
        &self,
        key: &str,
        value: Option<&str>,
        options: SetOptions,
    ) -> Result<(), SettingsError>;

    /// Removes `key` and, unless temporary, every record with that name from the backing table.
    fn remove_setting(&self, key: &str, persistence: Persistence) -> Result<(), SettingsError>;

    /// Returns a snapshot of every setting currently held in memory.
    fn settings(&self) -> HashMap<String, SettingValue>;
}
