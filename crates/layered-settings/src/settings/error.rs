use thiserror::Error;

use crate::storage::StorageError;

/// Errors that can occur when working with settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A set targeted a setting loaded from a read-only table.
    #[error("Can not change readonly setting '{0}'")]
    ReadonlySet(String),

    /// A remove targeted a setting loaded from a read-only table.
    #[error("Can not remove readonly setting '{0}'")]
    ReadonlyRemove(String),

    /// A table or column name in a [`TableSchema`](super::TableSchema) is not a plain identifier.
    #[error("Invalid identifier '{0}' in table schema")]
    InvalidIdentifier(String),

    /// No global [`SettingsRegistry`](crate::registry::SettingsRegistry) has been installed.
    #[error("The global settings registry has not been installed")]
    RegistryNotInstalled,

    /// A global [`SettingsRegistry`](crate::registry::SettingsRegistry) is already installed.
    #[error("The global settings registry is already installed")]
    RegistryAlreadyInstalled,

    /// Storage operation failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SettingsError {
    /// Numeric code of a read-only violation: 401 for a set, 402 for a remove.
    pub fn code(&self) -> Option<u16> {
        match self {
            SettingsError::ReadonlySet(_) => Some(401),
            SettingsError::ReadonlyRemove(_) => Some(402),
            _ => None,
        }
    }

    /// The name of the setting a read-only violation was raised for.
    pub fn setting_name(&self) -> Option<&str> {
        match self {
            SettingsError::ReadonlySet(name) | SettingsError::ReadonlyRemove(name) => Some(name),
            _ => None,
        }
    }
}
