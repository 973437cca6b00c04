#![doc = include_str!("../README.md")]

/// This module defines the query/execute contract the settings stores require from a database.
pub mod storage;

/// This module provides a registry holding one shared instance per settings type.
pub mod registry;

/// Table-backed settings stores, including the read-only overlay.
pub mod settings;

mod backend;

pub use backend::{DatabaseConfiguration, SqliteStorage};
pub use registry::{DefaultSettings, SettingsRegistry};
pub use settings::{
    Persistence, ReadonlyOverlayStore, SetOptions, SettingValue, SettingsAccess, SettingsError,
    SettingsStore, TableSchema,
};
pub use storage::{Row, Storage, StorageError};
