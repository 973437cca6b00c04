use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::{Arc, Mutex, OnceLock, PoisonError},
};

use tracing::info;

use crate::{settings::SettingsError, storage::Storage};

static GLOBAL_REGISTRY: OnceLock<SettingsRegistry> = OnceLock::new();

/// Holds the instance of one settings type once it has been loaded.
type Slot = Arc<Mutex<Option<Arc<dyn Any + Send + Sync>>>>;

/// A concrete settings store type with a single shared default instance.
///
/// It should usually not be implemented manually; use the [crate::register_settings_table] and
/// [crate::register_readonly_settings_table] macros instead.
pub trait DefaultSettings: Sized + Send + Sync + 'static {
    /// The name of the type implementing this trait.
    const NAME: &'static str;

    /// Construct the store, loading its tables from `storage`.
    fn load(storage: Arc<dyn Storage>) -> Result<Self, SettingsError>;

    /// Returns the default instance from the global registry, loading it on first access.
    ///
    /// Fails with [`SettingsError::RegistryNotInstalled`] until
    /// [`SettingsRegistry::install_global`] has been called.
    fn default_setting() -> Result<Arc<Self>, SettingsError> {
        SettingsRegistry::global()?.default_setting::<Self>()
    }
}

/// A registry holding one lazily loaded instance per [`DefaultSettings`] type.
///
/// Every instance is loaded from the storage handle the registry was created with. Loading is
/// serialized per type, so concurrent first accesses load a type once, while other types stay
/// available.
pub struct SettingsRegistry {
    storage: Arc<dyn Storage>,
    slots: Mutex<HashMap<TypeId, Slot>>,
}

impl std::fmt::Debug for SettingsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsRegistry").finish()
    }
}

impl SettingsRegistry {
    /// Creates an empty registry loading its stores from `storage`.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        SettingsRegistry {
            storage,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Installs this registry as the process-wide registry used by
    /// [`DefaultSettings::default_setting`]. Can only succeed once.
    pub fn install_global(self) -> Result<&'static SettingsRegistry, SettingsError> {
        let mut installed = false;
        let registry = GLOBAL_REGISTRY.get_or_init(|| {
            installed = true;
            self
        });

        if !installed {
            return Err(SettingsError::RegistryAlreadyInstalled);
        }
        Ok(registry)
    }

    /// Returns the process-wide registry.
    pub fn global() -> Result<&'static SettingsRegistry, SettingsError> {
        GLOBAL_REGISTRY
            .get()
            .ok_or(SettingsError::RegistryNotInstalled)
    }

    /// Returns the instance of `T`, loading it on first access.
    ///
    /// A failed or panicked load is not remembered; the next call tries again. `T::load` may
    /// load other settings types from this registry, but not `T` itself.
    pub fn default_setting<T: DefaultSettings>(&self) -> Result<Arc<T>, SettingsError> {
        let slot = self.slot::<T>();
        let mut instance = slot.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = instance.as_ref() {
            if let Ok(existing) = Arc::clone(existing).downcast::<T>() {
                return Ok(existing);
            }
        }

        let loaded = Arc::new(T::load(Arc::clone(&self.storage))?);
        info!(settings = T::NAME, "Loaded default settings");
        *instance = Some(loaded.clone());

        Ok(loaded)
    }

    /// True if the instance of `T` has already been loaded.
    pub fn is_loaded<T: DefaultSettings>(&self) -> bool {
        let slot = self
            .slots
            .lock()
            .expect("Mutex should not be poisoned")
            .get(&TypeId::of::<T>())
            .cloned();

        slot.is_some_and(|slot| {
            slot.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_some()
        })
    }

    fn slot<T: DefaultSettings>(&self) -> Slot {
        self.slots
            .lock()
            .expect("Mutex should not be poisoned")
            .entry(TypeId::of::<T>())
            .or_default()
            .clone()
    }
}

/// Declare a settings type backed by a single mutable table.
///
/// The generated type dereferences to [`SettingsStore`](crate::settings::SettingsStore) and
/// implements [`DefaultSettings`].
///
/// ```rust
/// use layered_settings::{register_settings_table, TableSchema};
///
/// register_settings_table!(
///     /// Settings editable by the user.
///     pub struct UserSettings = TableSchema::new("user_settings")
/// );
/// ```
#[macro_export]
macro_rules! register_settings_table {
    ($(#[$meta:meta])* $vis:vis struct $name:ident = $schema:expr) => {
        $(#[$meta])*
        $vis struct $name($crate::settings::SettingsStore);

        impl $crate::registry::DefaultSettings for $name {
            const NAME: &'static str = stringify!($name);

            fn load(
                storage: ::std::sync::Arc<dyn $crate::storage::Storage>,
            ) -> ::std::result::Result<Self, $crate::settings::SettingsError> {
                $crate::settings::SettingsStore::load(storage, $schema).map($name)
            }
        }

        impl ::std::ops::Deref for $name {
            type Target = $crate::settings::SettingsStore;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
    };
}

/// Declare a settings type whose read-only table is loaded before its mutable table.
///
/// The generated type dereferences to
/// [`ReadonlyOverlayStore`](crate::settings::ReadonlyOverlayStore) and implements
/// [`DefaultSettings`].
///
/// ```rust
/// use layered_settings::{register_readonly_settings_table, TableSchema};
///
/// register_readonly_settings_table!(
///     /// Settings shipped with the installation, overridable but not editable.
///     pub struct SystemSettings {
///         readonly: TableSchema::new("system_settings_readonly"),
///         table: TableSchema::new("system_settings"),
///     }
/// );
/// ```
#[macro_export]
macro_rules! register_readonly_settings_table {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            readonly: $readonly:expr,
            table: $schema:expr $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name($crate::settings::ReadonlyOverlayStore);

        impl $crate::registry::DefaultSettings for $name {
            const NAME: &'static str = stringify!($name);

            fn load(
                storage: ::std::sync::Arc<dyn $crate::storage::Storage>,
            ) -> ::std::result::Result<Self, $crate::settings::SettingsError> {
                $crate::settings::ReadonlyOverlayStore::load(storage, $readonly, $schema)
                    .map($name)
            }
        }

        impl ::std::ops::Deref for $name {
            type Target = $crate::settings::ReadonlyOverlayStore;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
    };
}
