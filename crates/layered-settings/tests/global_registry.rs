use std::sync::Arc;

use layered_settings::{
    register_readonly_settings_table, register_settings_table, DatabaseConfiguration,
    DefaultSettings, SetOptions, SettingValue, SettingsAccess, SettingsError, SettingsRegistry,
    SqliteStorage, Storage, TableSchema,
};

register_settings_table!(
    /// Settings edited by the user.
    struct UserSettings = TableSchema::new("user_settings")
);

register_readonly_settings_table!(
    /// Settings shipped with the installation.
    struct SystemSettings {
        readonly: TableSchema::new("system_settings_readonly"),
        table: TableSchema::new("system_settings"),
    }
);

fn storage() -> SqliteStorage {
    let storage = SqliteStorage::open(&DatabaseConfiguration::InMemory).unwrap();
    for table in [
        "user_settings",
        "system_settings_readonly",
        "system_settings",
    ] {
        storage.ensure_table(&TableSchema::new(table)).unwrap();
    }
    storage
        .execute(
            "INSERT INTO system_settings_readonly (name, content, multiple) \
             VALUES ('version', '1.0', 0)",
            &[],
        )
        .unwrap();
    storage
}

// The global registry can only be installed once per process, so every step lives in one test.
#[test]
fn global_registry_serves_one_instance_per_type() {
    assert!(matches!(
        UserSettings::default_setting(),
        Err(SettingsError::RegistryNotInstalled)
    ));

    let registry = SettingsRegistry::new(Arc::new(storage()))
        .install_global()
        .unwrap();
    assert!(matches!(
        SettingsRegistry::new(Arc::new(storage())).install_global(),
        Err(SettingsError::RegistryAlreadyInstalled)
    ));

    let user = UserSettings::default_setting().unwrap();
    assert!(Arc::ptr_eq(&user, &UserSettings::default_setting().unwrap()));
    assert!(Arc::ptr_eq(
        &user,
        &registry.default_setting::<UserSettings>().unwrap()
    ));

    user.set_setting("theme", "dark", SetOptions::new()).unwrap();
    assert_eq!(
        UserSettings::default_setting()
            .unwrap()
            .get_setting("theme"),
        Some(SettingValue::from("dark"))
    );

    let system = SystemSettings::default_setting().unwrap();
    assert_eq!(system.get_setting("version"), Some(SettingValue::from("1.0")));
    assert!(matches!(
        system.set_setting("version", "2.0", SetOptions::new()),
        Err(SettingsError::ReadonlySet(_))
    ));
    assert_eq!(system.get_setting("theme"), None);
    assert_eq!(UserSettings::NAME, "UserSettings");
}
