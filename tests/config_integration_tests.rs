//! Integration tests for ConfigManager and configuration file handling
//!
//! These tests verify:
//! - Configuration loading and saving
//! - Defaults for missing files and missing keys
//! - Paths derived from the configuration
//! - Integration with SettingsStores

use camino::Utf8PathBuf;
use settings_porter::sources::{SETTINGS_FOLDER_NAME, USER_SETTINGS_FILE_NAME};
use settings_porter::{AppConfig, ConfigManager, LogFormat, SettingsStores};
use std::fs;
use tempfile::TempDir;

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

#[test]
fn test_create_config_manager() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    assert_eq!(manager.config_dir(), &config_path);
    assert_eq!(
        manager.config_path(),
        config_path.join("settings-porter.yaml")
    );
}

#[test]
fn test_config_dir_created_if_missing() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let nested = config_path.join("a").join("b");

    ConfigManager::new(&nested).unwrap();
    assert!(nested.is_dir());
}

#[test]
fn test_load_default_config() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    // Config file doesn't exist, should return defaults
    let config = manager.load_app_config().unwrap();
    let defaults = AppConfig::default();

    assert_eq!(config.archive_prefix, "Files");
    assert_eq!(config.log_format, defaults.log_format);
    assert_eq!(config.app_data_dir, defaults.app_data_dir);
    assert!(config.console_logging);
}

#[test]
fn test_partial_config_keeps_defaults() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    fs::write(
        manager.config_path(),
        "archive_prefix: Backup\nlog_format: json\n",
    )
    .unwrap();

    let config = manager.load_app_config().unwrap();
    assert_eq!(config.archive_prefix, "Backup");
    assert_eq!(config.log_format, LogFormat::Json);
    assert!(!config.debug_mode);
    assert!(config.console_logging);
}

#[test]
fn test_save_and_load_config() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let mut config = manager.load_app_config().unwrap();
    config.app_data_dir = config_path.join("data");
    config.console_logging = false;
    manager.save_app_config(&config).unwrap();

    let loaded = manager.load_app_config().unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_derived_paths() {
    let config = AppConfig {
        app_data_dir: Utf8PathBuf::from("/data/porter"),
        archive_prefix: "Files".to_string(),
        ..AppConfig::default()
    };

    assert_eq!(
        config.settings_dir(),
        Utf8PathBuf::from("/data/porter").join(SETTINGS_FOLDER_NAME)
    );
    assert_eq!(config.log_dir(), Utf8PathBuf::from("/data/porter/logs"));
    assert_eq!(
        config.suggested_archive_name(),
        format!("Files_{}", settings_porter::VERSION)
    );
}

#[test]
fn test_stores_open_in_configured_settings_dir() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let mut config = manager.load_app_config().unwrap();
    config.app_data_dir = config_path.join("data");

    let stores = SettingsStores::open(config.settings_dir()).unwrap();
    stores
        .user_settings
        .update(|settings| {
            settings.insert("theme".to_string(), serde_json::json!("dark"));
        })
        .unwrap();

    let written = config.settings_dir().join(USER_SETTINGS_FILE_NAME);
    assert!(written.is_file());
    assert!(fs::read_to_string(written).unwrap().contains("dark"));
}
