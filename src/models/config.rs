use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Application configuration from `settings-porter.yaml`
///
/// Every field has a default, so an absent or partial file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application data directory; settings live in its `settings` folder
    #[serde(default = "default_app_data_dir")]
    pub app_data_dir: Utf8PathBuf,

    #[serde(default)]
    pub debug_mode: bool,

    #[serde(default = "default_console_logging")]
    pub console_logging: bool,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Prefix of the suggested export file name (`<prefix>_<version>.zip`)
    #[serde(default = "default_archive_prefix")]
    pub archive_prefix: String,
}

/// Format of the rolling log file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_data_dir: default_app_data_dir(),
            debug_mode: false,
            console_logging: default_console_logging(),
            log_format: LogFormat::default(),
            archive_prefix: default_archive_prefix(),
        }
    }
}

impl AppConfig {
    pub fn settings_dir(&self) -> Utf8PathBuf {
        self.app_data_dir.join(crate::sources::SETTINGS_FOLDER_NAME)
    }

    pub fn log_dir(&self) -> Utf8PathBuf {
        self.app_data_dir.join("logs")
    }

    /// Suggested file name for a new export, without extension
    pub fn suggested_archive_name(&self) -> String {
        format!("{}_{}", self.archive_prefix, crate::VERSION)
    }
}

fn default_app_data_dir() -> Utf8PathBuf {
    dirs::data_local_dir()
        .and_then(|dir| Utf8PathBuf::try_from(dir).ok())
        .unwrap_or_else(|| Utf8PathBuf::from("."))
        .join(crate::APP_NAME)
}

fn default_console_logging() -> bool {
    true
}

fn default_archive_prefix() -> String {
    "Files".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_defaults() {
        let config = AppConfig::default();
        assert!(!config.debug_mode);
        assert!(config.console_logging);
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.app_data_dir.ends_with(crate::APP_NAME));
    }

    #[test]
    fn test_derived_directories() {
        let config = AppConfig {
            app_data_dir: Utf8PathBuf::from("/data/porter"),
            ..AppConfig::default()
        };
        assert_eq!(config.settings_dir(), "/data/porter/settings");
        assert_eq!(config.log_dir(), "/data/porter/logs");
    }

    #[test]
    fn test_suggested_archive_name() {
        let config = AppConfig::default();
        assert_eq!(
            config.suggested_archive_name(),
            format!("Files_{}", crate::VERSION)
        );
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: AppConfig = serde_yaml_ng::from_str("debug_mode: true\nlog_format: json\n").unwrap();
        assert!(config.debug_mode);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.archive_prefix, "Files");
    }
}
