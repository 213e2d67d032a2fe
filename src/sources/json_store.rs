use super::{SettingsSource, SourceError, file_backed::write_atomic, lock_for_write};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::{PoisonError, RwLock};

/// User preferences keyed by setting name
pub type UserSettings = JsonSettingsStore<IndexMap<String, serde_json::Value>>;

/// Named groups of paths shown as bundles
pub type BundlesSettings = JsonSettingsStore<IndexMap<String, Vec<String>>>;

/// File tag definitions
pub type FileTagsSettings = JsonSettingsStore<Vec<FileTag>>;

/// A user-defined file tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTag {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Color")]
    pub color: String,

    #[serde(rename = "Uid")]
    pub uid: String,
}

/// In-memory settings value persisted as JSON in the settings directory.
///
/// Exports compact JSON with key order preserved. Imports are parsed in full before
/// anything changes, so malformed content leaves both the file and the in-memory value
/// untouched.
#[derive(Debug)]
pub struct JsonSettingsStore<T> {
    entry_name: String,
    settings_dir: Utf8PathBuf,
    path: Utf8PathBuf,
    value: RwLock<T>,
}

impl<T> JsonSettingsStore<T>
where
    T: Serialize + DeserializeOwned + Default + Clone + Send + Sync,
{
    /// Load `file_name` from `settings_dir`, or start from the default value if the file
    /// does not exist yet.
    pub fn open<P: AsRef<Utf8Path>>(settings_dir: P, file_name: &str) -> Result<Self, SourceError> {
        let settings_dir = settings_dir.as_ref().to_path_buf();
        let path = settings_dir.join(file_name);

        let value = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            let value = serde_json::from_str(&contents)?;
            tracing::debug!("Loaded settings from {}", path);
            value
        } else {
            tracing::debug!("Settings file {} not found, using defaults", path);
            T::default()
        };

        Ok(Self {
            entry_name: file_name.to_string(),
            settings_dir,
            path,
            value: RwLock::new(value),
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Clone of the current value
    pub fn get(&self) -> T {
        self.read(T::clone)
    }

    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let value = self.value.read().unwrap_or_else(PoisonError::into_inner);
        f(&value)
    }

    /// Mutate the value and persist it.
    ///
    /// Waits while a bundle operation holds the settings directory.
    pub fn update<F>(&self, update_fn: F) -> Result<(), SourceError>
    where
        F: FnOnce(&mut T),
    {
        let _lock = lock_for_write(&self.settings_dir)?;
        let mut value = self.value.write().unwrap_or_else(PoisonError::into_inner);
        let mut updated = value.clone();
        update_fn(&mut updated);

        self.save(&updated)?;
        *value = updated;
        Ok(())
    }

    fn save(&self, value: &T) -> Result<(), SourceError> {
        let json = serde_json::to_string_pretty(value)?;
        write_atomic(&self.path, json.as_bytes())?;
        tracing::debug!("Saved settings to {}", self.path);
        Ok(())
    }
}

impl<T> SettingsSource for JsonSettingsStore<T>
where
    T: Serialize + DeserializeOwned + Default + Clone + Send + Sync,
{
    fn entry_name(&self) -> &str {
        &self.entry_name
    }

    fn export_settings(&self) -> Result<String, SourceError> {
        let value = self.value.read().unwrap_or_else(PoisonError::into_inner);
        Ok(serde_json::to_string(&*value)?)
    }

    fn import_settings(&self, content: &str) -> Result<(), SourceError> {
        let imported: T = serde_json::from_str(content)?;

        let mut value = self.value.write().unwrap_or_else(PoisonError::into_inner);
        self.save(&imported)?;
        *value = imported;

        tracing::info!("Imported settings into {}", self.path);
        Ok(())
    }
}
