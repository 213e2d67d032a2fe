//! Settings sources that take part in a settings bundle.
//!
//! Every source owns exactly one entry in the bundle archive. There are two kinds:
//!
//! - [`SettingsSource`]: an in-memory store that serializes itself to text and restores
//!   itself from text (user settings, bundles, file tags).
//! - [`FileBackedSource`]: a store whose canonical state is already a file in the settings
//!   directory (pinned items, terminal profiles, the file tag database). These are copied
//!   into and out of the archive byte for byte under their own file name.
//!
//! [`SourceRegistry`] keeps the sources in bundle order and is what the exporter and
//! importer iterate over. Adding a source is a single `register` call.

pub mod file_backed;
pub mod json_store;

pub use file_backed::{PinnedItemsController, SettingsFile};
pub use json_store::{BundlesSettings, FileTag, FileTagsSettings, JsonSettingsStore, UserSettings};

use crate::services::{BundleError, SettingsLock};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Name of the settings folder inside the application data directory
pub const SETTINGS_FOLDER_NAME: &str = "settings";

pub const USER_SETTINGS_FILE_NAME: &str = "user_settings.json";
pub const BUNDLES_SETTINGS_FILE_NAME: &str = "bundles.json";
pub const FILE_TAG_SETTINGS_FILE_NAME: &str = "filetags.json";
pub const PINNED_ITEMS_FILE_NAME: &str = "PinnedItems.json";
pub const TERMINAL_PROFILES_FILE_NAME: &str = "terminal.json";
pub const FILE_TAGS_DB_FILE_NAME: &str = "filetags.db";

/// Errors a settings source can report while exporting or importing
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Malformed settings content: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings rejected: {0}")]
    Rejected(String),

    #[error("Could not lock settings directory: {0}")]
    Lock(String),
}

/// Take the settings lock for an ordinary store write.
pub(crate) fn lock_for_write(settings_dir: &Utf8Path) -> Result<SettingsLock, SourceError> {
    SettingsLock::acquire_blocking(settings_dir).map_err(|e| SourceError::Lock(e.to_string()))
}

/// A store that round-trips its state through text
pub trait SettingsSource: Send + Sync {
    /// Reserved archive entry name
    fn entry_name(&self) -> &str;

    fn export_settings(&self) -> Result<String, SourceError>;

    /// Replace the current state with `content`. Malformed content must be rejected
    /// without changing the store.
    fn import_settings(&self, content: &str) -> Result<(), SourceError>;
}

/// A store whose state lives in a file inside the settings directory
pub trait FileBackedSource: Send + Sync {
    /// File name on disk, also used as the archive entry name
    fn file_name(&self) -> &str;

    /// Check a staged replacement before it is moved over the file. Content the store
    /// could not load must be rejected here so the current file stays in place.
    fn validate(&self, _staged: &Path) -> Result<(), SourceError> {
        Ok(())
    }

    /// Called after the file was replaced by an import.
    fn after_import(&self) -> Result<(), SourceError> {
        Ok(())
    }
}

/// One registered bundle participant
#[derive(Clone)]
pub enum BundleSource {
    Serialized(Arc<dyn SettingsSource>),
    FileBacked(Arc<dyn FileBackedSource>),
}

impl BundleSource {
    pub fn entry_name(&self) -> &str {
        match self {
            Self::Serialized(source) => source.entry_name(),
            Self::FileBacked(source) => source.file_name(),
        }
    }

    pub fn is_file_backed(&self) -> bool {
        matches!(self, Self::FileBacked(_))
    }
}

impl fmt::Debug for BundleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialized(_) => write!(f, "Serialized({})", self.entry_name()),
            Self::FileBacked(_) => write!(f, "FileBacked({})", self.entry_name()),
        }
    }
}

/// Ordered set of bundle sources with unique entry names
#[derive(Clone, Debug, Default)]
pub struct SourceRegistry {
    sources: Vec<BundleSource>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source. Fails if another source already owns the same entry name.
    pub fn register(&mut self, source: BundleSource) -> Result<&mut Self, BundleError> {
        if self.contains(source.entry_name()) {
            return Err(BundleError::DuplicateEntry(source.entry_name().to_string()));
        }
        self.sources.push(source);
        Ok(self)
    }

    pub fn register_serialized(
        &mut self,
        source: Arc<dyn SettingsSource>,
    ) -> Result<&mut Self, BundleError> {
        self.register(BundleSource::Serialized(source))
    }

    pub fn register_file(
        &mut self,
        source: Arc<dyn FileBackedSource>,
    ) -> Result<&mut Self, BundleError> {
        self.register(BundleSource::FileBacked(source))
    }

    pub fn contains(&self, entry_name: &str) -> bool {
        self.sources.iter().any(|s| s.entry_name() == entry_name)
    }

    pub fn entry_names(&self) -> Vec<&str> {
        self.sources.iter().map(BundleSource::entry_name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BundleSource> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// The application's settings stores, opened from one settings directory.
///
/// Holds typed handles so the rest of the application can use the stores directly, and
/// produces the [`SourceRegistry`] in the order the bundle has always been written.
#[derive(Clone)]
pub struct SettingsStores {
    settings_dir: Utf8PathBuf,
    pub user_settings: Arc<UserSettings>,
    pub bundles: Arc<BundlesSettings>,
    pub pinned_items: Arc<PinnedItemsController>,
    pub terminal_profiles: Arc<SettingsFile>,
    pub file_tags: Arc<FileTagsSettings>,
    pub file_tags_db: Arc<SettingsFile>,
}

impl SettingsStores {
    /// Open every store in `settings_dir`, creating the directory if needed.
    pub fn open<P: AsRef<Utf8Path>>(settings_dir: P) -> Result<Self, SourceError> {
        let settings_dir = settings_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&settings_dir)?;

        let stores = Self {
            user_settings: Arc::new(JsonSettingsStore::open(
                &settings_dir,
                USER_SETTINGS_FILE_NAME,
            )?),
            bundles: Arc::new(JsonSettingsStore::open(
                &settings_dir,
                BUNDLES_SETTINGS_FILE_NAME,
            )?),
            pinned_items: Arc::new(PinnedItemsController::open(&settings_dir)?),
            terminal_profiles: Arc::new(SettingsFile::new(TERMINAL_PROFILES_FILE_NAME)),
            file_tags: Arc::new(JsonSettingsStore::open(
                &settings_dir,
                FILE_TAG_SETTINGS_FILE_NAME,
            )?),
            file_tags_db: Arc::new(SettingsFile::new(FILE_TAGS_DB_FILE_NAME)),
            settings_dir,
        };

        tracing::info!("Opened settings stores in {}", stores.settings_dir);
        Ok(stores)
    }

    pub fn settings_dir(&self) -> &Utf8Path {
        &self.settings_dir
    }

    /// Registry in bundle order: user settings, bundles, pinned items, terminal
    /// profiles, file tags, file tag database.
    pub fn registry(&self) -> SourceRegistry {
        let mut registry = SourceRegistry::new();
        let sources = [
            BundleSource::Serialized(self.user_settings.clone()),
            BundleSource::Serialized(self.bundles.clone()),
            BundleSource::FileBacked(self.pinned_items.clone()),
            BundleSource::FileBacked(self.terminal_profiles.clone()),
            BundleSource::Serialized(self.file_tags.clone()),
            BundleSource::FileBacked(self.file_tags_db.clone()),
        ];
        // Names are distinct constants, so registration cannot collide.
        registry.sources.extend(sources);
        registry
    }
}
