use super::{FileBackedSource, PINNED_ITEMS_FILE_NAME, SourceError, lock_for_write};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{PoisonError, RwLock};
use tempfile::NamedTempFile;

/// Replace `path` with `contents` via a staging file in the same directory.
pub(crate) fn write_atomic(path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    fs::create_dir_all(parent)?;

    let mut staging = NamedTempFile::new_in(parent)?;
    staging.write_all(contents)?;
    staging.as_file_mut().sync_all()?;
    staging.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// A settings file that is owned by another subsystem and bundled as-is
/// (terminal profiles, the file tag database).
#[derive(Debug, Clone)]
pub struct SettingsFile {
    file_name: String,
}

impl SettingsFile {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }
}

impl FileBackedSource for SettingsFile {
    fn file_name(&self) -> &str {
        &self.file_name
    }
}

/// Sidebar pinned items, stored as a JSON array of paths in `PinnedItems.json`.
///
/// The in-memory list is reloaded from disk after a bundle import replaces the file.
/// A replacement that does not parse as a list is rejected before it reaches the disk.
#[derive(Debug)]
pub struct PinnedItemsController {
    settings_dir: Utf8PathBuf,
    path: Utf8PathBuf,
    items: RwLock<Vec<String>>,
}

impl PinnedItemsController {
    /// Open the pinned items file in `settings_dir`, creating an empty list if absent.
    pub fn open<P: AsRef<Utf8Path>>(settings_dir: P) -> Result<Self, SourceError> {
        let settings_dir = settings_dir.as_ref().to_path_buf();
        let path = settings_dir.join(PINNED_ITEMS_FILE_NAME);
        if !path.exists() {
            write_atomic(&path, b"[]")?;
            tracing::info!("Created empty pinned items file at {}", path);
        }

        let items = Self::load(&path)?;
        Ok(Self {
            settings_dir,
            path,
            items: RwLock::new(items),
        })
    }

    fn load(path: impl AsRef<Path>) -> Result<Vec<String>, SourceError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn items(&self) -> Vec<String> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_pinned(&self, item: &str) -> bool {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|i| i.eq_ignore_ascii_case(item))
    }

    /// Pin `item` at the end of the list. Returns false if it was already pinned.
    pub fn pin(&self, item: impl Into<String>) -> Result<bool, SourceError> {
        let item = item.into();
        let _lock = lock_for_write(&self.settings_dir)?;
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        if items.iter().any(|i| i.eq_ignore_ascii_case(&item)) {
            return Ok(false);
        }

        let mut updated = items.clone();
        updated.push(item);
        self.save(&updated)?;
        *items = updated;
        Ok(true)
    }

    /// Returns false if `item` was not pinned.
    pub fn unpin(&self, item: &str) -> Result<bool, SourceError> {
        let _lock = lock_for_write(&self.settings_dir)?;
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        let updated: Vec<String> = items
            .iter()
            .filter(|i| !i.eq_ignore_ascii_case(item))
            .cloned()
            .collect();
        if updated.len() == items.len() {
            return Ok(false);
        }

        self.save(&updated)?;
        *items = updated;
        Ok(true)
    }

    /// Re-read the list from disk.
    pub fn reload(&self) -> Result<(), SourceError> {
        let loaded = Self::load(&self.path)?;
        let count = loaded.len();
        *self.items.write().unwrap_or_else(PoisonError::into_inner) = loaded;
        tracing::info!("Reloaded {} pinned items from {}", count, self.path);
        Ok(())
    }

    fn save(&self, items: &[String]) -> Result<(), SourceError> {
        let json = serde_json::to_string(items)?;
        write_atomic(&self.path, json.as_bytes())?;
        Ok(())
    }
}

impl FileBackedSource for PinnedItemsController {
    fn file_name(&self) -> &str {
        PINNED_ITEMS_FILE_NAME
    }

    fn validate(&self, staged: &Path) -> Result<(), SourceError> {
        Self::load(staged).map(|_| ())
    }

    fn after_import(&self) -> Result<(), SourceError> {
        self.reload()
    }
}
