use super::{BundleError, SettingsLock};
use crate::archive::{ArchiveError, ArchiveReader};
use crate::sources::{BundleSource, SourceError, SourceRegistry};
use camino::{Utf8Path, Utf8PathBuf};

/// Result of a successful import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub archive: Utf8PathBuf,
    /// Entries that were applied, in the order they were applied
    pub imported: Vec<String>,
    /// Registered entries the archive did not contain
    pub skipped: Vec<String>,
}

/// Restores registered sources from a settings bundle.
///
/// Entries are applied in registry order. There is no rollback: when an entry fails,
/// every entry before it stays applied and every entry after it is left alone.
#[derive(Debug, Clone)]
pub struct BundleImporter {
    settings_dir: Utf8PathBuf,
    sources: SourceRegistry,
}

impl BundleImporter {
    pub fn new(settings_dir: impl Into<Utf8PathBuf>, sources: SourceRegistry) -> Self {
        Self {
            settings_dir: settings_dir.into(),
            sources,
        }
    }

    pub fn settings_dir(&self) -> &Utf8Path {
        &self.settings_dir
    }

    /// Import the bundle at `source`.
    ///
    /// The archive is opened before anything else happens, so an invalid archive fails
    /// with [`BundleError::InvalidArchive`] without touching the settings directory.
    pub async fn import(&self, source: &Utf8Path) -> Result<ImportSummary, BundleError> {
        let result = self.import_locked(source).await;
        if let Err(e) = &result {
            tracing::warn!("Error importing settings from {}: {}", source, e);
        }
        result
    }

    async fn import_locked(&self, source: &Utf8Path) -> Result<ImportSummary, BundleError> {
        let path = source.to_path_buf();
        let reader = tokio::task::spawn_blocking(move || ArchiveReader::open(&path)).await??;

        let lock = SettingsLock::acquire(&self.settings_dir).await?;
        let importer = self.clone();

        tokio::task::spawn_blocking(move || {
            let _lock = lock;
            importer.apply(reader)
        })
        .await?
    }

    /// Blocking variant of [`import`](Self::import) for callers outside a runtime.
    pub fn import_blocking(&self, source: &Utf8Path) -> Result<ImportSummary, BundleError> {
        let result = ArchiveReader::open(source)
            .map_err(BundleError::from)
            .and_then(|reader| {
                let _lock = SettingsLock::acquire_blocking(&self.settings_dir)?;
                self.apply(reader)
            });

        if let Err(e) = &result {
            tracing::warn!("Error importing settings from {}: {}", source, e);
        }
        result
    }

    fn apply(&self, mut reader: ArchiveReader) -> Result<ImportSummary, BundleError> {
        tracing::info!(
            "Importing settings bundle {} ({} entries)",
            reader.path(),
            reader.len()
        );

        let mut summary = ImportSummary {
            archive: reader.path().to_path_buf(),
            imported: Vec::new(),
            skipped: Vec::new(),
        };

        for source in self.sources.iter() {
            let name = source.entry_name();
            if !reader.contains(name) {
                tracing::debug!("Bundle has no {} entry, leaving it unchanged", name);
                summary.skipped.push(name.to_string());
                continue;
            }

            match source {
                BundleSource::Serialized(settings) => {
                    let text = reader.read_text(name).map_err(|e| match e {
                        ArchiveError::NotText(_) => BundleError::SourceImportFailed {
                            entry: name.to_string(),
                            source: SourceError::Rejected("entry is not UTF-8 text".to_string()),
                        },
                        other => other.into(),
                    })?;
                    settings
                        .import_settings(&text)
                        .map_err(|e| BundleError::SourceImportFailed {
                            entry: name.to_string(),
                            source: e,
                        })?;
                }
                BundleSource::FileBacked(file) => {
                    let target = self.settings_dir.join(file.file_name());
                    let (staged, bytes) = reader.stage_entry(name, &self.settings_dir)?;

                    // A rejected entry is dropped here and never replaces the live file
                    file.validate(staged.path())
                        .map_err(|e| BundleError::SourceImportFailed {
                            entry: name.to_string(),
                            source: e,
                        })?;
                    staged.persist(&target).map_err(|e| {
                        BundleError::io(format!("Failed to replace {}", target), e.error)
                    })?;
                    tracing::debug!("Copied {} ({} bytes) to {}", name, bytes, target);

                    file.after_import()
                        .map_err(|e| BundleError::SourceImportFailed {
                            entry: name.to_string(),
                            source: e,
                        })?;
                }
            }

            tracing::info!("Imported {} from settings bundle", name);
            summary.imported.push(name.to_string());
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveBuilder;
    use crate::sources::{FileBackedSource, PinnedItemsController, SettingsFile};
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct RejectingReload;

    impl FileBackedSource for RejectingReload {
        fn file_name(&self) -> &str {
            "PinnedItems.json"
        }

        fn after_import(&self) -> Result<(), SourceError> {
            Err(SourceError::Rejected("reload failed".to_string()))
        }
    }

    fn create_test_dir() -> (TempDir, Utf8PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        (temp_dir, path)
    }

    #[tokio::test]
    async fn test_file_entry_replaces_settings_file() {
        let (_temp_dir, dir) = create_test_dir();
        let settings_dir = dir.join("settings");
        fs::create_dir_all(&settings_dir).unwrap();
        fs::write(settings_dir.join("filetags.db"), b"old").unwrap();

        let archive = dir.join("bundle.zip");
        let mut builder = ArchiveBuilder::new(&archive);
        builder.add_bytes("filetags.db", vec![0u8, 1, 2, 255]);
        builder.finish().unwrap();

        let mut registry = SourceRegistry::new();
        registry
            .register_file(Arc::new(SettingsFile::new("filetags.db")))
            .unwrap();
        let importer = BundleImporter::new(&settings_dir, registry);

        let summary = importer.import(&archive).await.unwrap();
        assert_eq!(summary.imported, vec!["filetags.db"]);
        assert_eq!(
            fs::read(settings_dir.join("filetags.db")).unwrap(),
            vec![0u8, 1, 2, 255]
        );
    }

    #[tokio::test]
    async fn test_failed_reload_is_source_import_failure() {
        let (_temp_dir, dir) = create_test_dir();
        let archive = dir.join("bundle.zip");
        let mut builder = ArchiveBuilder::new(&archive);
        builder.add_text("PinnedItems.json", "[]");
        builder.finish().unwrap();

        let mut registry = SourceRegistry::new();
        registry.register_file(Arc::new(RejectingReload)).unwrap();
        let importer = BundleImporter::new(dir.join("settings"), registry);

        let result = importer.import(&archive).await;
        assert!(matches!(
            result,
            Err(BundleError::SourceImportFailed { ref entry, .. }) if entry == "PinnedItems.json"
        ));
    }

    #[tokio::test]
    async fn test_rejected_file_entry_keeps_live_file() {
        let (_temp_dir, dir) = create_test_dir();
        let settings_dir = dir.join("settings");
        fs::create_dir_all(&settings_dir).unwrap();
        fs::write(settings_dir.join("PinnedItems.json"), "[]").unwrap();

        let archive = dir.join("bundle.zip");
        let mut builder = ArchiveBuilder::new(&archive);
        builder.add_text("PinnedItems.json", "{ not json");
        builder.finish().unwrap();

        let mut registry = SourceRegistry::new();
        registry
            .register_file(Arc::new(PinnedItemsController::open(&settings_dir).unwrap()))
            .unwrap();
        let importer = BundleImporter::new(&settings_dir, registry);

        let result = importer.import(&archive).await;
        assert!(matches!(
            result,
            Err(BundleError::SourceImportFailed { ref entry, .. }) if entry == "PinnedItems.json"
        ));
        assert_eq!(
            fs::read_to_string(settings_dir.join("PinnedItems.json")).unwrap(),
            "[]"
        );
        let staged: Vec<_> = fs::read_dir(&settings_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp"))
            .collect();
        assert!(staged.is_empty(), "staging file left behind: {staged:?}");
    }

    #[test]
    fn test_import_blocking_missing_archive() {
        let (_temp_dir, dir) = create_test_dir();
        let importer = BundleImporter::new(dir.join("settings"), SourceRegistry::new());

        let result = importer.import_blocking(&dir.join("absent.zip"));
        assert!(matches!(result, Err(BundleError::InvalidArchive(_))));
        assert!(!dir.join("settings").exists());
    }
}
