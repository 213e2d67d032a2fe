use super::{BundleError, SettingsLock};
use crate::archive::ArchiveBuilder;
use crate::sources::{BundleSource, SourceRegistry};
use camino::{Utf8Path, Utf8PathBuf};

/// Result of a successful export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub archive: Utf8PathBuf,
    /// Entry names in archive order
    pub entries: Vec<String>,
}

/// Writes every registered source into one settings bundle.
#[derive(Debug, Clone)]
pub struct BundleExporter {
    settings_dir: Utf8PathBuf,
    sources: SourceRegistry,
}

impl BundleExporter {
    /// # Arguments
    /// * `settings_dir` - Directory holding the canonical files of file-backed sources
    /// * `sources` - Sources in the order they are written to the archive
    pub fn new(settings_dir: impl Into<Utf8PathBuf>, sources: SourceRegistry) -> Self {
        Self {
            settings_dir: settings_dir.into(),
            sources,
        }
    }

    pub fn settings_dir(&self) -> &Utf8Path {
        &self.settings_dir
    }

    /// Export all sources to `destination`, replacing any file already there.
    ///
    /// Runs on the blocking pool while holding the settings lock. On failure the
    /// destination is left as it was.
    pub async fn export(&self, destination: &Utf8Path) -> Result<ExportSummary, BundleError> {
        let result = self.export_locked(destination).await;
        if let Err(e) = &result {
            tracing::warn!("Error exporting settings to {}: {}", destination, e);
        }
        result
    }

    async fn export_locked(&self, destination: &Utf8Path) -> Result<ExportSummary, BundleError> {
        let lock = SettingsLock::acquire(&self.settings_dir).await?;
        let exporter = self.clone();
        let destination = destination.to_path_buf();

        tokio::task::spawn_blocking(move || {
            let _lock = lock;
            exporter.write_bundle(&destination)
        })
        .await?
    }

    /// Blocking variant of [`export`](Self::export) for callers outside a runtime.
    pub fn export_blocking(&self, destination: &Utf8Path) -> Result<ExportSummary, BundleError> {
        let result = SettingsLock::acquire_blocking(&self.settings_dir)
            .and_then(|_lock| self.write_bundle(destination));

        if let Err(e) = &result {
            tracing::warn!("Error exporting settings to {}: {}", destination, e);
        }
        result
    }

    fn write_bundle(&self, destination: &Utf8Path) -> Result<ExportSummary, BundleError> {
        tracing::info!(
            "Exporting {} settings sources to {}",
            self.sources.len(),
            destination
        );

        let mut builder = ArchiveBuilder::new(destination);
        for source in self.sources.iter() {
            match source {
                BundleSource::Serialized(settings) => {
                    let text = settings.export_settings().map_err(|e| {
                        BundleError::SourceExportFailed {
                            entry: settings.entry_name().to_string(),
                            source: e,
                        }
                    })?;
                    builder.add_text(settings.entry_name(), text);
                }
                BundleSource::FileBacked(file) => {
                    let path = self.settings_dir.join(file.file_name());
                    builder.add_file(file.file_name(), &path)?;
                }
            }
            tracing::debug!("Added {} to settings bundle", source.entry_name());
        }

        let entries = builder.finish()?;
        tracing::info!(
            "Exported settings bundle {} ({} entries)",
            destination,
            entries.len()
        );

        Ok(ExportSummary {
            archive: destination.to_path_buf(),
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveReader;
    use crate::sources::{SettingsSource, SourceError};
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct FailingSource;

    impl SettingsSource for FailingSource {
        fn entry_name(&self) -> &str {
            "broken.json"
        }

        fn export_settings(&self) -> Result<String, SourceError> {
            Err(SourceError::Rejected("serializer exploded".to_string()))
        }

        fn import_settings(&self, _content: &str) -> Result<(), SourceError> {
            Ok(())
        }
    }

    fn create_test_dir() -> (TempDir, Utf8PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        (temp_dir, path)
    }

    #[tokio::test]
    async fn test_source_failure_aborts_and_keeps_destination() {
        let (_temp_dir, dir) = create_test_dir();
        let destination = dir.join("bundle.zip");
        fs::write(&destination, "previous bundle").unwrap();

        let mut registry = SourceRegistry::new();
        registry.register_serialized(Arc::new(FailingSource)).unwrap();
        let exporter = BundleExporter::new(dir.join("settings"), registry);

        let result = exporter.export(&destination).await;
        assert!(matches!(
            result,
            Err(BundleError::SourceExportFailed { ref entry, .. }) if entry == "broken.json"
        ));
        assert_eq!(fs::read_to_string(&destination).unwrap(), "previous bundle");
    }

    #[tokio::test]
    async fn test_empty_registry_writes_empty_archive() {
        let (_temp_dir, dir) = create_test_dir();
        let destination = dir.join("out").join("bundle.zip");
        let exporter = BundleExporter::new(dir.join("settings"), SourceRegistry::new());

        let summary = exporter.export(&destination).await.unwrap();
        assert!(summary.entries.is_empty());
        assert!(ArchiveReader::open(&destination).unwrap().is_empty());
    }
}
