//! Services module - settings bundle export and import.
//!
//! # Components
//!
//! - [`BundleExporter`]: pulls serialized state and settings files from every registered
//!   source and writes them into one archive. The archive is staged next to the
//!   destination and only renamed into place once every entry was written.
//!
//! - [`BundleImporter`]: opens an archive and pushes each entry back into its owning
//!   source. Missing entries are skipped, so older or partial bundles still import. The
//!   first failing entry stops the import; entries before it stay applied.
//!
//! - [`SettingsLock`]: exclusive lock on a settings directory, held for the duration of
//!   one bundle operation (in-process mutex plus `flock` on unix).
//!
//! Both orchestrators receive the settings directory and a
//! [`SourceRegistry`](crate::sources::SourceRegistry) explicitly; nothing is looked up
//! through global state.
//!
//! # Usage Example
//!
//! ```ignore
//! use settings_porter::services::{BundleExporter, BundleImporter};
//! use settings_porter::sources::SettingsStores;
//!
//! let stores = SettingsStores::open(&settings_dir)?;
//! let exporter = BundleExporter::new(&settings_dir, stores.registry());
//! exporter.export("Files_3.0.0.zip".as_ref()).await?;
//!
//! let importer = BundleImporter::new(&settings_dir, stores.registry());
//! let summary = importer.import("Files_3.0.0.zip".as_ref()).await?;
//! ```

pub mod export;
pub mod import;
pub mod lock;

pub use export::{BundleExporter, ExportSummary};
pub use import::{BundleImporter, ImportSummary};
pub use lock::SettingsLock;

use crate::archive::ArchiveError;
use crate::sources::SourceError;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur during a bundle export or import
#[derive(Error, Debug)]
pub enum BundleError {
    #[error("Not a valid settings bundle: {0}")]
    InvalidArchive(#[source] ArchiveError),

    #[error("Failed to export {entry}: {source}")]
    SourceExportFailed {
        entry: String,
        #[source]
        source: SourceError,
    },

    #[error("Failed to import {entry}: {source}")]
    SourceImportFailed {
        entry: String,
        #[source]
        source: SourceError,
    },

    #[error(transparent)]
    Archive(ArchiveError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("More than one settings source uses the entry name {0}")]
    DuplicateEntry(String),

    #[error("Failed to lock settings directory {path}: {reason}")]
    Lock { path: Utf8PathBuf, reason: String },

    #[error("Bundle task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<ArchiveError> for BundleError {
    fn from(error: ArchiveError) -> Self {
        match error {
            ArchiveError::InvalidArchive { .. } => Self::InvalidArchive(error),
            other => Self::Archive(other),
        }
    }
}

impl BundleError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// True for disk or permission failures, wherever they surfaced.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::Archive(ArchiveError::Io { .. })
                | Self::SourceExportFailed {
                    source: SourceError::Io(_),
                    ..
                }
                | Self::SourceImportFailed {
                    source: SourceError::Io(_),
                    ..
                }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zip::result::ZipError;

    #[test]
    fn test_invalid_archive_is_routed() {
        let error: BundleError = ArchiveError::InvalidArchive {
            path: Utf8PathBuf::from("bundle.zip"),
            source: ZipError::InvalidArchive("bad header".into()),
        }
        .into();
        assert!(matches!(error, BundleError::InvalidArchive(_)));

        let error: BundleError = ArchiveError::EntryNotFound("x".to_string()).into();
        assert!(matches!(error, BundleError::Archive(_)));
    }

    #[test]
    fn test_is_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(BundleError::io("Failed to write", io).is_io());

        let error = BundleError::SourceImportFailed {
            entry: "bundles.json".to_string(),
            source: SourceError::Rejected("bad".to_string()),
        };
        assert!(!error.is_io());
        assert_eq!(error.to_string(), "Failed to import bundles.json: Settings rejected: bad");
    }
}
