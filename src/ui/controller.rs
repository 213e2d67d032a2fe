//! AboutController - view model for the About/Settings screen
//!
//! Wires the export and import commands to the file pickers, the bundle services and
//! the error dialog, and provides the version and link helpers the screen shows.
//!
//! Failures of both commands are logged and shown to the user. Dismissing a picker is
//! not an error and does nothing.

use super::dialogs::Dialogs;
use super::platform;
use crate::models::{AppConfig, BundleOperation};
use crate::services::{BundleError, BundleExporter, BundleImporter};
use crate::sources::SettingsStores;
use crate::state::StateManager;
use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;

pub const EXPORT_ERROR_TITLE: &str = "Settings export failed";
pub const EXPORT_ERROR_DESCRIPTION: &str =
    "The settings bundle could not be written. Any previous file at that location was left unchanged.";
pub const IMPORT_ERROR_TITLE: &str = "Settings import failed";
pub const IMPORT_ERROR_DESCRIPTION: &str =
    "The settings bundle could not be imported completely. Settings imported before the error remain applied.";

/// Result of an export or import command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Completed { archive: Utf8PathBuf },
    /// The user dismissed the picker
    Cancelled,
    /// Another bundle operation is still running
    Busy,
    Failed(String),
}

/// External pages linked from the About screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AboutLink {
    Feedback,
    ReleaseNotes,
    Documentation,
    Contributors,
    PrivacyPolicy,
    SupportUs,
}

impl AboutLink {
    pub fn url(&self) -> &'static str {
        match self {
            Self::Feedback => "https://github.com/files-community/Files/issues/new/choose",
            Self::ReleaseNotes => "https://github.com/files-community/Files/releases",
            Self::Documentation => "https://files.community/docs",
            Self::Contributors => "https://github.com/files-community/Files/graphs/contributors",
            Self::PrivacyPolicy => "https://github.com/files-community/Files/blob/main/Privacy.md",
            Self::SupportUs => "https://github.com/sponsors/yaichenbaum",
        }
    }
}

/// View model behind the About screen
pub struct AboutController<D: Dialogs> {
    dialogs: D,
    state: Arc<StateManager>,
    exporter: BundleExporter,
    importer: BundleImporter,
    config: AppConfig,
}

impl<D: Dialogs> AboutController<D> {
    /// Create a controller over the application's settings stores.
    pub fn new(
        dialogs: D,
        state: Arc<StateManager>,
        stores: &SettingsStores,
        config: AppConfig,
    ) -> Self {
        let settings_dir = stores.settings_dir().to_path_buf();
        state.set_settings_dir(Some(settings_dir.clone()));

        Self {
            dialogs,
            state,
            exporter: BundleExporter::new(settings_dir.clone(), stores.registry()),
            importer: BundleImporter::new(settings_dir, stores.registry()),
            config,
        }
    }

    pub fn state(&self) -> &Arc<StateManager> {
        &self.state
    }

    // ===== Bundle commands =====

    /// Ask for a destination and export all settings there.
    pub async fn export_settings(&self) -> OperationOutcome {
        let suggested = self.config.suggested_archive_name();
        match self.dialogs.pick_save_archive(&suggested) {
            Some(destination) => self.export_to(&destination).await,
            None => {
                tracing::debug!("Export cancelled: no destination picked");
                OperationOutcome::Cancelled
            }
        }
    }

    /// Export all settings to `destination`.
    pub async fn export_to(&self, destination: &Utf8Path) -> OperationOutcome {
        if !self.state.try_begin_operation(BundleOperation::Export) {
            return OperationOutcome::Busy;
        }

        match self.exporter.export(destination).await {
            Ok(summary) => {
                self.state.complete_operation(Some(summary.archive.clone()));
                OperationOutcome::Completed {
                    archive: summary.archive,
                }
            }
            Err(e) => self.report_failure(EXPORT_ERROR_TITLE, EXPORT_ERROR_DESCRIPTION, &e),
        }
    }

    /// Ask for a bundle and import it.
    pub async fn import_settings(&self) -> OperationOutcome {
        match self.dialogs.pick_open_archive() {
            Some(source) => self.import_from(&source).await,
            None => {
                tracing::debug!("Import cancelled: no archive picked");
                OperationOutcome::Cancelled
            }
        }
    }

    /// Import the bundle at `source`.
    pub async fn import_from(&self, source: &Utf8Path) -> OperationOutcome {
        if !self.state.try_begin_operation(BundleOperation::Import) {
            return OperationOutcome::Busy;
        }

        match self.importer.import(source).await {
            Ok(summary) => {
                if !summary.skipped.is_empty() {
                    tracing::info!(
                        "Bundle {} had no entry for: {}",
                        summary.archive,
                        summary.skipped.join(", ")
                    );
                }
                self.state.complete_operation(Some(summary.archive.clone()));
                OperationOutcome::Completed {
                    archive: summary.archive,
                }
            }
            Err(e) => self.report_failure(IMPORT_ERROR_TITLE, IMPORT_ERROR_DESCRIPTION, &e),
        }
    }

    fn report_failure(
        &self,
        title: &str,
        description: &str,
        error: &BundleError,
    ) -> OperationOutcome {
        tracing::error!("{}: {}", title, error);
        self.state.fail_operation(error.to_string());
        self.dialogs
            .show_error(title, &format!("{}\n\n{}", description, error));
        OperationOutcome::Failed(error.to_string())
    }

    // ===== About information =====

    pub fn version(&self) -> String {
        format!("Version: {}", crate::VERSION)
    }

    /// Version plus OS version, as copied to the clipboard
    pub fn version_info(&self) -> String {
        format!("{}\nOS Version: {}", self.version(), platform::os_version())
    }

    /// Copy [`version_info`](Self::version_info) to the clipboard. Failures are ignored.
    pub fn copy_version_info(&self) {
        if let Err(e) = platform::copy_to_clipboard(&self.version_info()) {
            tracing::debug!("Could not copy version info: {:#}", e);
        }
    }

    pub fn open_link(&self, link: AboutLink) -> Result<()> {
        tracing::info!("Opening {:?}: {}", link, link.url());
        platform::launch_uri(link.url())
    }

    pub fn open_log_location(&self) -> Result<()> {
        platform::open_folder(&self.config.log_dir())
    }
}
