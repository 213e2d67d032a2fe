use camino::Utf8PathBuf;

/// File type filter for settings bundles
pub const ARCHIVE_FILTER_NAME: &str = "Zip File";
pub const ARCHIVE_EXTENSIONS: &[&str] = &["zip"];

/// User-facing dialogs needed by the About screen.
///
/// Pickers return `None` when the user dismisses them.
#[cfg_attr(test, mockall::automock)]
pub trait Dialogs: Send + Sync {
    /// Ask where to save a new bundle. `suggested_name` has no extension.
    fn pick_save_archive(&self, suggested_name: &str) -> Option<Utf8PathBuf>;

    /// Ask which bundle to import.
    fn pick_open_archive(&self) -> Option<Utf8PathBuf>;

    /// Show a blocking error dialog.
    fn show_error(&self, title: &str, description: &str);
}

/// Native dialogs using the `rfd` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeDialogs;

impl NativeDialogs {
    fn to_utf8(path: std::path::PathBuf) -> Option<Utf8PathBuf> {
        Utf8PathBuf::try_from(path)
            .map_err(|e| {
                tracing::error!("Failed to convert path to UTF-8: {}", e);
                e
            })
            .ok()
    }
}

impl Dialogs for NativeDialogs {
    fn pick_save_archive(&self, suggested_name: &str) -> Option<Utf8PathBuf> {
        let path = rfd::FileDialog::new()
            .set_title("Export settings")
            .add_filter(ARCHIVE_FILTER_NAME, ARCHIVE_EXTENSIONS)
            .set_file_name(format!("{}.zip", suggested_name))
            .save_file()?;

        let mut path = Self::to_utf8(path)?;
        if path.extension().is_none() {
            path.set_extension("zip");
        }
        Some(path)
    }

    fn pick_open_archive(&self) -> Option<Utf8PathBuf> {
        rfd::FileDialog::new()
            .set_title("Import settings")
            .add_filter(ARCHIVE_FILTER_NAME, ARCHIVE_EXTENSIONS)
            .pick_file()
            .and_then(Self::to_utf8)
    }

    fn show_error(&self, title: &str, description: &str) {
        rfd::MessageDialog::new()
            .set_level(rfd::MessageLevel::Error)
            .set_title(title)
            .set_description(description)
            .set_buttons(rfd::MessageButtons::Ok)
            .show();
    }
}
