//! Thin wrappers over the clipboard, the URL launcher and OS information.

use anyhow::{Context, Result};
use camino::Utf8Path;

/// Copy text to the clipboard using arboard
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut clipboard = arboard::Clipboard::new().context("Clipboard is not available")?;
    clipboard
        .set_text(text.to_string())
        .context("Failed to set clipboard text")?;
    Ok(())
}

/// Open a URL in the default browser
pub fn launch_uri(uri: &str) -> Result<()> {
    open::that_detached(uri).with_context(|| format!("Failed to open {}", uri))?;
    Ok(())
}

/// Open a folder in the system file manager
pub fn open_folder(path: &Utf8Path) -> Result<()> {
    open::that_detached(path.as_std_path())
        .with_context(|| format!("Failed to open folder {}", path))?;
    Ok(())
}

/// Human-readable OS name and version, e.g. "Windows 11 Pro 23H2"
pub fn os_version() -> String {
    sysinfo::System::long_os_version().unwrap_or_else(|| std::env::consts::OS.to_string())
}
