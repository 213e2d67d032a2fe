// Settings Porter - export and import of application settings as a single zip bundle
//
// This is the library crate containing the archive layer, the settings sources and the
// bundle services. The binary crate (main.rs) provides the command line entry point.

pub mod archive;
pub mod config;
pub mod logging;
pub mod models;
pub mod services;
pub mod sources;
pub mod state;
pub mod ui;

// Re-export commonly used types for convenience
pub use archive::{ArchiveBuilder, ArchiveError, ArchiveReader};
pub use config::ConfigManager;
pub use models::{AppConfig, AppState, BundleOperation, LogFormat};
pub use services::{BundleError, BundleExporter, BundleImporter, ExportSummary, ImportSummary};
pub use sources::{
    BundleSource, FileBackedSource, SettingsSource, SettingsStores, SourceError, SourceRegistry,
};
pub use state::{StateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
