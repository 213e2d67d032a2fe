//! Data models for settings-porter.
//!
//! - [`AppState`]: runtime state of the About screen (active bundle operation, last result)
//! - [`AppConfig`]: application configuration loaded from `settings-porter.yaml`
//! - [`BundleOperation`]: export or import
//!
//! The settings payloads themselves are owned by their stores in [`crate::sources`].

pub mod app_state;
pub mod config;

pub use app_state::{AppState, BundleOperation};
pub use config::{AppConfig, LogFormat};
