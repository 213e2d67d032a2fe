// UI module - About screen view model and platform glue
//
// This module contains:
// - AboutController: export/import commands, version info and about links
// - Dialogs: file pickers and error dialogs (native implementation via rfd)
// - platform: clipboard, URL and folder launching

pub mod controller;
pub mod dialogs;
pub mod platform;

pub use controller::{AboutController, AboutLink, OperationOutcome};
pub use dialogs::{Dialogs, NativeDialogs};
