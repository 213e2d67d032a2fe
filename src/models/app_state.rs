use camino::Utf8PathBuf;
use std::fmt;

/// A user-triggered bundle operation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BundleOperation {
    Export,
    Import,
}

impl fmt::Display for BundleOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Export => write!(f, "export"),
            Self::Import => write!(f, "import"),
        }
    }
}

/// Single source of truth for the About screen.
///
/// # Thread Safety
///
/// `AppState` is wrapped in `Arc<RwLock<AppState>>` by [`crate::state::StateManager`].
/// Never access it directly - use [`read()`](crate::state::StateManager::read) and
/// [`update()`](crate::state::StateManager::update) so change events are emitted.
#[derive(Clone, Debug, Default)]
pub struct AppState {
    pub settings_dir: Option<Utf8PathBuf>,

    // Runtime state
    pub active_operation: Option<BundleOperation>,

    // Results
    pub last_archive: Option<Utf8PathBuf>,
    pub last_error: Option<String>,
    pub exports_completed: usize,
    pub imports_completed: usize,
}

impl AppState {
    pub fn is_busy(&self) -> bool {
        self.active_operation.is_some()
    }

    /// Record the end of the active operation.
    pub fn finish_operation(&mut self, archive: Option<Utf8PathBuf>, error: Option<String>) {
        if let Some(operation) = self.active_operation.take() {
            if error.is_none() {
                match operation {
                    BundleOperation::Export => self.exports_completed += 1,
                    BundleOperation::Import => self.imports_completed += 1,
                }
            }
        }

        if archive.is_some() {
            self.last_archive = archive;
        }
        self.last_error = error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = AppState::default();
        assert!(!state.is_busy());
        assert_eq!(state.exports_completed, 0);
        assert!(state.last_archive.is_none());
    }

    #[test]
    fn test_finish_operation_counts_success_only() {
        let mut state = AppState {
            active_operation: Some(BundleOperation::Import),
            ..AppState::default()
        };
        state.finish_operation(None, Some("bad archive".to_string()));
        assert_eq!(state.imports_completed, 0);
        assert_eq!(state.last_error.as_deref(), Some("bad archive"));
        assert!(!state.is_busy());

        state.active_operation = Some(BundleOperation::Export);
        state.finish_operation(Some(Utf8PathBuf::from("out.zip")), None);
        assert_eq!(state.exports_completed, 1);
        assert_eq!(state.last_archive, Some(Utf8PathBuf::from("out.zip")));
        assert!(state.last_error.is_none());
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(BundleOperation::Export.to_string(), "export");
        assert_eq!(BundleOperation::Import.to_string(), "import");
    }
}
