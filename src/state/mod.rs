// State management module
//
// This module provides the StateManager which wraps AppState with thread-safe access
// using Arc<RwLock<T>> and emits change events for the About screen.

use crate::models::{AppState, BundleOperation};
use camino::Utf8PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Change events emitted when state is modified
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// A bundle export or import has started
    OperationStarted { operation: BundleOperation },

    /// The active operation finished successfully
    OperationCompleted {
        operation: BundleOperation,
        archive: Option<Utf8PathBuf>,
    },

    /// The active operation failed
    OperationFailed {
        operation: BundleOperation,
        message: String,
    },

    /// The settings directory in use has changed
    SettingsDirChanged { settings_dir: Option<Utf8PathBuf> },

    /// State has been reset
    StateReset,
}

/// Thread-safe state manager with event emission
///
/// - Provides thread-safe access to [`AppState`] via `Arc<RwLock<T>>`
/// - Detects state changes and emits [`StateChange`] events
/// - Allows at most one bundle operation at a time ([`try_begin_operation`](Self::try_begin_operation))
pub struct StateManager {
    state: Arc<RwLock<AppState>>,

    /// Broadcast channel for emitting state change events
    state_tx: broadcast::Sender<StateChange>,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    /// Create a new StateManager with default state
    ///
    /// # Returns
    /// A new StateManager with a broadcast channel buffer of 100 events
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(AppState::default())),
            state_tx,
        }
    }

    /// Get a cloned snapshot of the current state
    pub fn snapshot(&self) -> AppState {
        self.read(AppState::clone)
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let busy = state_manager.read(|state| state.is_busy());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&AppState) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Update the state and emit change events
    ///
    /// # Returns
    /// A vector of StateChange events that were emitted
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut AppState),
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = Self::detect_changes(&old_state, &state);
        self.emit(&changes);
        changes
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    fn emit(&self, changes: &[StateChange]) {
        for change in changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.state_tx.send(change.clone());
        }
    }

    fn detect_changes(old: &AppState, new: &AppState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if old.settings_dir != new.settings_dir {
            changes.push(StateChange::SettingsDirChanged {
                settings_dir: new.settings_dir.clone(),
            });
        }

        match (old.active_operation, new.active_operation) {
            (None, Some(operation)) => {
                changes.push(StateChange::OperationStarted { operation });
            }
            (Some(operation), None) => match &new.last_error {
                Some(message) => changes.push(StateChange::OperationFailed {
                    operation,
                    message: message.clone(),
                }),
                None => changes.push(StateChange::OperationCompleted {
                    operation,
                    archive: new.last_archive.clone(),
                }),
            },
            _ => {}
        }

        changes
    }

    // Convenience methods for common state updates

    pub fn set_settings_dir(&self, settings_dir: Option<Utf8PathBuf>) -> Vec<StateChange> {
        self.update(|state| state.settings_dir = settings_dir)
    }

    /// Mark `operation` as active unless another operation already is.
    ///
    /// Returns false, without emitting anything, if the state is busy.
    pub fn try_begin_operation(&self, operation: BundleOperation) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(active) = state.active_operation {
            tracing::warn!("Cannot start {}: {} already in progress", operation, active);
            return false;
        }

        state.active_operation = Some(operation);
        state.last_error = None;
        drop(state);

        self.emit(&[StateChange::OperationStarted { operation }]);
        true
    }

    /// Finish the active operation successfully
    pub fn complete_operation(&self, archive: Option<Utf8PathBuf>) -> Vec<StateChange> {
        self.update(|state| state.finish_operation(archive, None))
    }

    /// Finish the active operation with an error message
    pub fn fail_operation(&self, message: impl Into<String>) -> Vec<StateChange> {
        let message = message.into();
        self.update(|state| state.finish_operation(None, Some(message)))
    }

    /// Reset all runtime state, keeping the settings directory
    pub fn reset(&self) -> Vec<StateChange> {
        let mut changes = self.update(|state| {
            let settings_dir = state.settings_dir.take();
            *state = AppState {
                settings_dir,
                ..AppState::default()
            };
        });

        let reset_event = StateChange::StateReset;
        let _ = self.state_tx.send(reset_event.clone());
        changes.push(reset_event);

        changes
    }
}
