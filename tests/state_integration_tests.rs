//! Integration tests for StateManager with state change events
//!
//! These tests verify that the StateManager correctly:
//! - Emits state change events on mutations
//! - Supports multiple subscribers
//! - Admits a single bundle operation at a time under concurrent access
//! - Maintains consistency across operation transitions

use camino::Utf8PathBuf;
use settings_porter::{BundleOperation, StateChange, StateManager};
use std::sync::Arc;
use tokio::time::{Duration, timeout};

#[tokio::test]
async fn test_operation_started_event_emitted() {
    let state = Arc::new(StateManager::new());
    let mut rx = state.subscribe();

    assert!(state.try_begin_operation(BundleOperation::Export));

    let event = timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed");

    assert_eq!(
        event,
        StateChange::OperationStarted {
            operation: BundleOperation::Export
        }
    );
}

#[tokio::test]
async fn test_multiple_subscribers_receive_events() {
    let state = Arc::new(StateManager::new());
    let mut rx1 = state.subscribe();
    let mut rx2 = state.subscribe();

    state.set_settings_dir(Some(Utf8PathBuf::from("/data/settings")));

    for rx in [&mut rx1, &mut rx2] {
        let event = timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("Timeout")
            .expect("Channel closed");
        assert!(matches!(event, StateChange::SettingsDirChanged { .. }));
    }
}

#[tokio::test]
async fn test_export_workflow_events() {
    let state = Arc::new(StateManager::new());
    let mut rx = state.subscribe();

    state.try_begin_operation(BundleOperation::Export);
    state.complete_operation(Some(Utf8PathBuf::from("/backups/Files_3.0.0.zip")));

    let mut events = Vec::new();
    while let Ok(Ok(event)) = timeout(Duration::from_millis(50), rx.recv()).await {
        events.push(event);
    }

    assert_eq!(
        events,
        vec![
            StateChange::OperationStarted {
                operation: BundleOperation::Export
            },
            StateChange::OperationCompleted {
                operation: BundleOperation::Export,
                archive: Some(Utf8PathBuf::from("/backups/Files_3.0.0.zip")),
            },
        ]
    );

    let snapshot = state.snapshot();
    assert!(!snapshot.is_busy());
    assert_eq!(snapshot.exports_completed, 1);
    assert_eq!(
        snapshot.last_archive,
        Some(Utf8PathBuf::from("/backups/Files_3.0.0.zip"))
    );
}

#[tokio::test]
async fn test_failed_import_keeps_previous_archive() {
    let state = Arc::new(StateManager::new());

    state.try_begin_operation(BundleOperation::Export);
    state.complete_operation(Some(Utf8PathBuf::from("first.zip")));

    state.try_begin_operation(BundleOperation::Import);
    let changes = state.fail_operation("Not a valid settings bundle");

    assert_eq!(
        changes,
        vec![StateChange::OperationFailed {
            operation: BundleOperation::Import,
            message: "Not a valid settings bundle".to_string(),
        }]
    );
    let snapshot = state.snapshot();
    assert_eq!(snapshot.imports_completed, 0);
    assert_eq!(snapshot.last_archive, Some(Utf8PathBuf::from("first.zip")));

    // The next successful operation clears the error
    state.try_begin_operation(BundleOperation::Export);
    assert!(state.read(|s| s.last_error.is_none()));
}

#[tokio::test]
async fn test_concurrent_begin_admits_one() {
    let state = Arc::new(StateManager::new());

    let mut handles = vec![];
    for i in 0..10 {
        let state_clone = state.clone();
        let operation = if i % 2 == 0 {
            BundleOperation::Export
        } else {
            BundleOperation::Import
        };
        handles.push(tokio::spawn(async move {
            state_clone.try_begin_operation(operation)
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            admitted += 1;
        }
    }

    assert_eq!(admitted, 1, "Exactly one operation should be admitted");
    assert!(state.read(|s| s.is_busy()));
}

#[tokio::test]
async fn test_reset_state() {
    let state = Arc::new(StateManager::new());
    let mut rx = state.subscribe();

    state.try_begin_operation(BundleOperation::Import);
    state.complete_operation(None);
    state.reset();

    let mut saw_reset = false;
    while let Ok(Ok(event)) = timeout(Duration::from_millis(50), rx.recv()).await {
        if event == StateChange::StateReset {
            saw_reset = true;
        }
    }

    assert!(saw_reset, "Expected a StateReset event");
    assert_eq!(state.read(|s| s.imports_completed), 0);
}
