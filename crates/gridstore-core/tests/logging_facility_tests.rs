#![allow(clippy::unwrap_used, clippy::expect_used)]

use gridstore_core::errors::StorageError;
use gridstore_core::gridstore_core_types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START};
use gridstore_core::logging_facility::test_capture::init_test_capture;
use gridstore_core::{
    log_op_end, log_op_error, log_op_start, FilterDescriptor, FilterResult, HistoryContext,
    PartialHistoryAction, StorageFilter, StorageManager, StorageRef,
};
use serde_json::json;
use tracing::Level;

#[test]
fn test_log_op_start_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_start_unique_1";

    log_op_start!(op_name, grid_id = "g1");

    let events = capture.events_for_op(op_name);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event.as_deref(), Some(EVENT_START));
    assert_eq!(events[0].grid_id.as_deref(), Some("g1"));
    assert_eq!(events[0].component.as_deref(), Some(module_path!()));
}

#[test]
fn test_log_op_end_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_end_unique_2";

    log_op_end!(op_name, duration_ms = 42);

    let events = capture.events_for_op(op_name);
    assert_eq!(events.len(), 1, "Should have exactly one end event");
    assert_eq!(events[0].event.as_deref(), Some(EVENT_END));
    assert_eq!(events[0].field("duration_ms"), Some("42"));
}

#[test]
fn test_log_op_error_includes_code() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_unique_3";

    let err = StorageError::StorageNotFound {
        grid_id: "g1".to_string(),
        layer_id: "cages".to_string(),
    };
    log_op_error!(op_name, err, duration_ms = 10);

    let events = capture.events_for_op(op_name);
    assert_eq!(events.len(), 1, "Should have exactly one error event");
    assert_eq!(events[0].event.as_deref(), Some(EVENT_END_ERROR));
    assert_eq!(events[0].level, Level::ERROR);
    assert_eq!(events[0].field("err_code"), Some("ERR_NOT_FOUND"));
}

#[test]
fn test_test_capture_assert_event_exists() {
    let capture = init_test_capture();
    let op_name = "test_capture_assert_unique_4";

    log_op_start!(op_name);

    capture.assert_event_exists(op_name, EVENT_START);
}

#[test]
#[should_panic(expected = "Expected event")]
fn test_test_capture_assert_event_exists_fails() {
    let capture = init_test_capture();

    capture.assert_event_exists("nonexistent_op_truly_unique_999", EVENT_START);
}

#[test]
fn test_manager_operations_log_one_start_and_end() {
    // GIVEN a manager on a grid no other test uses
    let capture = init_test_capture();
    let mut manager = StorageManager::new();
    manager.add_storage(StorageRef::new("log-grid-5", "layer1"));
    let ctx = HistoryContext::question("log-grid-5");

    // WHEN adding, undoing, and redoing
    manager
        .add_to_history(&ctx, "layer1", vec![PartialHistoryAction::set("a", json!(1))])
        .unwrap();
    manager.undo_history(&ctx);
    manager.redo_history(&ctx);

    // THEN each operation logged exactly one start and one end for this grid
    for op in ["add_to_history", "undo_history", "redo_history"] {
        let starts = capture.count_events(|e| {
            e.op.as_deref() == Some(op)
                && e.event.as_deref() == Some(EVENT_START)
                && e.grid_id.as_deref() == Some("log-grid-5")
        });
        assert_eq!(starts, 1, "op {} should start once", op);
    }
    let undo_end = capture
        .events_for_op("undo_history")
        .into_iter()
        .filter(|e| e.event.as_deref() == Some(EVENT_END))
        .any(|e| e.field("applied_len") == Some("1"));
    assert!(undo_end);
}

#[test]
fn test_failed_operation_logs_error_event() {
    let capture = init_test_capture();
    let mut manager = StorageManager::new();
    manager.add_storage(StorageRef::new("log-grid-6", "layer1"));
    let ctx = HistoryContext::question("log-grid-6");
    manager
        .add_storage_filters(
            &ctx,
            vec![FilterDescriptor::new(StorageFilter::new(|_, _| {
                Err(StorageError::filter("unique failure log-grid-6"))
            }))],
            "layer1",
        )
        .unwrap();

    let result =
        manager.add_to_history(&ctx, "layer1", vec![PartialHistoryAction::set("a", json!(1))]);

    assert!(result.is_err());
    let errors = capture.count_events(|e| {
        e.op.as_deref() == Some("add_to_history")
            && e.event.as_deref() == Some(EVENT_END_ERROR)
            && e.field("err_code") == Some("ERR_FILTER_FAILED")
    });
    assert!(errors >= 1);
}

#[test]
fn test_scrub_logs_summary() {
    let capture = init_test_capture();
    let mut manager = StorageManager::new();
    manager.add_storage(StorageRef::new("log-grid-7", "layer1"));
    let ctx = HistoryContext::question("log-grid-7");
    manager
        .add_to_history(&ctx, "layer1", vec![PartialHistoryAction::set("a", json!(1))])
        .unwrap();

    manager
        .add_storage_filters(
            &ctx,
            vec![FilterDescriptor::new(StorageFilter::new(|_, _| {
                Ok(FilterResult::reject())
            }))],
            "layer1",
        )
        .unwrap();

    let scrubbed = capture.count_events(|e| {
        e.grid_id.as_deref() == Some("log-grid-7") && e.field("excised") == Some("1")
    });
    assert_eq!(scrubbed, 1);
}
