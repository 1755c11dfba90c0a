//! Per-(grid, edit mode) undo/redo logs

pub mod apply;
pub mod edit_log;

pub use apply::{apply_history_action, normalize_history_action, AppliedAction};
pub use edit_log::{EditLog, EntryId, LogEntry, Recorded};
