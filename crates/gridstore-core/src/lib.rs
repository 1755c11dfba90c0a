//! Gridstore Core - persistence and undo/redo kernel for grid puzzles
//!
//! This crate provides the storage layer of a grid-puzzle construction tool,
//! including:
//! - Ordered keyed collections with insert-before positioning and
//!   auto-advancing selection
//! - Per-(grid, layer) object stores partitioned into question, answer,
//!   and UI groups
//! - Per-(grid, edit mode) edit logs with batch-aware undo/redo
//! - A filter pipeline that vetoes or derives edits, with retroactive
//!   recomputation of history when filters are registered
//! - Plain-data layer snapshots for external persistence

pub mod collections;
pub mod config;
pub mod errors;
pub mod filters;
pub mod history;
pub mod logging_facility;
pub mod manager;
pub mod model;
pub mod store;

// Used by the logging macros
pub use gridstore_core_types;

// Re-export commonly used types
pub use config::StorageConfig;
pub use errors::{ExError, ExErrorKind, Result, StorageError};
pub use filters::{FilterContext, FilterDescriptor, FilterResult, StorageFilter};
pub use history::EditLog;
pub use manager::StorageManager;
pub use model::{
    Anchor, BatchId, HistoryAction, HistoryContext, PartialHistoryAction, StorageMode, StorageRef,
};
pub use store::{LayerObjectStore, LayerSnapshot};
